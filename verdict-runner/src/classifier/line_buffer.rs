// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use bstr::ByteSlice;
use bytes::{Bytes, BytesMut};

/// Carry-over buffer that turns arbitrary byte chunks into complete lines.
///
/// Lines are split on `\n`. The terminator and a trailing `\r` are not part of the returned
/// line. An incomplete final fragment is kept until more bytes arrive or [`Self::flush`] is
/// called.
#[derive(Debug, Default)]
pub(super) struct LineBuffer {
    buf: BytesMut,
}

impl LineBuffer {
    pub(super) fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    pub(super) fn next_line(&mut self) -> Option<Bytes> {
        let newline = self.buf.find_byte(b'\n')?;
        let mut line = self.buf.split_to(newline + 1);
        line.truncate(newline);
        Some(trim_cr(line.freeze()))
    }

    /// Returns the remaining fragment, if any, as a final line.
    pub(super) fn flush(&mut self) -> Option<Bytes> {
        if self.buf.is_empty() {
            return None;
        }
        Some(trim_cr(self.buf.split().freeze()))
    }
}

fn trim_cr(line: Bytes) -> Bytes {
    match line.last() {
        Some(b'\r') => line.slice(..line.len() - 1),
        _ => line,
    }
}
