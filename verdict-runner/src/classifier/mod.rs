// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Real-time classification of test runner output.
//!
//! The [`StreamingClassifier`] consumes process output as unordered byte chunks on two channels.
//! Each channel has its own carry-over buffer, so chunk boundaries never need to line up with
//! line boundaries. Every complete line is run through the recognizers in [`patterns`], and a
//! recognized identifier is resolved through the [`NameIndex`].

mod line_buffer;
pub mod patterns;

use crate::{diagnostics::DiagnosticSink, fatal_error, name_index::NameIndex, tree::SourceLocation};
use line_buffer::LineBuffer;
use std::{collections::HashSet, fmt};
use verdict_metadata::TestNodeId;

pub use patterns::{LineMatch, PatternKind};

/// An output channel of the test process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutputChannel {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

impl fmt::Display for OutputChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputChannel::Stdout => write!(f, "stdout"),
            OutputChannel::Stderr => write!(f, "stderr"),
        }
    }
}

/// A per-node outcome inferred from a single output line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutcomeEvent {
    /// The node the line refers to.
    pub node: TestNodeId,
    /// Whether the line reports a pass.
    pub passed: bool,
    /// The line, with ANSI escapes removed.
    pub raw_line: String,
    /// The channel the line arrived on.
    pub channel: OutputChannel,
    /// The recognizer that matched.
    pub pattern: PatternKind,
    /// A source location named on a failure line.
    pub location: Option<SourceLocation>,
}

/// An event produced by [`StreamingClassifier::push_chunk`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClassifierEvent<'a> {
    /// A raw chunk, forwarded verbatim.
    RawChunk {
        /// The channel the chunk arrived on.
        channel: OutputChannel,
        /// The bytes, exactly as received.
        chunk: &'a [u8],
    },
    /// The first outcome seen for a node.
    Outcome(OutcomeEvent),
}

/// Classifies process output into per-node outcome events.
#[derive(Debug)]
pub struct StreamingClassifier<'idx> {
    index: &'idx NameIndex,
    diagnostics: DiagnosticSink,
    stdout: LineBuffer,
    stderr: LineBuffer,
    seen: HashSet<TestNodeId>,
    combined: String,
}

impl<'idx> StreamingClassifier<'idx> {
    /// Creates a new classifier that resolves identifiers through `index`.
    pub fn new(index: &'idx NameIndex, diagnostics: DiagnosticSink) -> Self {
        Self {
            index,
            diagnostics,
            stdout: LineBuffer::default(),
            stderr: LineBuffer::default(),
            seen: HashSet::new(),
            combined: String::new(),
        }
    }

    /// Consumes a chunk of output.
    ///
    /// `callback` first receives the chunk itself, then one [`ClassifierEvent::Outcome`] for
    /// each node mentioned for the first time by a line the chunk completes.
    pub fn push_chunk<F>(&mut self, channel: OutputChannel, chunk: &[u8], mut callback: F)
    where
        F: FnMut(ClassifierEvent<'_>),
    {
        callback(ClassifierEvent::RawChunk { channel, chunk });
        self.buffer_mut(channel).push(chunk);
        while let Some(line) = self.buffer_mut(channel).next_line() {
            self.classify_line(channel, &line, &mut callback);
        }
    }

    /// Flushes the incomplete final line of each channel. Called once the process has exited.
    pub fn finish<F>(&mut self, mut callback: F)
    where
        F: FnMut(ClassifierEvent<'_>),
    {
        for channel in [OutputChannel::Stdout, OutputChannel::Stderr] {
            if let Some(line) = self.buffer_mut(channel).flush() {
                self.classify_line(channel, &line, &mut callback);
            }
        }
    }

    /// Returns all complete lines seen so far on both channels, in delivery order, with ANSI
    /// escapes removed.
    pub fn combined_output(&self) -> &str {
        &self.combined
    }

    /// Consumes the classifier, returning the combined output.
    pub fn into_combined_output(self) -> String {
        self.combined
    }

    fn buffer_mut(&mut self, channel: OutputChannel) -> &mut LineBuffer {
        match channel {
            OutputChannel::Stdout => &mut self.stdout,
            OutputChannel::Stderr => &mut self.stderr,
        }
    }

    fn classify_line<F>(&mut self, channel: OutputChannel, line: &[u8], callback: &mut F)
    where
        F: FnMut(ClassifierEvent<'_>),
    {
        let stripped = strip_ansi_escapes::strip(line);
        let text = String::from_utf8_lossy(&stripped);
        self.combined.push_str(&text);
        self.combined.push('\n');

        let Some(matched) = patterns::classify(&text) else {
            return;
        };
        let Some(node) = self.resolve(&matched) else {
            self.diagnostics.debug(format!(
                "unmatched identifier `{}` ({:?} on {channel})",
                matched.full, matched.pattern
            ));
            return;
        };
        if !self.seen.insert(node.clone()) {
            return;
        }

        let location = if matched.passed {
            None
        } else {
            fatal_error::locate(&text).or_else(|| {
                matched
                    .qualifier
                    .filter(|qualifier| qualifier.ends_with(".php"))
                    .map(|file| SourceLocation {
                        file: file.into(),
                        line: None,
                    })
            })
        };
        callback(ClassifierEvent::Outcome(OutcomeEvent {
            node,
            passed: matched.passed,
            raw_line: text.trim().to_owned(),
            channel,
            pattern: matched.pattern,
            location,
        }));
    }

    fn resolve(&self, matched: &LineMatch<'_>) -> Option<TestNodeId> {
        if let Some(qualifier) = matched.qualifier
            && let Some(node) = self.index.resolve(Some(qualifier), matched.identifier)
        {
            return Some(node.clone());
        }
        self.index.resolve(None, matched.full).cloned()
    }
}
