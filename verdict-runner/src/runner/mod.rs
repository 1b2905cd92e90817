// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The run controller.
//!
//! The main structure in this module is [`RunController`]. It spawns the test runner through a
//! [`ProcessExecutor`], feeds its output to the streaming classifier, then reconciles the
//! structured report and aggregates verdicts once the process exits. [`Replay`] runs the same
//! pipeline over a saved output log.

mod cancel;
mod imp;
mod process;
mod replay;

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        #[path = "unix.rs"]
        mod os;
    } else if #[cfg(windows)] {
        #[path = "windows.rs"]
        mod os;
    } else {
        compile_error!("verdict only supports Unix and Windows");
    }
}

pub use cancel::*;
pub use imp::{Invocation, RunController, RunFinished, RunSettings, RunState, TerminalStatus};
pub use process::*;
pub use replay::*;
