// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command-line frontend for verdict.
//!
//! `verdict run` invokes a PHPUnit or Pest command, watches its output, reconciles it against the
//! JUnit report and prints a verdict for every node in scope. `verdict reconcile` does the same
//! for a saved output log without spawning anything.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::{OutputContext, StderrStyles};
