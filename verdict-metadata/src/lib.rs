// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Structured input and output formats for verdict.
//!
//! The verdict engine consumes a declared test tree produced by a discovery tool, and produces a
//! machine-readable summary of a run. This crate holds the serde models for both, so that tools
//! on either side of the engine can share them without depending on the engine itself.
//!
//! * [`TestTreeSummary`] is the input: suites, files, methods and datasets as discovered.
//! * [`RunSummary`] is the output of `verdict run --message-format json`.
//! * [`NodeStatesSummary`] is the per-node state that persists across runs.

mod exit_codes;
mod states;
mod summary;
mod tree;

pub use exit_codes::*;
pub use states::*;
pub use summary::*;
pub use tree::*;
