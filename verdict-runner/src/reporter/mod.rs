// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reporting of run events.
//!
//! The main structure in this module is [`Reporter`]. It renders [`RunEvent`](events::RunEvent)s
//! as a human-readable stream on stderr and, when asked to, writes a machine-readable
//! [`RunSummary`](verdict_metadata::RunSummary) to stdout once the run finishes.

mod displayer;
pub mod events;
mod imp;
mod structured;

pub use imp::*;
pub use structured::*;
