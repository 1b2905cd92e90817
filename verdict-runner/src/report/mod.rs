// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The authoritative structured report.
//!
//! After the test process exits, the runner's JUnit report is parsed into [`ReportEntry`]
//! records and reconciled against the outcomes inferred from streaming output.

mod junit;
mod reconcile;

pub use junit::parse_junit;
pub use reconcile::*;

use crate::run_table::TerminalOutcome;
use camino::Utf8PathBuf;

/// The status of a single report entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportStatus {
    /// The test case has no failure, error or skipped child.
    Passed,
    /// The test case has a `<failure>` child.
    Failed,
    /// The test case has an `<error>` child.
    Error,
    /// The test case has a `<skipped>` child.
    Skipped,
}

impl ReportStatus {
    /// Returns the outcome this status maps to. Errors are failures.
    pub fn outcome(self) -> TerminalOutcome {
        match self {
            ReportStatus::Passed => TerminalOutcome::Passed,
            ReportStatus::Failed | ReportStatus::Error => TerminalOutcome::Failed,
            ReportStatus::Skipped => TerminalOutcome::Skipped,
        }
    }
}

/// One test case from the structured report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportEntry {
    /// The test case name.
    pub name: String,
    /// The class the test case belongs to, from the `class` or `classname` attribute.
    pub classname: Option<String>,
    /// The file the test case is declared in.
    pub file: Option<Utf8PathBuf>,
    /// The line the test case is declared on.
    pub line: Option<u32>,
    /// The status.
    pub status: ReportStatus,
    /// The failure, error or skip message and text content.
    pub failure_detail: Option<String>,
}
