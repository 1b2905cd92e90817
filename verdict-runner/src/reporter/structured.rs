// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Machine-readable output.

use crate::runner::RunFinished;
use verdict_metadata::RunSummary;

/// The format in which run results are written to stdout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MessageFormat {
    /// Only human-readable output, on stderr.
    #[default]
    Human,
    /// A JSON [`RunSummary`] on stdout once the run finishes.
    Json,
}

/// Builds the machine-readable summary of a finished run.
///
/// Only nodes that received a verdict are listed. Absent nodes keep their prior state.
pub fn run_summary(finished: &RunFinished) -> RunSummary {
    RunSummary {
        status: finished.terminal.to_summary(),
        exit_code: finished.exit_code,
        duration_secs: finished.elapsed.as_secs_f64(),
        nodes: finished
            .verdicts
            .iter()
            .map(|(id, verdict)| (id.clone(), verdict.to_summary()))
            .collect(),
        corrections: finished
            .corrections
            .corrections
            .iter()
            .map(|correction| correction.to_summary())
            .collect(),
        fatal_error: finished.fatal_error.as_ref().map(|error| error.to_summary()),
        diagnostics: finished
            .diagnostics
            .iter()
            .map(|diagnostic| diagnostic.to_summary())
            .collect(),
    }
}
