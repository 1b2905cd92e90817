// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    aggregator::Verdicts,
    classifier::{OutcomeEvent, OutputChannel},
    errors::InvocationError,
    fatal_error::FatalErrorInfo,
    report::CorrectionSet,
    runner::{RunFinished, RunState},
};
use camino::Utf8Path;
use chrono::{DateTime, FixedOffset};
use std::time::Duration;

/// A run event.
///
/// Events are produced by a [`RunController`](crate::runner::RunController) or a
/// [`Replay`](crate::runner::Replay) and consumed by a [`Reporter`](crate::reporter::Reporter).
#[derive(Clone, Debug)]
pub struct RunEvent<'a> {
    /// The time at which the event was generated, including the offset from UTC.
    pub timestamp: DateTime<FixedOffset>,

    /// The amount of time elapsed since the start of the run.
    pub elapsed: Duration,

    /// The kind of run event this is.
    pub kind: RunEventKind<'a>,
}

/// The kind of run event this is.
///
/// Forms part of [`RunEvent`].
#[derive(Clone, Debug)]
pub enum RunEventKind<'a> {
    /// The run started.
    RunStarted {
        /// The command being run, or the output log being replayed.
        command: &'a str,

        /// The number of leaves in the run's scope.
        leaf_count: usize,

        /// Where the structured report is expected, if anywhere.
        report_path: Option<&'a Utf8Path>,
    },

    /// The run controller moved to a new state.
    StateChanged {
        /// The previous state.
        from: RunState,

        /// The new state.
        to: RunState,
    },

    /// A chunk of raw output, exactly as the process wrote it.
    OutputChunk {
        /// The channel the chunk arrived on.
        channel: OutputChannel,

        /// The bytes.
        chunk: &'a [u8],
    },

    /// A line of output established a node's outcome.
    OutcomeRecorded {
        /// The event from the classifier.
        event: &'a OutcomeEvent,
    },

    /// The structured report was applied.
    ReportReconciled {
        /// What the report changed.
        corrections: &'a CorrectionSet,
    },

    /// The output contained a fatal error.
    FatalErrorDetected {
        /// The error.
        error: &'a FatalErrorInfo,
    },

    /// Verdicts were assigned to the run's nodes.
    VerdictsAssigned {
        /// The verdicts.
        verdicts: &'a Verdicts,
    },

    /// The run finished.
    RunFinished {
        /// The results of the run.
        finished: &'a RunFinished,
    },

    /// The test runner process could not be started.
    ///
    /// No node outcome is changed because of this.
    InvocationFailed {
        /// The error.
        error: &'a InvocationError,
    },
}
