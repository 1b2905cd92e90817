// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::TestNodeId;
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The outcome of a test node within one run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutcomeSummary {
    /// No outcome has been established.
    Unset,

    /// The node is currently running.
    Running,

    /// The node passed.
    Passed,

    /// The node failed.
    Failed,

    /// The node was skipped, or did not get to run before the run was interrupted.
    Skipped,
}

/// Where an outcome came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceOfTruthSummary {
    /// Inferred from live process output.
    Streaming,

    /// Read from the structured report written by the runner.
    Report,

    /// Assumed to have passed because it was not mentioned while its siblings ran.
    DefaultPass,

    /// Set by the run controller after a cancellation, timeout or fatal error.
    Controller,
}

/// The kind of a node in the test tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKindSummary {
    /// A test suite.
    Suite,

    /// A test file.
    File,

    /// A test method.
    Method,

    /// One parameterized invocation of a test method.
    DatasetVariant,
}

/// The terminal status of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStatusSummary {
    /// The run completed and nothing failed.
    Passed,

    /// The run completed and at least one test failed, or the runner reported a fatal error.
    Failed,

    /// The run was cancelled.
    Cancelled,

    /// The run hit its timeout.
    TimedOut,
}

/// Machine-readable output for a completed run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunSummary {
    /// The terminal status of the run.
    pub status: RunStatusSummary,

    /// The exit code of the runner process, if it exited normally.
    pub exit_code: Option<i32>,

    /// The wall-clock duration of the run, in seconds.
    pub duration_secs: f64,

    /// Results for every node that received a verdict or an outcome in this run.
    ///
    /// Nodes that are absent retain whatever state they had before the run.
    pub nodes: BTreeMap<TestNodeId, NodeResultSummary>,

    /// Outcomes from live output that were overridden by the structured report.
    #[serde(default)]
    pub corrections: Vec<CorrectionSummary>,

    /// The fatal error reported by the runner, if any.
    #[serde(default)]
    pub fatal_error: Option<FatalErrorSummary>,

    /// Non-fatal diagnostics collected during the run.
    #[serde(default)]
    pub diagnostics: Vec<DiagnosticSummary>,
}

impl RunSummary {
    /// Parses JSON output from `verdict run --message-format json`.
    pub fn parse_json(json: impl AsRef<str>) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json.as_ref())
    }
}

/// The result of a single node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NodeResultSummary {
    /// The kind of node.
    pub kind: NodeKindSummary,

    /// The outcome for this run.
    pub outcome: OutcomeSummary,

    /// Where the outcome came from. `None` for containers.
    #[serde(default)]
    pub source: Option<SourceOfTruthSummary>,

    /// Diagnostic text, typically the failure message.
    #[serde(default)]
    pub diagnostic: Option<String>,

    /// A source location associated with the diagnostic.
    #[serde(default)]
    pub location: Option<LocationSummary>,
}

/// A single point in a source file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LocationSummary {
    /// The file.
    pub file: Utf8PathBuf,

    /// The 1-based line, if known.
    pub line: Option<u32>,
}

/// A correction applied by the structured report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CorrectionSummary {
    /// The corrected node.
    pub id: TestNodeId,

    /// The outcome inferred from live output.
    pub from: OutcomeSummary,

    /// The outcome from the report.
    pub to: OutcomeSummary,
}

/// A fatal error reported by the runner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FatalErrorSummary {
    /// The error class, for example `TypeError`.
    #[serde(default)]
    pub error_class: Option<String>,

    /// The error message.
    pub message: String,

    /// The file the error was raised in.
    #[serde(default)]
    pub file: Option<Utf8PathBuf>,

    /// The line the error was raised on.
    #[serde(default)]
    pub line: Option<u32>,
}

/// The severity of a diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticLevelSummary {
    /// Informational, for example an identifier that did not match any test.
    Debug,

    /// Something went wrong but the run recovered, for example an unreadable report.
    Warning,
}

/// A non-fatal diagnostic.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DiagnosticSummary {
    /// The severity.
    pub level: DiagnosticLevelSummary,

    /// The message.
    pub message: String,
}
