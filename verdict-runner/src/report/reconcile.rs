// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{ReportEntry, parse_junit};
use crate::{
    diagnostics::DiagnosticSink,
    errors::ReportParseError,
    fatal_error,
    helpers::FormattedDuration,
    name_index::NameIndex,
    run_table::{
        Outcome, OutcomeRecord, RecordResult, RunResultTable, SourceOfTruth, TerminalOutcome,
    },
    tree::SourceLocation,
};
use camino::Utf8Path;
use std::{collections::HashSet, time::Duration};
use tokio::time::Instant;
use verdict_metadata::{CorrectionSummary, TestNodeId};

/// How long to wait for the report to appear after the process exits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReportWait {
    /// The total time to wait.
    pub grace_period: Duration,
    /// How often to check for the report.
    pub poll_interval: Duration,
}

impl Default for ReportWait {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_millis(500),
            poll_interval: Duration::from_millis(50),
        }
    }
}

/// A streaming outcome overwritten by the report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Correction {
    /// The corrected node.
    pub node: TestNodeId,
    /// The outcome before correction.
    pub from: Outcome,
    /// The outcome from the report.
    pub to: Outcome,
}

impl Correction {
    /// Converts this correction to its serializable form.
    pub fn to_summary(&self) -> CorrectionSummary {
        CorrectionSummary {
            id: self.node.clone(),
            from: self.from.to_summary(),
            to: self.to.to_summary(),
        }
    }
}

/// The changes a reconciliation made to the result table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CorrectionSet {
    /// Whether a report was found and parsed.
    pub report_read: bool,
    /// Nodes that had no outcome and received one from the report.
    pub filled: Vec<TestNodeId>,
    /// Nodes whose streaming outcome disagreed with the report.
    pub corrections: Vec<Correction>,
    /// Report entries that did not resolve to any node in the run.
    pub unmatched: usize,
}

impl CorrectionSet {
    /// Returns true if the reconciliation changed nothing.
    pub fn is_empty(&self) -> bool {
        self.filled.is_empty() && self.corrections.is_empty()
    }
}

/// Reconciles streaming outcomes against the runner's structured report.
///
/// The report is treated as ground truth. Failures to find or parse it are recorded as
/// diagnostics and leave the table untouched.
#[derive(Debug)]
pub struct Reconciler<'idx> {
    index: &'idx NameIndex,
    diagnostics: DiagnosticSink,
}

impl<'idx> Reconciler<'idx> {
    /// Creates a new reconciler.
    pub fn new(index: &'idx NameIndex, diagnostics: DiagnosticSink) -> Self {
        Self { index, diagnostics }
    }

    /// Waits for the report at `path`, then applies it to `table`.
    pub async fn reconcile(
        &self,
        path: &Utf8Path,
        wait: ReportWait,
        table: &mut RunResultTable,
    ) -> CorrectionSet {
        match self.read_report(path, wait).await {
            Some(contents) => self.apply_str(path, &contents, table),
            None => CorrectionSet::default(),
        }
    }

    /// Waits up to the grace period for the report at `path` to be written, and reads it.
    ///
    /// Returns `None`, after recording a diagnostic, if the report never appears or can't be
    /// read. A report that is still being written is read again once after `poll_interval`.
    pub async fn read_report(&self, path: &Utf8Path, wait: ReportWait) -> Option<String> {
        if !wait_for_report(path, wait).await {
            self.diagnostics.debug(format!(
                "report `{path}` not written within {}, keeping streaming results",
                FormattedDuration(wait.grace_period)
            ));
            return None;
        }
        let contents = self.read_contents(path).await?;
        if let Err(ReportParseError::Truncated { .. }) = parse_junit(&contents) {
            tokio::time::sleep(wait.poll_interval).await;
            return self.read_contents(path).await;
        }
        Some(contents)
    }

    async fn read_contents(&self, path: &Utf8Path) -> Option<String> {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => Some(contents),
            Err(error) => {
                self.diagnostics
                    .warn(format!("failed to read report `{path}`: {error}"));
                None
            }
        }
    }

    /// Parses `contents` as a JUnit report and applies it to `table`.
    pub fn apply_str(
        &self,
        path: &Utf8Path,
        contents: &str,
        table: &mut RunResultTable,
    ) -> CorrectionSet {
        match parse_junit(contents) {
            Ok(entries) => self.apply(&entries, table),
            Err(error) => {
                self.diagnostics
                    .warn(format!("ignoring malformed report `{path}`: {error}"));
                CorrectionSet::default()
            }
        }
    }

    /// Applies parsed report entries to `table`.
    ///
    /// Only the first entry that resolves to a node is applied. Applying the same entries twice
    /// leaves the table as applying them once.
    pub fn apply(&self, entries: &[ReportEntry], table: &mut RunResultTable) -> CorrectionSet {
        let mut set = CorrectionSet {
            report_read: true,
            ..CorrectionSet::default()
        };
        let mut processed = HashSet::new();

        for entry in entries {
            let Some(node) = self.resolve(entry) else {
                self.diagnostics
                    .debug(format!("unmatched report entry `{}`", entry.name));
                set.unmatched += 1;
                continue;
            };
            if !processed.insert(node.clone()) {
                continue;
            }

            let outcome = entry.status.outcome();
            let record = OutcomeRecord {
                outcome,
                source: SourceOfTruth::Report,
                diagnostic: entry.failure_detail.clone(),
                location: entry_location(entry),
            };
            let current = table.outcome(&node);

            if !current.is_terminal() {
                if table.record(&node, record) == RecordResult::Recorded {
                    set.filled.push(node);
                }
            } else if current != Outcome::from(outcome) {
                let from = table.correct(&node, record);
                tracing::debug!(%node, ?from, to = ?outcome, "report corrected streaming outcome");
                set.corrections.push(Correction {
                    node,
                    from,
                    to: outcome.into(),
                });
            } else if record.diagnostic.is_some() {
                // Same outcome: keep it, but prefer the report's failure detail.
                table.correct(&node, record);
            }
        }

        set
    }

    fn resolve(&self, entry: &ReportEntry) -> Option<TestNodeId> {
        let qualifiers = [
            entry.classname.as_deref(),
            entry.file.as_ref().map(|file| file.as_str()),
        ];
        qualifiers
            .into_iter()
            .flatten()
            .find_map(|qualifier| self.index.resolve(Some(qualifier), &entry.name))
            .or_else(|| self.index.resolve(None, &entry.name))
            .cloned()
    }
}

fn entry_location(entry: &ReportEntry) -> Option<SourceLocation> {
    if entry.status.outcome() == TerminalOutcome::Passed {
        return None;
    }
    entry
        .failure_detail
        .as_deref()
        .and_then(fatal_error::locate)
        .or_else(|| {
            entry.file.as_ref().map(|file| SourceLocation {
                file: file.clone(),
                line: entry.line,
            })
        })
}

async fn wait_for_report(path: &Utf8Path, wait: ReportWait) -> bool {
    let deadline = Instant::now() + wait.grace_period;
    loop {
        if let Ok(metadata) = tokio::fs::metadata(path).await
            && metadata.len() > 0
        {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        tokio::time::sleep(wait.poll_interval.min(deadline - now)).await;
    }
}
