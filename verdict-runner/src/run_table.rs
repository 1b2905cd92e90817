// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-run result table.
//!
//! A [`RunResultTable`] is built fresh for every run and owned by the run controller for the
//! run's duration. Outcomes move strictly forward, `Unset → Running → terminal`, and a terminal
//! outcome is immutable for the rest of the run. The one sanctioned exception is
//! [`RunResultTable::correct`], which the report reconciler uses to overwrite heuristic
//! outcomes with the runner's own bookkeeping.

use crate::tree::SourceLocation;
use std::collections::HashMap;
use verdict_metadata::{OutcomeSummary, SourceOfTruthSummary, TestNodeId};

/// The outcome of a node within one run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// No outcome has been established.
    #[default]
    Unset,
    /// The node is running.
    Running,
    /// The node passed.
    Passed,
    /// The node failed.
    Failed,
    /// The node was skipped.
    Skipped,
}

impl Outcome {
    /// Returns true if this outcome is terminal: passed, failed or skipped.
    pub fn is_terminal(self) -> bool {
        matches!(self, Outcome::Passed | Outcome::Failed | Outcome::Skipped)
    }

    /// Converts this outcome to its serializable form.
    pub fn to_summary(self) -> OutcomeSummary {
        match self {
            Outcome::Unset => OutcomeSummary::Unset,
            Outcome::Running => OutcomeSummary::Running,
            Outcome::Passed => OutcomeSummary::Passed,
            Outcome::Failed => OutcomeSummary::Failed,
            Outcome::Skipped => OutcomeSummary::Skipped,
        }
    }

    /// Converts a serialized outcome back.
    pub fn from_summary(summary: OutcomeSummary) -> Self {
        match summary {
            OutcomeSummary::Unset => Outcome::Unset,
            OutcomeSummary::Running => Outcome::Running,
            OutcomeSummary::Passed => Outcome::Passed,
            OutcomeSummary::Failed => Outcome::Failed,
            OutcomeSummary::Skipped => Outcome::Skipped,
        }
    }
}

/// A terminal outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TerminalOutcome {
    /// The node passed.
    Passed,
    /// The node failed.
    Failed,
    /// The node was skipped.
    Skipped,
}

impl TerminalOutcome {
    /// Returns `Passed` if `passed` is true, otherwise `Failed`.
    pub fn from_passed(passed: bool) -> Self {
        if passed {
            TerminalOutcome::Passed
        } else {
            TerminalOutcome::Failed
        }
    }
}

impl From<TerminalOutcome> for Outcome {
    fn from(outcome: TerminalOutcome) -> Self {
        match outcome {
            TerminalOutcome::Passed => Outcome::Passed,
            TerminalOutcome::Failed => Outcome::Failed,
            TerminalOutcome::Skipped => Outcome::Skipped,
        }
    }
}

/// Where an outcome came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SourceOfTruth {
    /// Inferred from live process output.
    Streaming,
    /// Read from the structured report.
    Report,
    /// Assumed passed because siblings ran and none failed.
    DefaultPass,
    /// Set by the run controller: cancellation, timeout or fatal error.
    Controller,
}

impl SourceOfTruth {
    /// Returns true if an outcome with this source is evidence that the node actually executed.
    pub fn counts_as_executed(self) -> bool {
        match self {
            SourceOfTruth::Streaming | SourceOfTruth::Report | SourceOfTruth::DefaultPass => true,
            SourceOfTruth::Controller => false,
        }
    }

    /// Converts this source to its serializable form.
    pub fn to_summary(self) -> SourceOfTruthSummary {
        match self {
            SourceOfTruth::Streaming => SourceOfTruthSummary::Streaming,
            SourceOfTruth::Report => SourceOfTruthSummary::Report,
            SourceOfTruth::DefaultPass => SourceOfTruthSummary::DefaultPass,
            SourceOfTruth::Controller => SourceOfTruthSummary::Controller,
        }
    }
}

/// One row of the result table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResultEntry {
    /// The outcome.
    pub outcome: Outcome,
    /// Diagnostic text, typically the line or failure detail that established the outcome.
    pub diagnostic: Option<String>,
    /// A source location for the diagnostic.
    pub location: Option<SourceLocation>,
    /// Where the outcome came from. `None` while the outcome is not terminal.
    pub source: Option<SourceOfTruth>,
}

impl ResultEntry {
    /// Returns true if this entry holds a terminal outcome that counts as executed.
    pub fn is_executed(&self) -> bool {
        self.outcome.is_terminal() && self.source.is_some_and(SourceOfTruth::counts_as_executed)
    }
}

/// The result of [`RunResultTable::record`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordResult {
    /// The outcome was recorded.
    Recorded,
    /// The node already had a terminal outcome, which was kept.
    AlreadyTerminal(Outcome),
}

/// A terminal outcome to record, with its supporting evidence.
#[derive(Clone, Debug)]
pub struct OutcomeRecord {
    /// The outcome.
    pub outcome: TerminalOutcome,
    /// Where it came from.
    pub source: SourceOfTruth,
    /// Diagnostic text.
    pub diagnostic: Option<String>,
    /// A source location for the diagnostic.
    pub location: Option<SourceLocation>,
}

/// Mapping from node to its result within a single run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunResultTable {
    entries: HashMap<TestNodeId, ResultEntry>,
}

impl RunResultTable {
    /// Creates a new, empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entry for a node, if one was recorded.
    pub fn get(&self, id: &TestNodeId) -> Option<&ResultEntry> {
        self.entries.get(id)
    }

    /// Returns the outcome of a node, `Unset` if nothing was recorded.
    pub fn outcome(&self, id: &TestNodeId) -> Outcome {
        self.entries
            .get(id)
            .map_or(Outcome::Unset, |entry| entry.outcome)
    }

    /// Iterates over all recorded entries, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&TestNodeId, &ResultEntry)> {
        self.entries.iter()
    }

    /// Returns the number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if any node holds a terminal outcome.
    pub fn has_terminal_outcomes(&self) -> bool {
        self.entries.values().any(|entry| entry.outcome.is_terminal())
    }

    /// Marks a node as running. Returns false if the node is already running or terminal.
    pub fn mark_running(&mut self, id: &TestNodeId) -> bool {
        let entry = self.entries.entry(id.clone()).or_default();
        if entry.outcome == Outcome::Unset {
            entry.outcome = Outcome::Running;
            true
        } else {
            false
        }
    }

    /// Records a terminal outcome for a node.
    ///
    /// If the node already has a terminal outcome, the existing outcome is kept and
    /// [`RecordResult::AlreadyTerminal`] is returned.
    pub fn record(&mut self, id: &TestNodeId, record: OutcomeRecord) -> RecordResult {
        let entry = self.entries.entry(id.clone()).or_default();
        if entry.outcome.is_terminal() {
            return RecordResult::AlreadyTerminal(entry.outcome);
        }
        *entry = ResultEntry {
            outcome: record.outcome.into(),
            diagnostic: record.diagnostic,
            location: record.location,
            source: Some(record.source),
        };
        RecordResult::Recorded
    }

    /// Overwrites the outcome of a node with one from the structured report.
    ///
    /// Returns the previous outcome. A pass clears any existing diagnostic and location. Otherwise
    /// existing diagnostics are kept if the report has none.
    pub(crate) fn correct(&mut self, id: &TestNodeId, record: OutcomeRecord) -> Outcome {
        let entry = self.entries.entry(id.clone()).or_default();
        let previous = entry.outcome;
        entry.outcome = record.outcome.into();
        entry.source = Some(record.source);
        if record.outcome == TerminalOutcome::Passed {
            entry.diagnostic = record.diagnostic;
            entry.location = record.location;
            return previous;
        }
        if record.diagnostic.is_some() {
            entry.diagnostic = record.diagnostic;
        }
        if record.location.is_some() {
            entry.location = record.location;
        }
        previous
    }

    /// Marks every given node that is not yet terminal with `outcome`, attributed to the run
    /// controller.
    ///
    /// Returns the nodes that were changed.
    pub fn mark_unfinished<'a>(
        &mut self,
        ids: impl IntoIterator<Item = &'a TestNodeId>,
        outcome: TerminalOutcome,
        diagnostic: &str,
    ) -> Vec<TestNodeId> {
        let mut changed = Vec::new();
        for id in ids {
            let record = OutcomeRecord {
                outcome,
                source: SourceOfTruth::Controller,
                diagnostic: Some(diagnostic.to_owned()),
                location: None,
            };
            if self.record(id, record) == RecordResult::Recorded {
                changed.push(id.clone());
            }
        }
        changed.sort_unstable();
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::test_helpers::id;
    use pretty_assertions::assert_eq;

    fn streaming(outcome: TerminalOutcome) -> OutcomeRecord {
        OutcomeRecord {
            outcome,
            source: SourceOfTruth::Streaming,
            diagnostic: None,
            location: None,
        }
    }

    #[test]
    fn outcomes_only_move_forward() {
        let mut table = RunResultTable::new();
        let node = id("Unit::tests/FooTest.php::testLogin");

        assert_eq!(table.outcome(&node), Outcome::Unset);
        assert!(table.mark_running(&node));
        assert!(!table.mark_running(&node), "already running");
        assert_eq!(table.outcome(&node), Outcome::Running);

        assert_eq!(
            table.record(&node, streaming(TerminalOutcome::Failed)),
            RecordResult::Recorded
        );
        assert_eq!(
            table.record(&node, streaming(TerminalOutcome::Passed)),
            RecordResult::AlreadyTerminal(Outcome::Failed)
        );
        assert!(!table.mark_running(&node), "terminal nodes cannot run again");
        assert_eq!(table.outcome(&node), Outcome::Failed);
    }

    #[test]
    fn correct_overrides_terminal() {
        let mut table = RunResultTable::new();
        let node = id("Unit::tests/FooTest.php::testLogin");
        table.record(
            &node,
            OutcomeRecord {
                diagnostic: Some("✗ testLogin".to_owned()),
                ..streaming(TerminalOutcome::Failed)
            },
        );

        let previous = table.correct(
            &node,
            OutcomeRecord {
                outcome: TerminalOutcome::Passed,
                source: SourceOfTruth::Report,
                diagnostic: None,
                location: None,
            },
        );
        assert_eq!(previous, Outcome::Failed);

        let entry = table.get(&node).unwrap();
        assert_eq!(entry.outcome, Outcome::Passed);
        assert_eq!(entry.source, Some(SourceOfTruth::Report));
        assert_eq!(entry.diagnostic, None, "a pass drops the streaming failure text");
        assert_eq!(entry.location, None);
    }

    #[test]
    fn correct_to_failure_keeps_streaming_diagnostic() {
        let mut table = RunResultTable::new();
        let node = id("Unit::tests/FooTest.php::testLogin");
        table.record(
            &node,
            OutcomeRecord {
                diagnostic: Some("- testLogin".to_owned()),
                ..streaming(TerminalOutcome::Skipped)
            },
        );

        table.correct(
            &node,
            OutcomeRecord {
                outcome: TerminalOutcome::Failed,
                source: SourceOfTruth::Report,
                diagnostic: None,
                location: None,
            },
        );

        let entry = table.get(&node).unwrap();
        assert_eq!(entry.outcome, Outcome::Failed);
        assert_eq!(entry.diagnostic.as_deref(), Some("- testLogin"));
    }

    #[test]
    fn mark_unfinished_keeps_terminal_nodes() {
        let mut table = RunResultTable::new();
        let done = id("a");
        let running = id("b");
        let unset = id("c");
        table.record(&done, streaming(TerminalOutcome::Passed));
        table.mark_running(&running);

        let changed = table.mark_unfinished(
            [&done, &running, &unset],
            TerminalOutcome::Skipped,
            "run cancelled",
        );
        assert_eq!(changed, vec![running.clone(), unset.clone()]);
        assert_eq!(table.outcome(&done), Outcome::Passed);
        assert_eq!(table.outcome(&running), Outcome::Skipped);

        let entry = table.get(&unset).unwrap();
        assert_eq!(entry.source, Some(SourceOfTruth::Controller));
        assert!(!entry.is_executed(), "controller outcomes are not executions");
    }
}
