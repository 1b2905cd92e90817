// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Folding leaf outcomes into container verdicts.
//!
//! The [`Aggregator`] turns the final [`RunResultTable`] into [`Verdicts`]: one assignment per
//! node the run has evidence about. A node without an assignment keeps whatever state it had
//! before the run. Containers (files, suites and methods with datasets) are only `Passed` when
//! every declared child executed, so an incomplete run is never reported as a pass.

use crate::{
    diagnostics::DiagnosticSink,
    fatal_error::FatalErrorInfo,
    run_table::{Outcome, OutcomeRecord, ResultEntry, RunResultTable, SourceOfTruth, TerminalOutcome},
    tree::{NodeKind, RunScope, SourceLocation, TestFile, TestMethod, TestSuite, TestTree},
};
use std::collections::BTreeMap;
use tracing::debug;
use verdict_metadata::{NodeResultSummary, TestNodeId};

/// The diagnostic attached to nodes failed by an early abort.
pub const EARLY_ABORT_DIAGNOSTIC: &str = "execution aborted by fatal error";

/// Policy knobs for aggregation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AggregationPolicy {
    /// Whether a leaf never mentioned by the runner defaults to `Passed` when a sibling in the
    /// same file executed and none failed.
    ///
    /// This trusts the runner to print every failure. Disable it for runners that don't.
    ///
    /// A fatal error reported after some results arrived does not suppress this: the file's
    /// unmentioned leaves still default to `Passed` once a sibling passed.
    pub default_pass: bool,
}

impl Default for AggregationPolicy {
    fn default() -> Self {
        Self { default_pass: true }
    }
}

/// How a run was aggregated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AggregationMode {
    /// Leaf outcomes were recorded and folded normally.
    Normal,
    /// A fatal error stopped the run before any leaf outcome was recorded.
    EarlyAbort {
        /// The file the fatal error was attributed to, if any.
        file: Option<TestNodeId>,
    },
}

/// The verdict assigned to a single node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verdict {
    /// The kind of node.
    pub kind: NodeKind,
    /// The outcome. Non-terminal leaf outcomes are reported as `Unset`.
    pub outcome: Outcome,
    /// Where a leaf outcome came from. `None` for containers.
    pub source: Option<SourceOfTruth>,
    /// Diagnostic text.
    pub diagnostic: Option<String>,
    /// A source location for the diagnostic.
    pub location: Option<SourceLocation>,
}

impl Verdict {
    fn container(kind: NodeKind, outcome: Outcome, location: Option<SourceLocation>) -> Self {
        Self {
            kind,
            outcome,
            source: None,
            diagnostic: None,
            location,
        }
    }

    fn leaf(kind: NodeKind, entry: Option<&ResultEntry>) -> Self {
        match entry {
            Some(entry) if entry.outcome.is_terminal() => Self {
                kind,
                outcome: entry.outcome,
                source: entry.source,
                diagnostic: entry.diagnostic.clone(),
                location: entry.location.clone(),
            },
            _ => Self::container(kind, Outcome::Unset, None),
        }
    }

    /// Converts this verdict to its serializable form.
    pub fn to_summary(&self) -> NodeResultSummary {
        NodeResultSummary {
            kind: self.kind.to_summary(),
            outcome: self.outcome.to_summary(),
            source: self.source.map(SourceOfTruth::to_summary),
            diagnostic: self.diagnostic.clone(),
            location: self.location.as_ref().map(|location| {
                verdict_metadata::LocationSummary {
                    file: location.file.clone(),
                    line: location.line,
                }
            }),
        }
    }
}

/// Counts of leaf verdicts by outcome.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LeafCounts {
    /// Leaves that passed.
    pub passed: usize,
    /// Leaves that failed.
    pub failed: usize,
    /// Leaves that were skipped.
    pub skipped: usize,
    /// Leaves without a terminal outcome.
    pub unset: usize,
}

impl LeafCounts {
    /// Returns the total number of leaves.
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped + self.unset
    }
}

/// Verdict assignments for one run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verdicts {
    mode: AggregationMode,
    assignments: BTreeMap<TestNodeId, Verdict>,
}

impl Verdicts {
    /// Returns how the run was aggregated.
    pub fn mode(&self) -> &AggregationMode {
        &self.mode
    }

    /// Returns the verdict for a node, or `None` if the run leaves it untouched.
    pub fn get(&self, id: &TestNodeId) -> Option<&Verdict> {
        self.assignments.get(id)
    }

    /// Iterates over all assignments, ordered by node id.
    pub fn iter(&self) -> impl Iterator<Item = (&TestNodeId, &Verdict)> {
        self.assignments.iter()
    }

    /// Returns the number of assignments.
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    /// Returns true if the run assigns no verdicts.
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Returns true if any assignment is `Failed`.
    pub fn has_failures(&self) -> bool {
        self.assignments
            .values()
            .any(|verdict| verdict.outcome == Outcome::Failed)
    }

    /// Counts leaf verdicts by outcome.
    pub fn leaf_counts(&self, tree: &TestTree) -> LeafCounts {
        let mut counts = LeafCounts::default();
        for (id, verdict) in &self.assignments {
            let is_leaf = match verdict.kind {
                NodeKind::DatasetVariant => true,
                NodeKind::Method => tree
                    .get(id)
                    .is_some_and(|node| matches!(node, crate::tree::TestNodeRef::Method(m) if m.is_leaf())),
                NodeKind::File | NodeKind::Suite => false,
            };
            if !is_leaf {
                continue;
            }
            match verdict.outcome {
                Outcome::Passed => counts.passed += 1,
                Outcome::Failed => counts.failed += 1,
                Outcome::Skipped => counts.skipped += 1,
                Outcome::Unset | Outcome::Running => counts.unset += 1,
            }
        }
        counts
    }
}

/// Derives container verdicts from leaf outcomes.
#[derive(Debug)]
pub struct Aggregator<'a> {
    tree: &'a TestTree,
    scope: &'a RunScope,
    policy: AggregationPolicy,
    diagnostics: DiagnosticSink,
}

impl<'a> Aggregator<'a> {
    /// Creates a new aggregator for a run over `scope`.
    pub fn new(
        tree: &'a TestTree,
        scope: &'a RunScope,
        policy: AggregationPolicy,
        diagnostics: DiagnosticSink,
    ) -> Self {
        Self {
            tree,
            scope,
            policy,
            diagnostics,
        }
    }

    /// Aggregates the final result table.
    ///
    /// The table is updated with derived leaf outcomes: early-abort failures, outcomes
    /// propagated from a method to its datasets, and default passes.
    pub fn aggregate(
        &self,
        table: &mut RunResultTable,
        fatal_error: Option<&FatalErrorInfo>,
    ) -> Verdicts {
        let executed_any = self.scope.leaves().any(|leaf| self.executed(table, leaf))
            || self.in_scope_methods().any(|(_, method)| self.executed(table, &method.id));

        match fatal_error {
            Some(fatal_error) if !executed_any => self.aggregate_early_abort(table, fatal_error),
            _ => {
                if let Some(fatal_error) = fatal_error {
                    self.diagnostics.warn(format!(
                        "fatal error after results were recorded: {fatal_error}"
                    ));
                }
                self.aggregate_normal(table)
            }
        }
    }

    fn executed(&self, table: &RunResultTable, id: &TestNodeId) -> bool {
        table.get(id).is_some_and(ResultEntry::is_executed)
    }

    fn in_scope_methods(&self) -> impl Iterator<Item = (&'a TestFile, &'a TestMethod)> + '_ {
        self.scope.files(self.tree).flat_map(move |file| {
            file.methods
                .iter()
                .filter(move |method| method.leaf_ids().any(|id| self.scope.contains(id)))
                .map(move |method| (file, method))
        })
    }

    fn aggregate_early_abort(
        &self,
        table: &mut RunResultTable,
        fatal_error: &FatalErrorInfo,
    ) -> Verdicts {
        let file = self.attribute_fatal_error(fatal_error);
        let mut assignments = BTreeMap::new();

        let Some(file) = file else {
            self.diagnostics.warn(format!(
                "fatal error could not be attributed to a file in this run: {fatal_error}"
            ));
            return Verdicts {
                mode: AggregationMode::EarlyAbort { file: None },
                assignments,
            };
        };

        debug!(file = %file.id, "early abort");
        let diagnostic = format!("{EARLY_ABORT_DIAGNOSTIC}: {}", fatal_error.message);
        let record = |location: Option<SourceLocation>| OutcomeRecord {
            outcome: TerminalOutcome::Failed,
            source: SourceOfTruth::Controller,
            diagnostic: Some(diagnostic.clone()),
            location,
        };

        for method in &file.methods {
            let in_scope: Vec<&TestNodeId> = method
                .leaf_ids()
                .filter(|id| self.scope.contains(id))
                .collect();
            if in_scope.is_empty() {
                continue;
            }
            for leaf in in_scope {
                table.record(leaf, record(fatal_error.location()));
                let kind = if method.is_leaf() {
                    NodeKind::Method
                } else {
                    NodeKind::DatasetVariant
                };
                assignments.insert(leaf.clone(), Verdict::leaf(kind, table.get(leaf)));
            }
            if !method.is_leaf() {
                let mut verdict =
                    Verdict::container(NodeKind::Method, Outcome::Failed, Some(method.location()));
                verdict.diagnostic = Some(diagnostic.clone());
                assignments.insert(method.id.clone(), verdict);
            }
        }

        let mut verdict = Verdict::container(
            NodeKind::File,
            Outcome::Failed,
            fatal_error.location().or_else(|| Some(file.location())),
        );
        verdict.diagnostic = Some(diagnostic);
        assignments.insert(file.id.clone(), verdict);

        Verdicts {
            mode: AggregationMode::EarlyAbort {
                file: Some(file.id.clone()),
            },
            assignments,
        }
    }

    fn attribute_fatal_error(&self, fatal_error: &FatalErrorInfo) -> Option<&'a TestFile> {
        if let Some(path) = &fatal_error.file
            && let Some(file) = self.tree.find_file_by_path(path)
            && self.scope.touches_file(file)
        {
            return Some(file);
        }
        let mut files = self.scope.files(self.tree);
        match (files.next(), files.next()) {
            (Some(only), None) => Some(only),
            _ => None,
        }
    }

    fn aggregate_normal(&self, table: &mut RunResultTable) -> Verdicts {
        self.propagate_method_outcomes(table);
        if self.policy.default_pass {
            self.apply_default_pass(table);
        }

        let mut assignments = BTreeMap::new();
        for suite in self.tree.suites() {
            if let Some(outcome) = self.assign_suite(suite, table, &mut assignments) {
                assignments.insert(
                    suite.id.clone(),
                    Verdict::container(NodeKind::Suite, outcome, None),
                );
            }
        }

        Verdicts {
            mode: AggregationMode::Normal,
            assignments,
        }
    }

    /// A direct outcome on a method with datasets applies to each dataset without its own.
    fn propagate_method_outcomes(&self, table: &mut RunResultTable) {
        for (_, method) in self.in_scope_methods() {
            if method.is_leaf() {
                continue;
            }
            let Some(entry) = table.get(&method.id).filter(|entry| entry.is_executed()).cloned()
            else {
                continue;
            };
            let Some(outcome) = terminal(entry.outcome) else {
                continue;
            };
            for dataset in &method.datasets {
                if !self.scope.contains(&dataset.id) || table.outcome(&dataset.id).is_terminal() {
                    continue;
                }
                table.record(
                    &dataset.id,
                    OutcomeRecord {
                        outcome,
                        source: entry.source.unwrap_or(SourceOfTruth::Streaming),
                        diagnostic: entry.diagnostic.clone(),
                        location: entry.location.clone(),
                    },
                );
            }
        }
    }

    fn apply_default_pass(&self, table: &mut RunResultTable) {
        for file in self.scope.files(self.tree) {
            let leaves: Vec<&TestNodeId> = file
                .leaf_ids()
                .filter(|id| self.scope.contains(id))
                .collect();
            let executed = leaves.iter().any(|leaf| self.executed(table, leaf));
            let failed = leaves
                .iter()
                .any(|leaf| table.outcome(leaf) == Outcome::Failed);
            if !executed || failed {
                continue;
            }
            for leaf in leaves {
                if table.outcome(leaf).is_terminal() {
                    continue;
                }
                debug!(%leaf, "default pass");
                table.record(
                    leaf,
                    OutcomeRecord {
                        outcome: TerminalOutcome::Passed,
                        source: SourceOfTruth::DefaultPass,
                        diagnostic: None,
                        location: None,
                    },
                );
            }
        }
    }

    /// Assigns verdicts under `suite`, returning the suite's outcome if it has any leaf in scope.
    fn assign_suite(
        &self,
        suite: &TestSuite,
        table: &RunResultTable,
        assignments: &mut BTreeMap<TestNodeId, Verdict>,
    ) -> Option<Outcome> {
        let mut touched = false;
        let mut children = Vec::with_capacity(suite.files.len());
        for file in &suite.files {
            let touches = self.scope.touches_file(file);
            let outcome = self.assign_file(file, table, touches.then_some(&mut *assignments));
            if touches {
                touched = true;
                assignments.insert(
                    file.id.clone(),
                    Verdict::container(NodeKind::File, outcome, Some(file.location())),
                );
            }
            children.push(outcome);
        }
        touched.then(|| fold(children))
    }

    /// Computes a file's outcome, recording assignments for its in-scope nodes if asked to.
    fn assign_file(
        &self,
        file: &TestFile,
        table: &RunResultTable,
        mut assignments: Option<&mut BTreeMap<TestNodeId, Verdict>>,
    ) -> Outcome {
        let mut children = Vec::with_capacity(file.methods.len());
        for method in &file.methods {
            let outcome = if method.is_leaf() {
                if self.scope.contains(&method.id)
                    && let Some(assignments) = assignments.as_deref_mut()
                {
                    let verdict = Verdict::leaf(NodeKind::Method, table.get(&method.id));
                    assignments.insert(method.id.clone(), verdict);
                }
                child_outcome(table, &method.id)
            } else {
                let mut any_in_scope = false;
                for dataset in &method.datasets {
                    if self.scope.contains(&dataset.id) {
                        any_in_scope = true;
                        if let Some(assignments) = assignments.as_deref_mut() {
                            let verdict =
                                Verdict::leaf(NodeKind::DatasetVariant, table.get(&dataset.id));
                            assignments.insert(dataset.id.clone(), verdict);
                        }
                    }
                }
                let outcome = fold(
                    method
                        .datasets
                        .iter()
                        .map(|dataset| child_outcome(table, &dataset.id)),
                );
                if any_in_scope && let Some(assignments) = assignments.as_deref_mut() {
                    assignments.insert(
                        method.id.clone(),
                        Verdict::container(NodeKind::Method, outcome, Some(method.location())),
                    );
                }
                outcome
            };
            children.push(outcome);
        }
        fold(children)
    }
}

/// The outcome a leaf contributes to its container.
///
/// Outcomes set by the run controller don't count as executions, except for failures.
fn child_outcome(table: &RunResultTable, id: &TestNodeId) -> Outcome {
    match table.get(id) {
        Some(entry) if entry.is_executed() || entry.outcome == Outcome::Failed => entry.outcome,
        _ => Outcome::Unset,
    }
}

fn terminal(outcome: Outcome) -> Option<TerminalOutcome> {
    match outcome {
        Outcome::Passed => Some(TerminalOutcome::Passed),
        Outcome::Failed => Some(TerminalOutcome::Failed),
        Outcome::Skipped => Some(TerminalOutcome::Skipped),
        Outcome::Unset | Outcome::Running => None,
    }
}

/// The container rule.
///
/// Any failed child fails the container. Otherwise, if every child executed, the container
/// passes when at least one child passed and is skipped when all were skipped. Otherwise the
/// container has no outcome for this run.
fn fold(children: impl IntoIterator<Item = Outcome>) -> Outcome {
    let mut any_passed = false;
    let mut all_executed = true;
    let mut empty = true;
    for child in children {
        empty = false;
        match child {
            Outcome::Failed => return Outcome::Failed,
            Outcome::Passed => any_passed = true,
            Outcome::Skipped => {}
            Outcome::Unset | Outcome::Running => all_executed = false,
        }
    }
    match (empty, all_executed, any_passed) {
        (true, _, _) | (false, false, _) => Outcome::Unset,
        (false, true, true) => Outcome::Passed,
        (false, true, false) => Outcome::Skipped,
    }
}
