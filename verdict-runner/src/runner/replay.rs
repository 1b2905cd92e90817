// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::imp::{RunFinished, RunPipeline, RunState};
use crate::{
    aggregator::AggregationPolicy,
    classifier::{OutputChannel, StreamingClassifier},
    diagnostics::DiagnosticSink,
    errors::{ReplayError, TestTreeBuildError},
    name_index::NameIndex,
    report::ReportWait,
    reporter::events::RunEvent,
    tree::{RunScope, TestTree},
};
use camino::Utf8PathBuf;
use std::time::Duration;
use verdict_metadata::TestNodeId;

/// Replays a saved run without spawning anything.
///
/// The output log is classified as if it had been written to stdout in one piece, then the
/// report (if any) is reconciled and verdicts are aggregated exactly as for a live run.
#[derive(Clone, Debug)]
pub struct Replay<'a> {
    tree: &'a TestTree,
    scope: RunScope,
    output_log: Utf8PathBuf,
    report_path: Option<Utf8PathBuf>,
    exit_code: Option<i32>,
    policy: AggregationPolicy,
}

impl<'a> Replay<'a> {
    /// Creates a replay of `output_log` over the leaves selected by `targets`.
    pub fn new(
        tree: &'a TestTree,
        targets: &[TestNodeId],
        output_log: impl Into<Utf8PathBuf>,
    ) -> Result<Self, TestTreeBuildError> {
        Ok(Self {
            tree,
            scope: tree.scope(targets)?,
            output_log: output_log.into(),
            report_path: None,
            exit_code: None,
            policy: AggregationPolicy::default(),
        })
    }

    /// Sets the JUnit report to reconcile against.
    pub fn with_report_path(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.report_path = Some(path.into());
        self
    }

    /// Sets the exit code the original process exited with. A nonzero code fails the run.
    pub fn with_exit_code(mut self, exit_code: i32) -> Self {
        self.exit_code = Some(exit_code);
        self
    }

    /// Sets the aggregation policy.
    pub fn with_policy(mut self, policy: AggregationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Runs the replay, sending events to `callback`.
    pub async fn run<F>(&self, callback: F) -> Result<RunFinished, ReplayError>
    where
        F: FnMut(RunEvent<'_>),
    {
        let output = tokio::fs::read(&self.output_log)
            .await
            .map_err(|error| ReplayError::ReadOutputLog {
                path: self.output_log.clone(),
                error,
            })?;

        let diagnostics = DiagnosticSink::new(self.output_log.as_str());
        let index = NameIndex::for_scope(self.tree, &self.scope);
        let mut pipeline = RunPipeline::new(
            self.tree,
            &self.scope,
            self.policy,
            diagnostics.clone(),
            callback,
        );
        pipeline.start(self.output_log.as_str(), self.report_path.as_deref());
        pipeline.transition(RunState::Streaming);

        let mut classifier = StreamingClassifier::new(&index, diagnostics);
        pipeline.on_chunk(&mut classifier, OutputChannel::Stdout, &output);
        pipeline.finish_output(&mut classifier);

        // The report already exists, so there is nothing to wait for.
        let wait = ReportWait {
            grace_period: Duration::ZERO,
            ..ReportWait::default()
        };
        let report = self.report_path.as_deref().map(|path| (path, wait));
        let process_ok = self.exit_code.is_none_or(|code| code == 0);
        Ok(pipeline
            .complete(classifier, &index, report, None, self.exit_code, process_ok)
            .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        run_table::{Outcome, SourceOfTruth},
        runner::TerminalStatus,
        tree::test_helpers::{file, id, suite, tree},
    };
    use camino_tempfile::tempdir;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use quick_junit::{NonSuccessKind, Report, TestCase, TestCaseStatus, TestSuite};

    fn fixture_tree() -> TestTree {
        tree(vec![suite(
            "unit",
            vec![file(
                "tests/Unit/CartTest.php",
                Some("Tests\\Unit\\CartTest"),
                &["testAddsItem", "testRemovesItem", "testTotals"],
            )],
        )])
    }

    #[tokio::test]
    async fn replays_output_and_report() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("output.log");
        std::fs::write(
            &log,
            indoc! {"
                   PASS  Tests\\Unit\\CartTest
                  ✓ adds item
                  ✓ removes item
                  ✓ totals
            "},
        )
        .unwrap();

        let mut suite = TestSuite::new("unit");
        suite.add_test_case(TestCase::new("testAddsItem", TestCaseStatus::success()));
        let mut failure = TestCaseStatus::non_success(NonSuccessKind::Failure);
        failure.set_message("Failed asserting that 3 is identical to 4.");
        suite.add_test_case(TestCase::new("testTotals", failure));
        let mut report = Report::new("verdict");
        report.add_test_suite(suite);
        let report_path = dir.path().join("junit.xml");
        std::fs::write(&report_path, report.to_string().unwrap()).unwrap();

        let tree = fixture_tree();
        let replay = Replay::new(&tree, &[], &log)
            .unwrap()
            .with_report_path(&report_path);
        let mut events = 0;
        let finished = replay.run(|_| events += 1).await.unwrap();

        assert!(events > 0);
        assert_eq!(finished.terminal, TerminalStatus::Failed);
        let totals = finished
            .table
            .get(&id("unit::tests/Unit/CartTest.php::testTotals"))
            .unwrap();
        assert_eq!(totals.outcome, Outcome::Failed);
        assert_eq!(totals.source, Some(SourceOfTruth::Report));
        assert_eq!(finished.corrections.corrections.len(), 1);
    }

    #[tokio::test]
    async fn nonzero_exit_code_fails_the_replay() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("output.log");
        std::fs::write(&log, "  ✓ testAddsItem\n  ✓ testRemovesItem\n  ✓ testTotals\n").unwrap();

        let tree = fixture_tree();
        let finished = Replay::new(&tree, &[], &log)
            .unwrap()
            .with_exit_code(255)
            .run(|_| {})
            .await
            .unwrap();
        assert_eq!(finished.terminal, TerminalStatus::Failed);
        assert!(!finished.verdicts.has_failures());
    }

    #[tokio::test]
    async fn missing_output_log() {
        let dir = tempdir().unwrap();
        let tree = fixture_tree();
        let error = Replay::new(&tree, &[], dir.path().join("missing.log"))
            .unwrap()
            .run(|_| {})
            .await
            .unwrap_err();
        assert!(matches!(error, ReplayError::ReadOutputLog { .. }), "{error}");
    }
}
