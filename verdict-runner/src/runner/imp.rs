// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{
    cancel::CancelReceiver,
    os,
    process::{ChildProcess, ProcessExecutor, SpawnRequest},
};
use crate::{
    aggregator::{AggregationPolicy, Aggregator, Verdicts},
    classifier::{ClassifierEvent, OutputChannel, StreamingClassifier},
    diagnostics::{Diagnostic, DiagnosticSink},
    errors::{InvocationError, TestTreeBuildError},
    fatal_error::{self, FatalErrorInfo},
    helpers::{FormattedDuration, display_exited_with, plural},
    name_index::NameIndex,
    report::{CorrectionSet, Reconciler, ReportWait},
    reporter::events::{RunEvent, RunEventKind},
    run_table::{OutcomeRecord, RecordResult, RunResultTable, SourceOfTruth, TerminalOutcome},
    time::{StopwatchStart, stopwatch},
    tree::{RunScope, TestTree},
};
use bytes::Bytes;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, FixedOffset, Local};
use debug_ignore::DebugIgnore;
use std::{fmt, io, process::ExitStatus, time::Duration};
use tracing::{Instrument, debug, info, warn};
use verdict_metadata::{RunStatusSummary, TestNodeId};

/// How long to keep reading output after the process exits, in case a grandchild still holds the
/// pipes open.
const LEAK_TIMEOUT: Duration = Duration::from_millis(100);

/// Settings for a run, usually derived from a [`VerdictProfile`](crate::config::VerdictProfile).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunSettings {
    /// The wall-clock bound for the test runner process.
    pub timeout: Duration,

    /// How long to wait after `SIGTERM` before sending `SIGKILL`.
    pub termination_grace_period: Duration,

    /// How long to wait for the structured report after the process exits.
    pub report_wait: ReportWait,

    /// How leaf outcomes are folded into verdicts.
    pub policy: AggregationPolicy,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            termination_grace_period: Duration::from_secs(10),
            report_wait: ReportWait::default(),
            policy: AggregationPolicy::default(),
        }
    }
}

/// A single invocation of the test runner.
#[derive(Clone, Debug)]
pub struct Invocation {
    command: String,
    cwd: Option<Utf8PathBuf>,
    report_path: Option<Utf8PathBuf>,
    scope: RunScope,
    label: String,
}

impl Invocation {
    /// Creates an invocation of `command` that targets `targets` in `tree`.
    ///
    /// An empty target list targets the whole tree.
    pub fn new(
        tree: &TestTree,
        command: impl Into<String>,
        targets: &[TestNodeId],
    ) -> Result<Self, TestTreeBuildError> {
        let scope = tree.scope(targets)?;
        let label = match targets {
            [] => "all".to_owned(),
            [target] => target.to_string(),
            [first, rest @ ..] => format!("{first} (+{} more)", rest.len()),
        };
        Ok(Self {
            command: command.into(),
            cwd: None,
            report_path: None,
            scope,
            label,
        })
    }

    /// Sets the path the runner writes its JUnit report to.
    pub fn with_report_path(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.report_path = Some(path.into());
        self
    }

    /// Sets the working directory of the runner.
    pub fn with_cwd(mut self, cwd: impl Into<Utf8PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Returns the command string.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Returns the report path, if one was set.
    pub fn report_path(&self) -> Option<&Utf8Path> {
        self.report_path.as_deref()
    }

    /// Returns the leaves this invocation targets.
    pub fn scope(&self) -> &RunScope {
        &self.scope
    }

    /// Returns a short label for logs.
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// The state of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    /// Nothing has happened yet.
    Idle,
    /// The process is being started.
    Spawning,
    /// Output is being classified as it arrives.
    Streaming,
    /// The process exited and the report is being waited for.
    AwaitingReport,
    /// The report is being applied.
    Reconciling,
    /// Verdicts are being derived.
    Aggregating,
    /// The run is over.
    Terminal(TerminalStatus),
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::Spawning => write!(f, "spawning"),
            RunState::Streaming => write!(f, "streaming"),
            RunState::AwaitingReport => write!(f, "awaiting report"),
            RunState::Reconciling => write!(f, "reconciling"),
            RunState::Aggregating => write!(f, "aggregating"),
            RunState::Terminal(status) => write!(f, "terminal ({status})"),
        }
    }
}

/// How a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TerminalStatus {
    /// The process exited with code 0, no fatal error was seen and nothing failed.
    Passed,
    /// Something failed.
    Failed,
    /// The run was cancelled.
    Cancelled,
    /// The run hit its timeout.
    TimedOut,
}

impl TerminalStatus {
    /// Returns true if the run passed.
    pub fn is_success(self) -> bool {
        self == TerminalStatus::Passed
    }

    /// Converts this status to its serializable form.
    pub fn to_summary(self) -> RunStatusSummary {
        match self {
            TerminalStatus::Passed => RunStatusSummary::Passed,
            TerminalStatus::Failed => RunStatusSummary::Failed,
            TerminalStatus::Cancelled => RunStatusSummary::Cancelled,
            TerminalStatus::TimedOut => RunStatusSummary::TimedOut,
        }
    }
}

impl fmt::Display for TerminalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminalStatus::Passed => write!(f, "passed"),
            TerminalStatus::Failed => write!(f, "failed"),
            TerminalStatus::Cancelled => write!(f, "cancelled"),
            TerminalStatus::TimedOut => write!(f, "timed out"),
        }
    }
}

/// The results of a completed run.
#[derive(Clone, Debug)]
pub struct RunFinished {
    /// How the run ended.
    pub terminal: TerminalStatus,

    /// The final result table.
    pub table: RunResultTable,

    /// Verdicts for every node the run touched.
    pub verdicts: Verdicts,

    /// What the structured report changed.
    pub corrections: CorrectionSet,

    /// The fatal error in the output, if any.
    pub fatal_error: Option<FatalErrorInfo>,

    /// The exit code of the process, if it exited normally.
    pub exit_code: Option<i32>,

    /// When the run started.
    pub start_time: DateTime<FixedOffset>,

    /// How long the run took.
    pub elapsed: Duration,

    /// Diagnostics recorded during the run.
    pub diagnostics: Vec<Diagnostic>,
}

/// Why a run was stopped before the process exited on its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Interrupted {
    Cancelled,
    TimedOut,
}

impl Interrupted {
    fn diagnostic(self) -> &'static str {
        match self {
            Interrupted::Cancelled => "run cancelled before this test finished",
            Interrupted::TimedOut => "run timed out before this test finished",
        }
    }

    fn terminal(self) -> TerminalStatus {
        match self {
            Interrupted::Cancelled => TerminalStatus::Cancelled,
            Interrupted::TimedOut => TerminalStatus::TimedOut,
        }
    }
}

/// Drives a single invocation of the test runner from spawn to verdicts.
#[derive(Debug)]
pub struct RunController<'a> {
    tree: &'a TestTree,
    executor: &'a dyn ProcessExecutor,
    settings: RunSettings,
    cancel: CancelReceiver,
}

impl<'a> RunController<'a> {
    /// Creates a new controller for runs over `tree`.
    pub fn new(
        tree: &'a TestTree,
        executor: &'a dyn ProcessExecutor,
        settings: RunSettings,
    ) -> Self {
        Self {
            tree,
            executor,
            settings,
            cancel: CancelReceiver::never(),
        }
    }

    /// Sets the receiver that cancels runs.
    pub fn with_cancel(mut self, cancel: CancelReceiver) -> Self {
        self.cancel = cancel;
        self
    }

    /// Executes `invocation`, sending events to `callback` as they happen.
    ///
    /// Returns an error, after an [`InvocationFailed`](RunEventKind::InvocationFailed) event, if
    /// the process could not be started. Test failures, cancellation and timeouts are all
    /// reported through [`RunFinished::terminal`].
    pub async fn execute<F>(
        &self,
        invocation: &Invocation,
        callback: F,
    ) -> Result<RunFinished, InvocationError>
    where
        F: FnMut(RunEvent<'_>),
    {
        let diagnostics = DiagnosticSink::new(invocation.label());
        let span = diagnostics.span().clone();
        self.execute_inner(invocation, diagnostics, callback)
            .instrument(span)
            .await
    }

    async fn execute_inner<F>(
        &self,
        invocation: &Invocation,
        diagnostics: DiagnosticSink,
        callback: F,
    ) -> Result<RunFinished, InvocationError>
    where
        F: FnMut(RunEvent<'_>),
    {
        let index = NameIndex::for_scope(self.tree, &invocation.scope);
        let mut pipeline = RunPipeline::new(
            self.tree,
            &invocation.scope,
            self.settings.policy,
            diagnostics.clone(),
            callback,
        );
        pipeline.start(&invocation.command, invocation.report_path());

        if let Some(report_path) = invocation.report_path() {
            remove_stale_report(report_path, &diagnostics).await;
        }

        pipeline.transition(RunState::Spawning);
        let request = SpawnRequest {
            command: invocation.command.clone(),
            cwd: invocation.cwd.clone(),
        };
        let mut child = match self.executor.spawn(&request) {
            Ok(child) => child,
            Err(error) => {
                warn!(%error, "failed to start test runner");
                pipeline.emit(RunEventKind::InvocationFailed { error: &error });
                return Err(error);
            }
        };

        pipeline.mark_running();
        pipeline.transition(RunState::Streaming);
        let mut classifier = StreamingClassifier::new(&index, diagnostics.clone());
        let (status, interrupted) = self
            .stream(&mut child, &mut classifier, &mut pipeline)
            .await;
        pipeline.finish_output(&mut classifier);

        let exit_code = match status {
            Ok(status) => {
                debug!("test runner {}", display_exited_with(status));
                status.code()
            }
            Err(error) => {
                diagnostics.warn(format!("failed to wait for test runner: {error}"));
                None
            }
        };

        let report = invocation
            .report_path()
            .map(|path| (path, self.settings.report_wait));
        Ok(pipeline
            .complete(
                classifier,
                &index,
                report,
                interrupted,
                exit_code,
                exit_code == Some(0),
            )
            .await)
    }

    async fn stream<F>(
        &self,
        child: &mut ChildProcess,
        classifier: &mut StreamingClassifier<'_>,
        pipeline: &mut RunPipeline<'_, F>,
    ) -> (io::Result<ExitStatus>, Option<Interrupted>)
    where
        F: FnMut(RunEvent<'_>),
    {
        let ChildProcess { child, fds } = child;
        let grace_period = self.settings.termination_grace_period;
        let mut timeout = std::pin::pin!(tokio::time::sleep(self.settings.timeout));
        let mut cancel = self.cancel.clone();

        let (status, interrupted) = loop {
            tokio::select! {
                Some((channel, chunk)) = fds.next_chunk(), if !fds.is_done() => {
                    pipeline.on_read(classifier, channel, chunk);
                }
                status = child.wait() => break (status, None),
                () = &mut timeout => {
                    warn!(
                        timeout = %FormattedDuration(self.settings.timeout),
                        "test runner timed out, terminating",
                    );
                    let status = os::terminate_child(child, grace_period).await;
                    break (status, Some(Interrupted::TimedOut));
                }
                () = cancel.cancelled() => {
                    info!("run cancelled, terminating test runner");
                    let status = os::terminate_child(child, grace_period).await;
                    break (status, Some(Interrupted::Cancelled));
                }
            }
        };

        let mut leak_timeout = std::pin::pin!(tokio::time::sleep(LEAK_TIMEOUT));
        loop {
            tokio::select! {
                Some((channel, chunk)) = fds.next_chunk(), if !fds.is_done() => {
                    pipeline.on_read(classifier, channel, chunk);
                }
                () = &mut leak_timeout, if !fds.is_done() => {
                    pipeline.diagnostics.debug(
                        "output pipes still open after the test runner exited, ignoring further output",
                    );
                    break;
                }
                else => break,
            }
        }

        (status, interrupted)
    }
}

async fn remove_stale_report(path: &Utf8Path, diagnostics: &DiagnosticSink) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(%path, "removed stale report"),
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(error) => diagnostics.warn(format!("failed to remove stale report `{path}`: {error}")),
    }
}

/// The steps shared by live runs and replays: classification, reconciliation and aggregation,
/// plus event emission.
pub(super) struct RunPipeline<'a, F> {
    tree: &'a TestTree,
    scope: &'a RunScope,
    policy: AggregationPolicy,
    pub(super) diagnostics: DiagnosticSink,
    stopwatch: StopwatchStart,
    state: RunState,
    table: RunResultTable,
    callback: DebugIgnore<F>,
}

impl<'a, F> RunPipeline<'a, F>
where
    F: FnMut(RunEvent<'_>),
{
    pub(super) fn new(
        tree: &'a TestTree,
        scope: &'a RunScope,
        policy: AggregationPolicy,
        diagnostics: DiagnosticSink,
        callback: F,
    ) -> Self {
        Self {
            tree,
            scope,
            policy,
            diagnostics,
            stopwatch: stopwatch(),
            state: RunState::Idle,
            table: RunResultTable::new(),
            callback: DebugIgnore(callback),
        }
    }

    pub(super) fn emit(&mut self, kind: RunEventKind<'_>) {
        emit_to(&self.stopwatch, &mut self.callback.0, kind);
    }

    pub(super) fn start(&mut self, command: &str, report_path: Option<&Utf8Path>) {
        let leaf_count = self.scope.len();
        debug!(command, leaf_count, "starting run");
        self.emit(RunEventKind::RunStarted {
            command,
            leaf_count,
            report_path,
        });
    }

    pub(super) fn transition(&mut self, to: RunState) {
        let from = std::mem::replace(&mut self.state, to);
        debug!(%from, %to, "run state changed");
        self.emit(RunEventKind::StateChanged { from, to });
    }

    fn mark_running(&mut self) {
        for leaf in self.scope.leaves() {
            self.table.mark_running(leaf);
        }
    }

    fn on_read(
        &mut self,
        classifier: &mut StreamingClassifier<'_>,
        channel: OutputChannel,
        chunk: io::Result<Bytes>,
    ) {
        match chunk {
            Ok(chunk) if chunk.is_empty() => {}
            Ok(chunk) => self.on_chunk(classifier, channel, &chunk),
            Err(error) => self
                .diagnostics
                .warn(format!("error reading test runner {channel}: {error}")),
        }
    }

    pub(super) fn on_chunk(
        &mut self,
        classifier: &mut StreamingClassifier<'_>,
        channel: OutputChannel,
        chunk: &[u8],
    ) {
        let Self {
            stopwatch,
            callback: DebugIgnore(callback),
            table,
            ..
        } = self;
        classifier.push_chunk(channel, chunk, |event| {
            handle_classifier_event(stopwatch, callback, table, event)
        });
    }

    pub(super) fn finish_output(&mut self, classifier: &mut StreamingClassifier<'_>) {
        let Self {
            stopwatch,
            callback: DebugIgnore(callback),
            table,
            ..
        } = self;
        classifier.finish(|event| handle_classifier_event(stopwatch, callback, table, event));
    }

    /// Runs everything after the process exited: report, fatal error, aggregation.
    ///
    /// An interrupted run skips the report and the fatal error, and marks unfinished leaves
    /// skipped.
    pub(super) async fn complete(
        mut self,
        classifier: StreamingClassifier<'_>,
        index: &NameIndex,
        report: Option<(&Utf8Path, ReportWait)>,
        interrupted: Option<Interrupted>,
        exit_code: Option<i32>,
        process_ok: bool,
    ) -> RunFinished {
        let combined = classifier.into_combined_output();
        let mut corrections = CorrectionSet::default();
        let mut fatal = None;

        match interrupted {
            Some(interrupted) => {
                let marked = self.table.mark_unfinished(
                    self.scope.leaves(),
                    TerminalOutcome::Skipped,
                    interrupted.diagnostic(),
                );
                self.diagnostics.debug(format!(
                    "{}: marked {} unfinished {} skipped",
                    interrupted.terminal(),
                    marked.len(),
                    plural::tests_str(marked.len()),
                ));
            }
            None => {
                if let Some((path, wait)) = report {
                    let reconciler = Reconciler::new(index, self.diagnostics.clone());
                    self.transition(RunState::AwaitingReport);
                    let contents = reconciler.read_report(path, wait).await;
                    self.transition(RunState::Reconciling);
                    if let Some(contents) = contents {
                        corrections = reconciler.apply_str(path, &contents, &mut self.table);
                        self.emit(RunEventKind::ReportReconciled {
                            corrections: &corrections,
                        });
                    }
                }

                fatal = fatal_error::extract(&combined);
                if let Some(error) = &fatal {
                    debug!(%error, "fatal error in test runner output");
                    self.emit(RunEventKind::FatalErrorDetected { error });
                }
            }
        }

        self.transition(RunState::Aggregating);
        let verdicts = Aggregator::new(
            self.tree,
            self.scope,
            self.policy,
            self.diagnostics.clone(),
        )
        .aggregate(&mut self.table, fatal.as_ref());
        self.emit(RunEventKind::VerdictsAssigned {
            verdicts: &verdicts,
        });

        let terminal = match interrupted {
            Some(interrupted) => interrupted.terminal(),
            None if process_ok && fatal.is_none() && !verdicts.has_failures() => {
                TerminalStatus::Passed
            }
            None => TerminalStatus::Failed,
        };
        self.transition(RunState::Terminal(terminal));

        let snapshot = self.stopwatch.snapshot();
        let finished = RunFinished {
            terminal,
            table: std::mem::take(&mut self.table),
            verdicts,
            corrections,
            fatal_error: fatal,
            exit_code,
            start_time: snapshot.start_time.fixed_offset(),
            elapsed: snapshot.duration,
            diagnostics: self.diagnostics.entries(),
        };
        self.emit(RunEventKind::RunFinished {
            finished: &finished,
        });
        finished
    }
}

impl<F> fmt::Debug for RunPipeline<'_, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunPipeline")
            .field("state", &self.state)
            .field("table", &self.table)
            .field("callback", &self.callback)
            .finish_non_exhaustive()
    }
}

fn emit_to<F>(stopwatch: &StopwatchStart, callback: &mut F, kind: RunEventKind<'_>)
where
    F: FnMut(RunEvent<'_>),
{
    callback(RunEvent {
        timestamp: Local::now().fixed_offset(),
        elapsed: stopwatch.elapsed(),
        kind,
    });
}

fn handle_classifier_event<F>(
    stopwatch: &StopwatchStart,
    callback: &mut F,
    table: &mut RunResultTable,
    event: ClassifierEvent<'_>,
) where
    F: FnMut(RunEvent<'_>),
{
    match event {
        ClassifierEvent::RawChunk { channel, chunk } => {
            emit_to(stopwatch, callback, RunEventKind::OutputChunk { channel, chunk });
        }
        ClassifierEvent::Outcome(event) => {
            let record = OutcomeRecord {
                outcome: TerminalOutcome::from_passed(event.passed),
                source: SourceOfTruth::Streaming,
                diagnostic: (!event.passed).then(|| event.raw_line.clone()),
                location: event.location.clone(),
            };
            match table.record(&event.node, record) {
                RecordResult::Recorded => {
                    emit_to(
                        stopwatch,
                        callback,
                        RunEventKind::OutcomeRecorded { event: &event },
                    );
                }
                RecordResult::AlreadyTerminal(existing) => {
                    debug!(node = %event.node, ?existing, "ignoring outcome for a finished node");
                }
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::{
        config::TransportConfig,
        run_table::Outcome,
        runner::{ShellExecutor, cancel_pair},
        tree::test_helpers::{file, id, suite, tree},
    };
    use camino_tempfile::tempdir;
    use pretty_assertions::assert_eq;

    fn fixture_tree() -> TestTree {
        tree(vec![suite(
            "unit",
            vec![file(
                "tests/Unit/FooTest.php",
                Some("Tests\\Unit\\FooTest"),
                &["testLogin", "testLogout"],
            )],
        )])
    }

    fn fast_settings() -> RunSettings {
        RunSettings {
            timeout: Duration::from_secs(30),
            termination_grace_period: Duration::from_millis(200),
            report_wait: ReportWait {
                grace_period: Duration::from_millis(200),
                poll_interval: Duration::from_millis(10),
            },
            policy: AggregationPolicy::default(),
        }
    }

    #[tokio::test]
    async fn streaming_outcomes_produce_verdicts() {
        let tree = fixture_tree();
        let executor = ShellExecutor::default();
        let controller = RunController::new(&tree, &executor, fast_settings());
        let invocation = Invocation::new(
            &tree,
            "printf '  ✓ testLogin\\n'; printf '  ✗ testLogout\\n'; exit 1",
            &[],
        )
        .unwrap();

        let mut states = Vec::new();
        let finished = controller
            .execute(&invocation, |event| {
                if let RunEventKind::StateChanged { to, .. } = event.kind {
                    states.push(to);
                }
            })
            .await
            .unwrap();

        assert_eq!(finished.terminal, TerminalStatus::Failed);
        assert_eq!(finished.exit_code, Some(1));
        assert_eq!(
            finished.table.outcome(&id("unit::tests/Unit/FooTest.php::testLogin")),
            Outcome::Passed
        );
        assert_eq!(
            finished
                .verdicts
                .get(&id("unit::tests/Unit/FooTest.php"))
                .map(|verdict| verdict.outcome),
            Some(Outcome::Failed)
        );
        assert_eq!(
            states,
            [
                RunState::Spawning,
                RunState::Streaming,
                RunState::Aggregating,
                RunState::Terminal(TerminalStatus::Failed),
            ]
        );
    }

    #[tokio::test]
    async fn report_overrides_streaming() {
        let dir = tempdir().unwrap();
        let report = dir.path().join("junit.xml");
        let tree = fixture_tree();
        let executor = ShellExecutor::default();
        let controller = RunController::new(&tree, &executor, fast_settings());

        let xml = r#"<testsuites><testsuite name="unit"><testcase name="testLogin" class="Tests\Unit\FooTest"/><testcase name="testLogout" class="Tests\Unit\FooTest"/></testsuite></testsuites>"#;
        let command = format!("printf '  ✗ testLogout\\n'; printf '%s' '{xml}' > '{report}'");
        let invocation = Invocation::new(&tree, command, &[])
            .unwrap()
            .with_report_path(&report);

        let finished = controller.execute(&invocation, |_| {}).await.unwrap();
        assert_eq!(finished.terminal, TerminalStatus::Passed);
        assert_eq!(finished.corrections.corrections.len(), 1);
        assert_eq!(finished.corrections.filled.len(), 1);
    }

    #[tokio::test]
    async fn timeout_skips_unfinished_tests() {
        let tree = fixture_tree();
        let executor = ShellExecutor::default();
        let settings = RunSettings {
            timeout: Duration::from_millis(300),
            ..fast_settings()
        };
        let controller = RunController::new(&tree, &executor, settings);
        let invocation =
            Invocation::new(&tree, "printf '  ✓ testLogin\\n'; sleep 30", &[]).unwrap();

        let finished = controller.execute(&invocation, |_| {}).await.unwrap();
        assert_eq!(finished.terminal, TerminalStatus::TimedOut);
        assert_eq!(
            finished.table.outcome(&id("unit::tests/Unit/FooTest.php::testLogin")),
            Outcome::Passed
        );
        assert_eq!(
            finished.table.outcome(&id("unit::tests/Unit/FooTest.php::testLogout")),
            Outcome::Skipped
        );
        assert_eq!(
            finished
                .verdicts
                .get(&id("unit::tests/Unit/FooTest.php"))
                .map(|verdict| verdict.outcome),
            Some(Outcome::Unset),
            "an interrupted file never claims a pass"
        );
    }

    #[tokio::test]
    async fn cancellation_terminates_the_process() {
        let tree = fixture_tree();
        let executor = ShellExecutor::default();
        let (handle, receiver) = cancel_pair();
        let controller =
            RunController::new(&tree, &executor, fast_settings()).with_cancel(receiver);
        let invocation = Invocation::new(&tree, "sleep 30", &[]).unwrap();

        let finished = controller
            .execute(&invocation, |event| {
                if let RunEventKind::StateChanged {
                    to: RunState::Streaming,
                    ..
                } = event.kind
                {
                    handle.cancel();
                }
            })
            .await
            .unwrap();
        assert_eq!(finished.terminal, TerminalStatus::Cancelled);
        assert!(finished.elapsed < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn spawn_failure_is_an_invocation_error() {
        let tree = fixture_tree();
        let executor = ShellExecutor::new(&TransportConfig::with_wrapper("'unterminated"));
        let controller = RunController::new(&tree, &executor, fast_settings());
        let invocation = Invocation::new(&tree, "true", &[]).unwrap();

        let mut saw_failure = false;
        let error = controller
            .execute(&invocation, |event| {
                if let RunEventKind::InvocationFailed { .. } = event.kind {
                    saw_failure = true;
                }
            })
            .await
            .unwrap_err();
        assert!(matches!(error, InvocationError::WrapperParse { .. }), "{error}");
        assert!(saw_failure);
    }
}
