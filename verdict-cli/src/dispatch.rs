// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    ExpectedError, Result,
    output::{OutputContext, OutputOpts},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Subcommand, ValueEnum};
use verdict_metadata::{TestNodeId, TestTreeSummary, VerdictExitCode};
use verdict_runner::{
    config::VerdictConfig,
    errors::WriteEventError,
    reporter::{MessageFormat, Reporter, ReporterBuilder, ReporterOutput, events::RunEvent},
    runner::{
        Invocation, Replay, RunController, RunFinished, ShellExecutor, TerminalStatus, cancel_pair,
    },
    state::NodeStateStore,
    tree::TestTree,
};

/// Reconciles PHPUnit and Pest test results into per-node verdicts.
#[derive(Debug, clap::Parser)]
#[command(
    name = "verdict",
    version,
    styles = crate::output::clap_styles::style(),
    max_term_width = 100,
)]
pub struct VerdictApp {
    #[clap(flatten)]
    output: OutputOpts,

    #[clap(subcommand)]
    command: Command,
}

impl VerdictApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app.
    ///
    /// Returns the exit code.
    pub fn exec(self, output: OutputContext) -> Result<i32> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("verdict-worker")
            .build()
            .map_err(|err| ExpectedError::TokioRuntimeCreate { err })?;

        match self.command {
            Command::Run(opts) => runtime.block_on(opts.exec(output)),
            Command::Reconcile(opts) => runtime.block_on(opts.exec(output)),
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a test command and reconcile its results
    Run(RunOpts),

    /// Reconcile a saved output log and report without running anything
    Reconcile(ReconcileOpts),
}

#[derive(Debug, Args)]
struct TreeOpts {
    /// Test tree as JSON
    #[arg(long, value_name = "PATH")]
    tree: Utf8PathBuf,

    /// Restrict the run to these nodes [default: the whole tree]
    #[arg(long = "target", value_name = "ID")]
    targets: Vec<String>,

    /// Node state file to update with the run's verdicts
    #[arg(long, value_name = "PATH")]
    state: Option<Utf8PathBuf>,
}

impl TreeOpts {
    fn load_tree(&self) -> Result<TestTree> {
        let contents = std::fs::read_to_string(&self.tree)
            .map_err(|err| ExpectedError::tree_read_error(&self.tree, err))?;
        let summary = match TestTreeSummary::parse_json(&contents) {
            Ok(summary) => summary,
            Err(err) => return Err(ExpectedError::tree_parse_error(&self.tree, contents, err)),
        };
        Ok(TestTree::from_summary(&summary)?)
    }

    fn targets(&self) -> Vec<TestNodeId> {
        self.targets.iter().map(|id| TestNodeId::new(id)).collect()
    }

    fn load_state(&self) -> Result<Option<NodeStateStore>> {
        Ok(self.state.as_deref().map(NodeStateStore::load).transpose()?)
    }
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Config options")]
struct ConfigOpts {
    /// Config file [default: .config/verdict.toml]
    #[arg(long, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,

    /// Config profile to use
    #[arg(
        long,
        short = 'P',
        env = "VERDICT_PROFILE",
        default_value = VerdictConfig::DEFAULT_PROFILE,
    )]
    profile: String,
}

impl ConfigOpts {
    fn load(&self) -> Result<VerdictConfig> {
        let root = current_dir()?;
        Ok(VerdictConfig::from_sources(root, self.config_file.as_deref())?)
    }
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Reporter options")]
struct ReporterOpts {
    /// Pass the test runner's output through to stderr
    #[arg(long)]
    show_output: bool,

    /// Format of the summary written to stdout
    #[arg(long, value_enum, default_value_t)]
    message_format: MessageFormatOpt,
}

impl ReporterOpts {
    fn builder(&self, output: OutputContext) -> ReporterBuilder {
        let mut builder = ReporterBuilder::default();
        builder
            .set_colorize(output.color.should_colorize(supports_color::Stream::Stderr))
            .set_show_output(self.show_output)
            .set_message_format(self.message_format.into());
        builder
    }
}

#[derive(Copy, Clone, Debug, Default, ValueEnum)]
enum MessageFormatOpt {
    /// Human-readable output on stderr only
    #[default]
    Human,
    /// Also print the run summary as JSON on stdout
    Json,
}

impl From<MessageFormatOpt> for MessageFormat {
    fn from(format: MessageFormatOpt) -> Self {
        match format {
            MessageFormatOpt::Human => MessageFormat::Human,
            MessageFormatOpt::Json => MessageFormat::Json,
        }
    }
}

#[derive(Debug, Args)]
struct RunOpts {
    #[clap(flatten)]
    tree: TreeOpts,

    /// Shell command that runs the tests
    #[arg(long, value_name = "COMMAND")]
    command: String,

    /// Path the test command writes its JUnit report to
    #[arg(long, value_name = "PATH")]
    report: Option<Utf8PathBuf>,

    #[clap(flatten)]
    config: ConfigOpts,

    #[clap(flatten)]
    reporter: ReporterOpts,
}

impl RunOpts {
    async fn exec(self, output: OutputContext) -> Result<i32> {
        let config = self.config.load()?;
        let profile = config.profile(&self.config.profile)?;
        let tree = self.tree.load_tree()?;
        let mut state = self.tree.load_state()?;

        let mut invocation = Invocation::new(&tree, self.command, &self.tree.targets())?;
        if let Some(report) = self.report {
            invocation = invocation.with_report_path(report);
        }

        let executor = ShellExecutor::new(profile.transport());
        let (cancel_handle, cancel_receiver) = cancel_pair();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::debug!("received Ctrl-C, cancelling run");
                    cancel_handle.cancel();
                }
                Err(error) => tracing::warn!("failed to listen for Ctrl-C: {error}"),
            }
        });
        let controller = RunController::new(&tree, &executor, profile.run_settings())
            .with_cancel(cancel_receiver);

        let mut events = EventSink::new(self.reporter.builder(output).build(
            &tree,
            ReporterOutput::Terminal,
            ReporterOutput::Terminal,
        ));
        let result = controller.execute(&invocation, events.callback()).await;
        let finished = events.finish(result)?;

        finish(finished, state.as_mut())
    }
}

#[derive(Debug, Args)]
struct ReconcileOpts {
    #[clap(flatten)]
    tree: TreeOpts,

    /// Saved stdout and stderr of the test command
    #[arg(long, value_name = "PATH")]
    output_log: Utf8PathBuf,

    /// JUnit report written by the test command
    #[arg(long, value_name = "PATH")]
    report: Option<Utf8PathBuf>,

    /// Exit code the test command finished with
    #[arg(long, value_name = "CODE", allow_negative_numbers = true)]
    exit_code: Option<i32>,

    #[clap(flatten)]
    config: ConfigOpts,

    #[clap(flatten)]
    reporter: ReporterOpts,
}

impl ReconcileOpts {
    async fn exec(self, output: OutputContext) -> Result<i32> {
        let config = self.config.load()?;
        let profile = config.profile(&self.config.profile)?;
        let tree = self.tree.load_tree()?;
        let mut state = self.tree.load_state()?;

        let mut replay = Replay::new(&tree, &self.tree.targets(), self.output_log)?
            .with_policy(profile.aggregation_policy());
        if let Some(report) = self.report {
            replay = replay.with_report_path(report);
        }
        if let Some(exit_code) = self.exit_code {
            replay = replay.with_exit_code(exit_code);
        }

        let mut events = EventSink::new(self.reporter.builder(output).build(
            &tree,
            ReporterOutput::Terminal,
            ReporterOutput::Terminal,
        ));
        let result = replay.run(events.callback()).await;
        let finished = events.finish(result)?;

        finish(finished, state.as_mut())
    }
}

/// Forwards run events to a reporter.
///
/// A failing reporter never interrupts the run: the first write error is held back and returned
/// once the run has finished.
struct EventSink<'a> {
    reporter: Reporter<'a>,
    write_error: Option<WriteEventError>,
}

impl<'a> EventSink<'a> {
    fn new(reporter: Reporter<'a>) -> Self {
        Self {
            reporter,
            write_error: None,
        }
    }

    fn callback(&mut self) -> impl FnMut(RunEvent<'_>) + '_ {
        move |event: RunEvent<'_>| {
            if self.write_error.is_none()
                && let Err(error) = self.reporter.report_event(&event)
            {
                self.write_error = Some(error);
            }
        }
    }

    fn finish<E>(self, result: Result<RunFinished, E>) -> Result<RunFinished>
    where
        ExpectedError: From<E>,
    {
        let finished = result?;
        match self.write_error {
            Some(err) => Err(err.into()),
            None => Ok(finished),
        }
    }
}

fn finish(finished: RunFinished, state: Option<&mut NodeStateStore>) -> Result<i32> {
    if let Some(state) = state {
        state.apply(&finished.verdicts);
        state.save()?;
        tracing::debug!("saved {} node states to `{}`", state.len(), state.path());
    }

    Ok(exit_code_for(finished.terminal))
}

fn exit_code_for(terminal: TerminalStatus) -> i32 {
    match terminal {
        TerminalStatus::Passed => VerdictExitCode::OK,
        TerminalStatus::Failed => VerdictExitCode::TEST_RUN_FAILED,
        TerminalStatus::Cancelled => VerdictExitCode::CANCELLED,
        TerminalStatus::TimedOut => VerdictExitCode::TIMED_OUT,
    }
}

fn current_dir() -> Result<Utf8PathBuf> {
    let dir = std::env::current_dir().map_err(|err| ExpectedError::CurrentDirInvalid { err })?;
    Utf8PathBuf::try_from(dir)
        .map_err(|err| ExpectedError::CurrentDirNotUtf8 {
            path: err.into_path_buf(),
        })
}
