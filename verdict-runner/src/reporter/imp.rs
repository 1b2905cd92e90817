// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{
    MessageFormat,
    displayer::DisplayReporter,
    events::{RunEvent, RunEventKind},
    run_summary,
};
use crate::{errors::WriteEventError, tree::TestTree};
use std::io::{self, BufWriter, Write};

/// An output destination for the reporter.
///
/// This is usually the process's own stderr or stdout, but can be an in-memory buffer for tests.
pub enum ReporterOutput<'a> {
    /// Write to the process's stream.
    Terminal,

    /// Write to a buffer.
    Buffer(&'a mut Vec<u8>),
}

impl ReporterOutput<'_> {
    fn write_with(
        &mut self,
        stream: impl FnOnce() -> Box<dyn Write>,
        f: impl FnOnce(&mut dyn Write) -> io::Result<()>,
    ) -> Result<(), WriteEventError> {
        match self {
            ReporterOutput::Terminal => {
                let mut writer = BufWriter::new(stream());
                f(&mut writer).map_err(WriteEventError::Io)?;
                writer.flush().map_err(WriteEventError::Io)
            }
            ReporterOutput::Buffer(buf) => f(&mut **buf).map_err(WriteEventError::Io),
        }
    }
}

impl std::fmt::Debug for ReporterOutput<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReporterOutput::Terminal => write!(f, "Terminal"),
            ReporterOutput::Buffer(buf) => write!(f, "Buffer({} bytes)", buf.len()),
        }
    }
}

/// Run reporter builder.
#[derive(Debug, Default)]
pub struct ReporterBuilder {
    should_colorize: bool,
    show_output: bool,
    message_format: MessageFormat,
}

impl ReporterBuilder {
    /// Set to true if the reporter should colorize output.
    pub fn set_colorize(&mut self, should_colorize: bool) -> &mut Self {
        self.should_colorize = should_colorize;
        self
    }

    /// Set to true to pass the test runner's raw output through to stderr.
    pub fn set_show_output(&mut self, show_output: bool) -> &mut Self {
        self.show_output = show_output;
        self
    }

    /// Sets the machine-readable format written to stdout.
    pub fn set_message_format(&mut self, message_format: MessageFormat) -> &mut Self {
        self.message_format = message_format;
        self
    }

    /// Creates a new reporter.
    pub fn build<'a>(
        &self,
        tree: &'a TestTree,
        stderr: ReporterOutput<'a>,
        stdout: ReporterOutput<'a>,
    ) -> Reporter<'a> {
        Reporter {
            display_reporter: DisplayReporter::new(tree, self.should_colorize, self.show_output),
            message_format: self.message_format,
            stderr,
            stdout,
        }
    }
}

/// Reports run events to stderr and, for [`MessageFormat::Json`], the final summary to stdout.
#[derive(Debug)]
pub struct Reporter<'a> {
    display_reporter: DisplayReporter<'a>,
    message_format: MessageFormat,
    stderr: ReporterOutput<'a>,
    stdout: ReporterOutput<'a>,
}

impl Reporter<'_> {
    /// Reports a run event.
    pub fn report_event(&mut self, event: &RunEvent<'_>) -> Result<(), WriteEventError> {
        let display_reporter = &self.display_reporter;
        self.stderr.write_with(
            || Box::new(io::stderr()),
            |writer| display_reporter.write_event(event, writer),
        )?;

        if let (MessageFormat::Json, RunEventKind::RunFinished { finished }) =
            (self.message_format, &event.kind)
        {
            let json = serde_json::to_string_pretty(&run_summary(finished))
                .map_err(WriteEventError::Json)?;
            self.stdout.write_with(
                || Box::new(io::stdout()),
                |writer| writeln!(writer, "{json}"),
            )?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        aggregator::AggregationPolicy,
        runner::{Replay, TerminalStatus},
        tree::test_helpers::{file, suite, tree},
    };
    use camino_tempfile::tempdir;
    use verdict_metadata::{OutcomeSummary, RunStatusSummary, RunSummary, TestNodeId};

    #[tokio::test]
    async fn json_summary_on_stdout() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("output.log");
        std::fs::write(&log, "  ✓ testA\n  ✗ testB\n").unwrap();
        let tree = tree(vec![suite(
            "unit",
            vec![file("tests/FooTest.php", None, &["testA", "testB", "testC"])],
        )]);

        let mut stderr = Vec::new();
        let mut stdout = Vec::new();
        let mut builder = ReporterBuilder::default();
        builder.set_message_format(MessageFormat::Json);
        let mut reporter = builder.build(
            &tree,
            ReporterOutput::Buffer(&mut stderr),
            ReporterOutput::Buffer(&mut stdout),
        );

        let replay = Replay::new(&tree, &[], &log)
            .unwrap()
            .with_policy(AggregationPolicy::default());
        let finished = replay
            .run(|event| reporter.report_event(&event).unwrap())
            .await
            .unwrap();
        assert_eq!(finished.terminal, TerminalStatus::Failed);
        drop(reporter);

        let summary = RunSummary::parse_json(String::from_utf8(stdout).unwrap()).unwrap();
        assert_eq!(summary.status, RunStatusSummary::Failed);
        assert_eq!(
            summary.nodes[&TestNodeId::new("unit::tests/FooTest.php::testB")].outcome,
            OutcomeSummary::Failed
        );
        assert_eq!(
            summary.nodes[&TestNodeId::new("unit::tests/FooTest.php::testC")].outcome,
            OutcomeSummary::Unset,
            "no default pass next to a failure"
        );

        let stderr = String::from_utf8(stderr).unwrap();
        assert!(stderr.contains("PASS unit::tests/FooTest.php::testA"), "{stderr}");
        assert!(stderr.contains("FAIL unit::tests/FooTest.php::testB"), "{stderr}");
        assert!(stderr.contains("Summary"), "{stderr}");
    }
}
