// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Human-readable output.

use super::events::{RunEvent, RunEventKind};
use crate::{
    aggregator::Verdicts,
    helpers::plural,
    run_table::{Outcome, SourceOfTruth},
    runner::{RunFinished, TerminalStatus},
    tree::{SourceLocation, TestTree},
};
use owo_colors::{OwoColorize, Style};
use std::io::{self, Write};

const HBAR: &str = "------------";

#[derive(Debug)]
pub(super) struct DisplayReporter<'a> {
    tree: &'a TestTree,
    styles: Styles,
    show_output: bool,
}

impl<'a> DisplayReporter<'a> {
    pub(super) fn new(tree: &'a TestTree, should_colorize: bool, show_output: bool) -> Self {
        let mut styles = Styles::default();
        if should_colorize {
            styles.colorize();
        }
        Self {
            tree,
            styles,
            show_output,
        }
    }

    pub(super) fn write_event(
        &self,
        event: &RunEvent<'_>,
        writer: &mut dyn Write,
    ) -> io::Result<()> {
        match &event.kind {
            RunEventKind::RunStarted {
                command,
                leaf_count,
                report_path,
            } => {
                writeln!(writer, "{HBAR}")?;
                write!(writer, "{:>12} ", "Starting".style(self.styles.pass))?;
                write!(
                    writer,
                    "{} {}: {command}",
                    leaf_count.style(self.styles.count),
                    plural::tests_str(*leaf_count),
                )?;
                if let Some(report_path) = report_path {
                    write!(writer, " (report: {report_path})")?;
                }
                writeln!(writer)?;
            }
            RunEventKind::StateChanged { .. } => {}
            RunEventKind::OutputChunk { chunk, .. } => {
                if self.show_output {
                    writer.write_all(chunk)?;
                }
            }
            RunEventKind::OutcomeRecorded { event } => {
                let outcome = if event.passed {
                    Outcome::Passed
                } else {
                    Outcome::Failed
                };
                self.write_status_line(
                    outcome,
                    event.node.as_str(),
                    event.location.as_ref(),
                    writer,
                )?;
            }
            RunEventKind::ReportReconciled { corrections } => {
                if !corrections.corrections.is_empty() {
                    let count = corrections.corrections.len();
                    writeln!(
                        writer,
                        "{:>12} report corrected {} streamed {}",
                        "REPORT".style(self.styles.skip),
                        count.style(self.styles.count),
                        plural::corrections_str(count),
                    )?;
                    for correction in &corrections.corrections {
                        writeln!(
                            writer,
                            "{:>12} {}: {:?} -> {:?}",
                            "",
                            correction.node,
                            correction.from,
                            correction.to,
                        )?;
                    }
                }
            }
            RunEventKind::FatalErrorDetected { error } => {
                writeln!(writer, "{:>12} {error}", "FATAL".style(self.styles.fail))?;
            }
            RunEventKind::VerdictsAssigned { verdicts } => {
                self.write_derived_outcomes(verdicts, writer)?;
            }
            RunEventKind::RunFinished { finished } => {
                self.write_summary(finished, writer)?;
            }
            RunEventKind::InvocationFailed { error } => {
                writeln!(
                    writer,
                    "{:>12} test runner could not be started: {error}",
                    "ERROR".style(self.styles.fail),
                )?;
            }
        }

        Ok(())
    }

    fn write_status_line(
        &self,
        outcome: Outcome,
        name: &str,
        location: Option<&SourceLocation>,
        writer: &mut dyn Write,
    ) -> io::Result<()> {
        match outcome {
            Outcome::Passed => write!(writer, "{:>12} ", "PASS".style(self.styles.pass))?,
            Outcome::Failed => write!(writer, "{:>12} ", "FAIL".style(self.styles.fail))?,
            Outcome::Skipped => write!(writer, "{:>12} ", "SKIP".style(self.styles.skip))?,
            Outcome::Unset | Outcome::Running => write!(writer, "{:>12} ", "")?,
        }
        write!(writer, "{name}")?;
        if let Some(location) = location
            && outcome == Outcome::Failed
        {
            write!(writer, " at {location}")?;
        }
        writeln!(writer)
    }

    /// Writes leaves whose outcome did not come from a streamed line: report fills, early-abort
    /// failures and skips after an interruption.
    fn write_derived_outcomes(&self, verdicts: &Verdicts, writer: &mut dyn Write) -> io::Result<()> {
        for (id, verdict) in verdicts.iter() {
            let derived = verdict
                .source
                .is_some_and(|source| source != SourceOfTruth::Streaming);
            let interesting = matches!(verdict.outcome, Outcome::Failed | Outcome::Skipped);
            if derived && interesting {
                self.write_status_line(
                    verdict.outcome,
                    id.as_str(),
                    verdict.location.as_ref(),
                    writer,
                )?;
            }
        }
        Ok(())
    }

    fn write_summary(&self, finished: &RunFinished, writer: &mut dyn Write) -> io::Result<()> {
        let summary_style = match finished.terminal {
            TerminalStatus::Passed => self.styles.pass,
            TerminalStatus::Failed | TerminalStatus::Cancelled | TerminalStatus::TimedOut => {
                self.styles.fail
            }
        };
        write!(writer, "{HBAR}\n{:>12} ", "Summary".style(summary_style))?;

        // Right-align the elapsed time to 8 characters, with 3 decimal places.
        write!(writer, "[{:>8.3}s] ", finished.elapsed.as_secs_f64())?;

        let counts = finished.verdicts.leaf_counts(self.tree);
        write!(
            writer,
            "{} {} run: ",
            counts.total().style(self.styles.count),
            plural::tests_str(counts.total()),
        )?;
        write!(
            writer,
            "{} {}, {} {}, {} {}",
            counts.passed.style(self.styles.count),
            "passed".style(self.styles.pass),
            counts.failed.style(self.styles.count),
            "failed".style(self.styles.fail),
            counts.skipped.style(self.styles.count),
            "skipped".style(self.styles.skip),
        )?;
        if counts.unset > 0 {
            write!(writer, ", {} without outcome", counts.unset.style(self.styles.count))?;
        }
        match finished.terminal {
            TerminalStatus::Cancelled => write!(writer, " ({})", "cancelled".style(self.styles.fail))?,
            TerminalStatus::TimedOut => write!(writer, " ({})", "timed out".style(self.styles.fail))?,
            TerminalStatus::Passed | TerminalStatus::Failed => {}
        }
        writeln!(writer)?;

        if let Some(code) = finished.exit_code
            && code != 0
        {
            writeln!(
                writer,
                "{:>12} test runner exited with code {}",
                "",
                code.style(self.styles.count),
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Styles {
    count: Style,
    pass: Style,
    fail: Style,
    skip: Style,
}

impl Styles {
    fn colorize(&mut self) {
        self.count = Style::new().bold();
        self.pass = Style::new().green().bold();
        self.fail = Style::new().red().bold();
        self.skip = Style::new().yellow().bold();
    }
}
