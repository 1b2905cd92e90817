// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A run-scoped diagnostics sink.
//!
//! Components that recover from bad input (an unmatched identifier, a malformed report) record a
//! [`Diagnostic`] here instead of failing. Every entry is also emitted as a `tracing` event inside
//! the run's span.

use std::sync::{Arc, Mutex};
use tracing::{Level, Span, debug, warn};
use verdict_metadata::{DiagnosticLevelSummary, DiagnosticSummary};

/// The severity of a [`Diagnostic`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum DiagnosticLevel {
    /// Expected noise, such as a line that names an unknown test.
    Debug,
    /// Something the user should probably know about.
    Warning,
}

/// A single diagnostic message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    /// The severity.
    pub level: DiagnosticLevel,
    /// The message.
    pub message: String,
}

impl Diagnostic {
    /// Converts this diagnostic to its serializable form.
    pub fn to_summary(&self) -> DiagnosticSummary {
        DiagnosticSummary {
            level: match self.level {
                DiagnosticLevel::Debug => DiagnosticLevelSummary::Debug,
                DiagnosticLevel::Warning => DiagnosticLevelSummary::Warning,
            },
            message: self.message.clone(),
        }
    }
}

/// Collects diagnostics for a single run.
///
/// Cloning a sink produces a handle to the same collection.
#[derive(Clone, Debug)]
pub struct DiagnosticSink {
    span: Span,
    entries: Arc<Mutex<Vec<Diagnostic>>>,
}

impl DiagnosticSink {
    /// Creates a sink whose events are recorded inside a span named after the run.
    pub fn new(run_label: &str) -> Self {
        Self {
            span: tracing::span!(Level::DEBUG, "run", label = run_label),
            entries: Arc::default(),
        }
    }

    /// Creates a sink that is not attached to any run span.
    pub fn detached() -> Self {
        Self {
            span: Span::none(),
            entries: Arc::default(),
        }
    }

    /// Returns the span for this run.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Records a debug-level diagnostic.
    pub fn debug(&self, message: impl Into<String>) {
        let message = message.into();
        self.span.in_scope(|| debug!("{message}"));
        self.push(DiagnosticLevel::Debug, message);
    }

    /// Records a warning.
    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        self.span.in_scope(|| warn!("{message}"));
        self.push(DiagnosticLevel::Warning, message);
    }

    fn push(&self, level: DiagnosticLevel, message: String) {
        // Entries are append-only, so a poisoned list is still consistent.
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.push(Diagnostic { level, message });
    }

    /// Returns a snapshot of all diagnostics recorded so far.
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Returns a snapshot of diagnostics at or above `level`.
    pub fn entries_at_least(&self, level: DiagnosticLevel) -> Vec<Diagnostic> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.level >= level)
            .collect()
    }
}
