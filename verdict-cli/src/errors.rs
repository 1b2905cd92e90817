// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING, StderrStyles};
use camino::Utf8PathBuf;
use miette::{NamedSource, SourceOffset, SourceSpan};
use owo_colors::OwoColorize;
use std::error::Error;
use thiserror::Error;
use verdict_metadata::VerdictExitCode;
use verdict_runner::errors::*;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

// The #[error()] strings are placeholders: errors are meant to be printed with display_to_stderr,
// which colorizes them and walks the source chain.

/// An error that verdict anticipates and maps to a documented exit code.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("current directory is invalid")]
    CurrentDirInvalid {
        #[source]
        err: std::io::Error,
    },
    #[error("current directory is not valid UTF-8")]
    CurrentDirNotUtf8 { path: std::path::PathBuf },
    #[error("failed to read test tree")]
    TreeReadError {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("failed to parse test tree")]
    TreeParseError {
        path: Utf8PathBuf,
        contents: String,
        #[source]
        err: serde_json::Error,
    },
    #[error("invalid test tree")]
    TreeBuildError {
        #[from]
        err: TestTreeBuildError,
    },
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("profile not found")]
    ProfileNotFound {
        #[from]
        err: ProfileNotFound,
    },
    #[error("state store error")]
    StateStoreError {
        #[from]
        err: StateStoreError,
    },
    #[error("failed to create tokio runtime")]
    TokioRuntimeCreate {
        #[source]
        err: std::io::Error,
    },
    #[error("failed to start the test runner")]
    InvocationError {
        #[from]
        err: InvocationError,
    },
    #[error("replay error")]
    ReplayError {
        #[from]
        err: ReplayError,
    },
    #[error("error writing output")]
    WriteEventError {
        #[from]
        err: WriteEventError,
    },
}

impl ExpectedError {
    pub(crate) fn tree_read_error(path: impl Into<Utf8PathBuf>, err: std::io::Error) -> Self {
        Self::TreeReadError {
            path: path.into(),
            err,
        }
    }

    pub(crate) fn tree_parse_error(
        path: impl Into<Utf8PathBuf>,
        contents: String,
        err: serde_json::Error,
    ) -> Self {
        Self::TreeParseError {
            path: path.into(),
            contents,
            err,
        }
    }

    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::CurrentDirInvalid { .. }
            | Self::CurrentDirNotUtf8 { .. }
            | Self::TreeReadError { .. }
            | Self::TreeParseError { .. }
            | Self::TreeBuildError { .. }
            | Self::ConfigParseError { .. }
            | Self::ProfileNotFound { .. }
            | Self::StateStoreError { .. }
            | Self::TokioRuntimeCreate { .. }
            | Self::ReplayError { .. } => VerdictExitCode::SETUP_ERROR,
            Self::InvocationError { .. } => VerdictExitCode::INVOCATION_FAILED,
            Self::WriteEventError { .. } => VerdictExitCode::WRITE_OUTPUT_ERROR,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match &self {
            Self::CurrentDirInvalid { err } => {
                tracing::error!("could not access the current directory");
                Some(err as &dyn Error)
            }
            Self::CurrentDirNotUtf8 { path } => {
                tracing::error!(
                    "current directory `{}` is not valid UTF-8",
                    path.display().style(styles.bold)
                );
                None
            }
            Self::TreeReadError { path, err } => {
                tracing::error!("failed to read test tree at `{}`", path.style(styles.bold));
                Some(err as &dyn Error)
            }
            Self::TreeParseError {
                path,
                contents,
                err,
            } => {
                let report = miette::Report::new(TreeJsonError::new(path, contents, err));
                tracing::error!(target: NO_HEADING, "{:?}", report);
                None
            }
            Self::TreeBuildError { err } => {
                tracing::error!("invalid test tree: {err}");
                err.source()
            }
            Self::ConfigParseError { err } => {
                tracing::error!(
                    "failed to parse config at `{}`",
                    err.config_file().style(styles.bold)
                );
                Some(err.kind() as &dyn Error)
            }
            Self::ProfileNotFound { err } => {
                tracing::error!("{err}");
                err.source()
            }
            Self::StateStoreError { err } => {
                tracing::error!("{err}");
                err.source()
            }
            Self::TokioRuntimeCreate { err } => {
                tracing::error!("failed to create tokio runtime");
                Some(err as &dyn Error)
            }
            Self::InvocationError { err } => {
                tracing::error!("{err}");
                err.source()
            }
            Self::ReplayError { err } => {
                tracing::error!("{err}");
                err.source()
            }
            Self::WriteEventError { err } => {
                tracing::error!("failed to write event to output");
                Some(err as &dyn Error)
            }
        };

        while let Some(err) = next_error {
            tracing::error!(target: NO_HEADING, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}

/// A tree parse error rendered with the offending JSON highlighted.
#[derive(Debug, Error, miette::Diagnostic)]
#[error("failed to parse test tree")]
struct TreeJsonError {
    #[source_code]
    source_code: NamedSource<String>,

    #[label("{message}")]
    span: SourceSpan,

    message: String,
}

impl TreeJsonError {
    fn new(path: &Utf8PathBuf, contents: &str, err: &serde_json::Error) -> Self {
        // serde_json reports line 0 for errors without a position, such as I/O errors.
        let offset = if err.line() == 0 {
            0
        } else {
            SourceOffset::from_location(contents, err.line(), err.column()).offset()
        };
        Self {
            source_code: NamedSource::new(path.as_str(), contents.to_owned()),
            span: SourceSpan::from((offset, 0)),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn exit_codes() {
        let tree_error = ExpectedError::from(TestTreeBuildError::UnknownTarget {
            id: verdict_metadata::TestNodeId::new("Unit::missing"),
        });
        assert_eq!(tree_error.process_exit_code(), VerdictExitCode::SETUP_ERROR);

        let invocation_error = ExpectedError::from(InvocationError::EmptyCommand);
        assert_eq!(
            invocation_error.process_exit_code(),
            VerdictExitCode::INVOCATION_FAILED
        );

        let write_error = ExpectedError::from(WriteEventError::Io(std::io::Error::other("closed")));
        assert_eq!(
            write_error.process_exit_code(),
            VerdictExitCode::WRITE_OUTPUT_ERROR
        );
    }

    #[test]
    fn tree_json_error_points_at_the_failure() {
        let contents = "{\n  \"suites\": [,]\n}\n";
        let err = serde_json::from_str::<serde_json::Value>(contents).unwrap_err();
        let error = TreeJsonError::new(&Utf8PathBuf::from("tree.json"), contents, &err);
        let before = &contents[..error.span.offset()];
        assert_eq!(before.lines().count(), 2, "span is on the second line");
    }
}
