// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by verdict.

use crate::tree::NodeKind;
use camino::Utf8PathBuf;
use config::ConfigError;
use itertools::Itertools;
use std::fmt;
use thiserror::Error;
use verdict_metadata::TestNodeId;

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse verdict config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file that failed to parse.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }

    /// Returns the kind of error.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of a [`ConfigParseError`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// The config sources could not be read or merged.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// The merged config could not be deserialized.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),
}

/// An error which indicates that a profile was requested but not known to verdict.
#[derive(Clone, Debug, Error)]
#[error("profile `{profile}` not found (known profiles: {})", .all_profiles.iter().join(", "))]
pub struct ProfileNotFound {
    profile: String,
    all_profiles: Vec<String>,
}

impl ProfileNotFound {
    pub(crate) fn new(
        profile: impl Into<String>,
        all_profiles: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            profile: profile.into(),
            all_profiles: all_profiles
                .into_iter()
                .map(Into::<String>::into)
                .sorted_unstable()
                .collect(),
        }
    }
}

/// An error that occurred while building a [`TestTree`](crate::tree::TestTree) or a run scope.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum TestTreeBuildError {
    /// Two nodes have the same identifier.
    #[error("duplicate test node `{id}`")]
    DuplicateId {
        /// The duplicated identifier.
        id: TestNodeId,
    },

    /// A node has an empty name.
    #[error("{kind} with an empty name{}", DisplayParent(.parent))]
    EmptyName {
        /// The kind of node.
        kind: NodeKind,

        /// The parent of the node, if any.
        parent: Option<TestNodeId>,
    },

    /// A run target does not name a node in the tree.
    #[error("run target `{id}` is not in the test tree")]
    UnknownTarget {
        /// The unknown identifier.
        id: TestNodeId,
    },
}

struct DisplayParent<'a>(&'a Option<TestNodeId>);

impl fmt::Display for DisplayParent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(parent) => write!(f, " in `{parent}`"),
            None => Ok(()),
        }
    }
}

/// An error that occurred while starting the test runner process.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InvocationError {
    /// The command string was empty.
    #[error("the test command is empty")]
    EmptyCommand,

    /// The transport wrapper could not be split into arguments.
    #[error("failed to parse transport wrapper `{wrapper}`")]
    WrapperParse {
        /// The wrapper string.
        wrapper: String,

        /// The underlying error.
        #[source]
        error: shell_words::ParseError,
    },

    /// The transport wrapper was configured but has no program.
    #[error("transport wrapper is empty")]
    EmptyWrapper,

    /// The process could not be spawned.
    #[error("failed to spawn `{command}`")]
    Spawn {
        /// The command that was being spawned.
        command: String,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },
}

/// An error that occurred while parsing a structured report.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReportParseError {
    /// The report is not well-formed XML.
    #[error("malformed XML at byte {position}")]
    Xml {
        /// The byte position of the error.
        position: u64,

        /// The underlying error.
        #[source]
        error: quick_xml::Error,
    },

    /// An attribute could not be parsed.
    #[error("malformed attribute")]
    Attribute {
        /// The underlying error.
        #[source]
        error: quick_xml::events::attributes::AttrError,
    },

    /// The document ends with elements still open, usually because it is still being written.
    #[error("report ends at byte {position} with {unclosed} unclosed element(s)")]
    Truncated {
        /// The byte position of the end of the document.
        position: u64,

        /// The number of elements left open.
        unclosed: usize,
    },

    /// The document has no `<testsuites>` or `<testsuite>` element.
    #[error("document is not a JUnit report")]
    NotJunit,
}

/// An error that occurred while loading or saving node state.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StateStoreError {
    /// The state file could not be read.
    #[error("error reading state file `{path}`")]
    Read {
        /// The path to the state file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// The state file could not be parsed.
    #[error("error parsing state file `{path}`")]
    Parse {
        /// The path to the state file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: serde_json::Error,
    },

    /// The state file was written by a newer version of verdict.
    #[error("state file `{path}` has unsupported format version {version} (supported: {supported})")]
    UnsupportedVersion {
        /// The path to the state file.
        path: Utf8PathBuf,

        /// The version found in the file.
        version: u32,

        /// The supported version.
        supported: u32,
    },

    /// The state could not be serialized.
    #[error("error serializing state for `{path}`")]
    Serialize {
        /// The path to the state file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: serde_json::Error,
    },

    /// The state file could not be written.
    #[error("error writing state file `{path}`")]
    Write {
        /// The path to the state file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: atomicwrites::Error<std::io::Error>,
    },
}

/// An error that occurs while writing an event.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WriteEventError {
    /// An error occurred while writing the event to the provided output.
    #[error("error writing to output")]
    Io(#[source] std::io::Error),

    /// An error occurred while producing JSON output.
    #[error("error serializing run summary")]
    Json(#[source] serde_json::Error),
}

/// An error that occurred while replaying a saved run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReplayError {
    /// The output log could not be read.
    #[error("error reading output log `{path}`")]
    ReadOutputLog {
        /// The path to the output log.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },
}
