// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{OutcomeSummary, TestNodeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-node state persisted across runs.
///
/// A run only overwrites the entries it assigns a verdict to. Everything else is carried over
/// unchanged, so that nodes a run never reached keep showing their last known state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NodeStatesSummary {
    /// The format version, currently always 1.
    #[serde(default = "default_format_version")]
    pub format_version: u32,

    /// The last known state of each node.
    #[serde(default)]
    pub nodes: BTreeMap<TestNodeId, NodeStateSummary>,
}

fn default_format_version() -> u32 {
    NodeStatesSummary::FORMAT_VERSION
}

impl NodeStatesSummary {
    /// The current format version.
    pub const FORMAT_VERSION: u32 = 1;

    /// Parses a JSON state file.
    pub fn parse_json(json: impl AsRef<str>) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json.as_ref())
    }
}

/// The last known state of a single node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NodeStateSummary {
    /// The outcome.
    pub outcome: OutcomeSummary,

    /// Diagnostic text associated with the outcome.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}
