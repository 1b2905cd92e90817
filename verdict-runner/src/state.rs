// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-node state that persists across runs.
//!
//! A run only overwrites the nodes it assigns a verdict to. Nodes the run never reached keep
//! their last known state.

use crate::{aggregator::Verdicts, errors::StateStoreError, run_table::Outcome};
use camino::{Utf8Path, Utf8PathBuf};
use std::io::Write;
use tracing::debug;
use verdict_metadata::{NodeStateSummary, NodeStatesSummary, TestNodeId};

/// Node state loaded from, and saved to, a JSON file.
#[derive(Clone, Debug)]
pub struct NodeStateStore {
    path: Utf8PathBuf,
    states: NodeStatesSummary,
}

impl NodeStateStore {
    /// Loads the store at `path`. A missing file is an empty store.
    pub fn load(path: impl Into<Utf8PathBuf>) -> Result<Self, StateStoreError> {
        let path = path.into();
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                debug!(%path, "no state file, starting empty");
                return Ok(Self {
                    path,
                    states: NodeStatesSummary::default(),
                });
            }
            Err(error) => return Err(StateStoreError::Read { path, error }),
        };

        let states = NodeStatesSummary::parse_json(&contents).map_err(|error| {
            StateStoreError::Parse {
                path: path.clone(),
                error,
            }
        })?;
        if states.format_version > NodeStatesSummary::FORMAT_VERSION {
            return Err(StateStoreError::UnsupportedVersion {
                path,
                version: states.format_version,
                supported: NodeStatesSummary::FORMAT_VERSION,
            });
        }

        Ok(Self { path, states })
    }

    /// Returns the path this store is saved to.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns the last known outcome of a node.
    pub fn outcome(&self, id: &TestNodeId) -> Outcome {
        self.states
            .nodes
            .get(id)
            .map_or(Outcome::Unset, |state| Outcome::from_summary(state.outcome))
    }

    /// Returns the last known state of a node.
    pub fn get(&self, id: &TestNodeId) -> Option<&NodeStateSummary> {
        self.states.nodes.get(id)
    }

    /// Returns the number of nodes with a known state.
    pub fn len(&self) -> usize {
        self.states.nodes.len()
    }

    /// Returns true if no node has a known state.
    pub fn is_empty(&self) -> bool {
        self.states.nodes.is_empty()
    }

    /// Applies a run's verdicts. Nodes without a verdict are left untouched.
    pub fn apply(&mut self, verdicts: &Verdicts) {
        for (id, verdict) in verdicts.iter() {
            self.states.nodes.insert(
                id.clone(),
                NodeStateSummary {
                    outcome: verdict.outcome.to_summary(),
                    diagnostic: verdict.diagnostic.clone(),
                },
            );
        }
        debug!(path = %self.path, applied = verdicts.len(), "applied verdicts to node state");
    }

    /// Writes the store back to its path, atomically.
    pub fn save(&self) -> Result<(), StateStoreError> {
        let json = serde_json::to_string_pretty(&self.states).map_err(|error| {
            StateStoreError::Serialize {
                path: self.path.clone(),
                error,
            }
        })?;

        atomicwrites::AtomicFile::new(&self.path, atomicwrites::AllowOverwrite)
            .write(|file| file.write_all(json.as_bytes()))
            .map_err(|error| StateStoreError::Write {
                path: self.path.clone(),
                error,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        aggregator::{AggregationPolicy, Aggregator},
        diagnostics::DiagnosticSink,
        fatal_error::FatalErrorInfo,
        run_table::RunResultTable,
        tree::test_helpers::{file, id, suite, tree},
    };
    use camino_tempfile::tempdir;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = NodeStateStore::load(dir.path().join("state.json")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn rejects_newer_versions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, r#"{"format-version": 2, "nodes": {}}"#).unwrap();
        let error = NodeStateStore::load(&path).unwrap_err();
        assert!(
            matches!(error, StateStoreError::UnsupportedVersion { version: 2, .. }),
            "{error}"
        );
    }

    #[test]
    fn early_abort_retains_prior_state() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(
            &path,
            indoc! {r#"
                {
                  "format-version": 1,
                  "nodes": {
                    "unit": { "outcome": "passed" },
                    "unit::tests/unit/FooTest.php": { "outcome": "passed" },
                    "unit::tests/unit/FooTest.php::testC": { "outcome": "passed" },
                    "unit::tests/unit/BarTest.php": { "outcome": "failed", "diagnostic": "old" }
                  }
                }
            "#},
        )
        .unwrap();

        let tree = tree(vec![suite(
            "unit",
            vec![
                file("tests/unit/FooTest.php", None, &["testA", "testB", "testC"]),
                file("tests/unit/BarTest.php", None, &["testBar"]),
            ],
        )]);
        let scope = tree
            .scope(&[
                id("unit::tests/unit/FooTest.php::testA"),
                id("unit::tests/unit/FooTest.php::testB"),
            ])
            .unwrap();
        let fatal = FatalErrorInfo {
            error_class: Some("TypeError".to_owned()),
            message: "bad argument".to_owned(),
            file: Some("/srv/app/tests/unit/FooTest.php".into()),
            line: Some(7),
        };
        let mut table = RunResultTable::new();
        let verdicts = Aggregator::new(
            &tree,
            &scope,
            AggregationPolicy::default(),
            DiagnosticSink::detached(),
        )
        .aggregate(&mut table, Some(&fatal));

        let mut store = NodeStateStore::load(&path).unwrap();
        store.apply(&verdicts);
        store.save().unwrap();

        let store = NodeStateStore::load(&path).unwrap();
        assert_eq!(store.outcome(&id("unit")), Outcome::Passed);
        assert_eq!(store.outcome(&id("unit::tests/unit/FooTest.php")), Outcome::Failed);
        assert_eq!(
            store.outcome(&id("unit::tests/unit/FooTest.php::testA")),
            Outcome::Failed
        );
        assert_eq!(
            store.outcome(&id("unit::tests/unit/FooTest.php::testC")),
            Outcome::Passed,
            "out-of-scope method keeps its state"
        );
        let bar = store.get(&id("unit::tests/unit/BarTest.php")).unwrap();
        assert_eq!(bar.diagnostic.as_deref(), Some("old"));
        assert_eq!(store.len(), 6);
    }
}
