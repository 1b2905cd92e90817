// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::{collections::BTreeSet, fmt};

/// A stable identifier for a node in the declared test tree.
///
/// Identifiers are path-like composites of the suite name, the file path, the method name and
/// (for parameterized invocations) the dataset name, joined by `::`. They persist across runs.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestNodeId(SmolStr);

impl TestNodeId {
    /// The separator between components of an identifier.
    pub const SEPARATOR: &'static str = "::";

    /// Creates a new `TestNodeId` from a string.
    pub fn new(id: &str) -> Self {
        Self(id.into())
    }

    /// Returns the identifier for a child of this node.
    pub fn child(&self, component: &str) -> Self {
        let mut id = String::with_capacity(self.0.len() + Self::SEPARATOR.len() + component.len());
        id.push_str(&self.0);
        id.push_str(Self::SEPARATOR);
        id.push_str(component);
        Self(id.into())
    }

    /// Returns the identifier as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TestNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TestNodeId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// The declared test tree, as produced by a discovery tool.
///
/// This is the input format for `verdict run --tree`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TestTreeSummary {
    /// The suites in this tree, in declaration order.
    #[serde(default)]
    pub suites: Vec<SuiteSummary>,
}

impl TestTreeSummary {
    /// Parses JSON output from a discovery tool.
    pub fn parse_json(json: impl AsRef<str>) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json.as_ref())
    }
}

/// A test suite: a named group of test files.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SuiteSummary {
    /// The name of the suite, for example `Unit`.
    pub name: String,

    /// The files in this suite.
    #[serde(default)]
    pub files: Vec<FileSummary>,
}

/// A test file, containing test methods.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FileSummary {
    /// The path to the file, relative to the project root.
    pub path: Utf8PathBuf,

    /// The fully qualified class declared in this file, if any.
    ///
    /// Function-style test files (Pest) do not declare a class.
    #[serde(default)]
    pub class_name: Option<String>,

    /// The lines spanned by the class or file body.
    #[serde(default)]
    pub location: Option<LineRangeSummary>,

    /// Tags (groups) declared on the file.
    #[serde(default)]
    pub tags: BTreeSet<String>,

    /// The test methods in this file.
    #[serde(default)]
    pub methods: Vec<MethodSummary>,
}

/// A test method, or a function-style test.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MethodSummary {
    /// The name of the method, as the runner prints it.
    pub name: String,

    /// The lines spanned by the method within its file.
    #[serde(default)]
    pub location: Option<LineRangeSummary>,

    /// Tags (groups) declared on the method.
    #[serde(default)]
    pub tags: BTreeSet<String>,

    /// Parameterized invocations of this method, if it has a data provider.
    #[serde(default)]
    pub datasets: Vec<DatasetSummary>,
}

/// One parameterized invocation of a test method.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DatasetSummary {
    /// The full invocation name as the runner prints it, for example
    /// `testAdd with data set #0`.
    pub name: String,
}

/// A range of lines in a source file, 1-based and inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LineRangeSummary {
    /// The first line.
    pub start: u32,

    /// The last line.
    pub end: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_minimal_tree() {
        let json = indoc! {r#"
            {
                "suites": [
                    {
                        "name": "Unit",
                        "files": [
                            {
                                "path": "tests/Unit/FooTest.php",
                                "class-name": "Tests\\Unit\\FooTest",
                                "methods": [
                                    { "name": "testLogin", "location": { "start": 10, "end": 14 } },
                                    {
                                        "name": "testAdd",
                                        "datasets": [{ "name": "testAdd with data set #0" }]
                                    }
                                ]
                            }
                        ]
                    }
                ]
            }
        "#};

        let tree = TestTreeSummary::parse_json(json).expect("tree parses");
        assert_eq!(tree.suites.len(), 1);
        let file = &tree.suites[0].files[0];
        assert_eq!(file.class_name.as_deref(), Some("Tests\\Unit\\FooTest"));
        assert_eq!(
            file.methods[0].location,
            Some(LineRangeSummary { start: 10, end: 14 })
        );
        assert!(file.methods[0].datasets.is_empty());
        assert_eq!(file.methods[1].datasets[0].name, "testAdd with data set #0");
    }

    #[test]
    fn node_id_child() {
        let suite = TestNodeId::new("Unit");
        let file = suite.child("tests/Unit/FooTest.php");
        assert_eq!(file.as_str(), "Unit::tests/Unit/FooTest.php");
        assert_eq!(
            file.child("testLogin").to_string(),
            "Unit::tests/Unit/FooTest.php::testLogin"
        );
    }
}
