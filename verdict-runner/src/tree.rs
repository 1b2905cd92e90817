// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The declared test tree.
//!
//! The tree is supplied by a discovery tool before a run starts, as a
//! [`TestTreeSummary`](verdict_metadata::TestTreeSummary). A run never creates or deletes nodes,
//! it only annotates them.
//!
//! Ownership is strictly hierarchical: a [`TestSuite`] owns its [`TestFile`]s, a file owns its
//! [`TestMethod`]s, and a method owns its [`DatasetVariant`]s. [`TestNodeRef`] is a closed,
//! borrowed view over any of the four kinds.

use crate::{errors::TestTreeBuildError, helpers::path_matches_suffix};
use camino::{Utf8Path, Utf8PathBuf};
use std::{
    collections::{BTreeSet, HashMap, HashSet},
    fmt,
};
use verdict_metadata::{
    DatasetSummary, FileSummary, LineRangeSummary, MethodSummary, NodeKindSummary, SuiteSummary,
    TestNodeId, TestTreeSummary,
};

/// The kind of a node in the test tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A test suite.
    Suite,
    /// A test file.
    File,
    /// A test method.
    Method,
    /// One parameterized invocation of a method.
    DatasetVariant,
}

impl NodeKind {
    /// Converts this kind to its serializable form.
    pub fn to_summary(self) -> NodeKindSummary {
        match self {
            NodeKind::Suite => NodeKindSummary::Suite,
            NodeKind::File => NodeKindSummary::File,
            NodeKind::Method => NodeKindSummary::Method,
            NodeKind::DatasetVariant => NodeKindSummary::DatasetVariant,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Suite => write!(f, "suite"),
            NodeKind::File => write!(f, "file"),
            NodeKind::Method => write!(f, "method"),
            NodeKind::DatasetVariant => write!(f, "dataset"),
        }
    }
}

/// A range of lines in a source file, 1-based and inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineRange {
    /// The first line.
    pub start: u32,
    /// The last line.
    pub end: u32,
}

impl From<LineRangeSummary> for LineRange {
    fn from(summary: LineRangeSummary) -> Self {
        Self {
            start: summary.start,
            end: summary.end,
        }
    }
}

/// A point in a source file, used to make diagnostics clickable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceLocation {
    /// The file.
    pub file: Utf8PathBuf,
    /// The 1-based line, if known.
    pub line: Option<u32>,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{line}", self.file),
            None => write!(f, "{}", self.file),
        }
    }
}

/// The declared test tree.
#[derive(Clone, Debug)]
pub struct TestTree {
    suites: Vec<TestSuite>,
    by_id: HashMap<TestNodeId, NodePath>,
}

#[derive(Clone, Copy, Debug)]
enum NodePath {
    Suite(usize),
    File(usize, usize),
    Method(usize, usize, usize),
    Dataset(usize, usize, usize, usize),
}

impl TestTree {
    /// Builds a test tree from the output of a discovery tool.
    pub fn from_summary(summary: &TestTreeSummary) -> Result<Self, TestTreeBuildError> {
        let mut by_id = HashMap::new();
        let mut suites = Vec::with_capacity(summary.suites.len());

        for (suite_ix, suite) in summary.suites.iter().enumerate() {
            let suite = TestSuite::from_summary(suite)?;
            insert_id(&mut by_id, &suite.id, NodePath::Suite(suite_ix))?;

            for (file_ix, file) in suite.files.iter().enumerate() {
                insert_id(&mut by_id, &file.id, NodePath::File(suite_ix, file_ix))?;
                for (method_ix, method) in file.methods.iter().enumerate() {
                    insert_id(
                        &mut by_id,
                        &method.id,
                        NodePath::Method(suite_ix, file_ix, method_ix),
                    )?;
                    for (dataset_ix, dataset) in method.datasets.iter().enumerate() {
                        insert_id(
                            &mut by_id,
                            &dataset.id,
                            NodePath::Dataset(suite_ix, file_ix, method_ix, dataset_ix),
                        )?;
                    }
                }
            }

            suites.push(suite);
        }

        Ok(Self { suites, by_id })
    }

    /// Returns the suites in this tree, in declaration order.
    pub fn suites(&self) -> &[TestSuite] {
        &self.suites
    }

    /// Returns all files in this tree, in declaration order.
    pub fn files(&self) -> impl Iterator<Item = &TestFile> {
        self.suites.iter().flat_map(|suite| suite.files.iter())
    }

    /// Returns the total number of nodes in the tree.
    pub fn node_count(&self) -> usize {
        self.by_id.len()
    }

    /// Looks up a node by its identifier.
    pub fn get(&self, id: &TestNodeId) -> Option<TestNodeRef<'_>> {
        let node = match *self.by_id.get(id)? {
            NodePath::Suite(s) => TestNodeRef::Suite(&self.suites[s]),
            NodePath::File(s, f) => TestNodeRef::File(&self.suites[s].files[f]),
            NodePath::Method(s, f, m) => TestNodeRef::Method(&self.suites[s].files[f].methods[m]),
            NodePath::Dataset(s, f, m, d) => {
                TestNodeRef::DatasetVariant(&self.suites[s].files[f].methods[m].datasets[d])
            }
        };
        Some(node)
    }

    /// Returns the file that contains the given node, if the node is a file or lives inside one.
    pub fn file_of(&self, id: &TestNodeId) -> Option<&TestFile> {
        match *self.by_id.get(id)? {
            NodePath::Suite(_) => None,
            NodePath::File(s, f) | NodePath::Method(s, f, _) | NodePath::Dataset(s, f, _, _) => {
                Some(&self.suites[s].files[f])
            }
        }
    }

    /// Finds the declared file matching a path reported by the runner.
    ///
    /// Runners often report absolute paths (possibly inside a container), while discovery
    /// declares paths relative to the project root, so paths are matched by whole-component
    /// suffix.
    pub fn find_file_by_path(&self, path: &Utf8Path) -> Option<&TestFile> {
        self.files().find(|file| path_matches_suffix(path, &file.path))
    }

    /// Computes the set of leaves selected by the given targets.
    ///
    /// An empty target list selects the whole tree.
    pub fn scope(&self, targets: &[TestNodeId]) -> Result<RunScope, TestTreeBuildError> {
        let mut leaves = HashSet::new();
        if targets.is_empty() {
            for file in self.files() {
                leaves.extend(file.leaf_ids().cloned());
            }
            return Ok(RunScope { leaves });
        }

        for target in targets {
            let node = self
                .get(target)
                .ok_or_else(|| TestTreeBuildError::UnknownTarget { id: target.clone() })?;
            match node {
                TestNodeRef::Suite(suite) => {
                    for file in &suite.files {
                        leaves.extend(file.leaf_ids().cloned());
                    }
                }
                TestNodeRef::File(file) => leaves.extend(file.leaf_ids().cloned()),
                TestNodeRef::Method(method) => leaves.extend(method.leaf_ids().cloned()),
                TestNodeRef::DatasetVariant(dataset) => {
                    leaves.insert(dataset.id.clone());
                }
            }
        }

        Ok(RunScope { leaves })
    }
}

fn insert_id(
    by_id: &mut HashMap<TestNodeId, NodePath>,
    id: &TestNodeId,
    path: NodePath,
) -> Result<(), TestTreeBuildError> {
    if by_id.insert(id.clone(), path).is_some() {
        return Err(TestTreeBuildError::DuplicateId { id: id.clone() });
    }
    Ok(())
}

/// A borrowed view of any node in the tree.
#[derive(Clone, Copy, Debug)]
pub enum TestNodeRef<'a> {
    /// A suite.
    Suite(&'a TestSuite),
    /// A file.
    File(&'a TestFile),
    /// A method.
    Method(&'a TestMethod),
    /// A dataset variant.
    DatasetVariant(&'a DatasetVariant),
}

impl<'a> TestNodeRef<'a> {
    /// Returns the identifier of this node.
    pub fn id(&self) -> &'a TestNodeId {
        match self {
            TestNodeRef::Suite(suite) => &suite.id,
            TestNodeRef::File(file) => &file.id,
            TestNodeRef::Method(method) => &method.id,
            TestNodeRef::DatasetVariant(dataset) => &dataset.id,
        }
    }

    /// Returns the kind of this node.
    pub fn kind(&self) -> NodeKind {
        match self {
            TestNodeRef::Suite(_) => NodeKind::Suite,
            TestNodeRef::File(_) => NodeKind::File,
            TestNodeRef::Method(_) => NodeKind::Method,
            TestNodeRef::DatasetVariant(_) => NodeKind::DatasetVariant,
        }
    }

    /// Returns the display name of this node.
    pub fn display_name(&self) -> &'a str {
        match self {
            TestNodeRef::Suite(suite) => &suite.name,
            TestNodeRef::File(file) => file.path.as_str(),
            TestNodeRef::Method(method) => &method.name,
            TestNodeRef::DatasetVariant(dataset) => &dataset.name,
        }
    }
}

/// A test suite.
#[derive(Clone, Debug)]
pub struct TestSuite {
    /// The identifier: the suite name.
    pub id: TestNodeId,
    /// The name of the suite.
    pub name: String,
    /// The files in this suite.
    pub files: Vec<TestFile>,
}

impl TestSuite {
    fn from_summary(summary: &SuiteSummary) -> Result<Self, TestTreeBuildError> {
        if summary.name.is_empty() {
            return Err(TestTreeBuildError::EmptyName {
                kind: NodeKind::Suite,
                parent: None,
            });
        }
        let id = TestNodeId::new(&summary.name);
        let files = summary
            .files
            .iter()
            .map(|file| TestFile::from_summary(&id, file))
            .collect::<Result<_, _>>()?;
        Ok(Self {
            id,
            name: summary.name.clone(),
            files,
        })
    }

    /// Returns the number of leaves declared in this suite.
    pub fn leaf_count(&self) -> usize {
        self.files.iter().map(|file| file.leaf_count()).sum()
    }
}

/// A test file.
#[derive(Clone, Debug)]
pub struct TestFile {
    /// The identifier: `suite::path`.
    pub id: TestNodeId,
    /// The path to this file, relative to the project root.
    pub path: Utf8PathBuf,
    /// The fully qualified class declared in this file, if any.
    pub class_name: Option<String>,
    /// The lines spanned by the class or file body.
    pub lines: Option<LineRange>,
    /// Tags declared on this file.
    pub tags: BTreeSet<String>,
    /// The test methods in this file.
    pub methods: Vec<TestMethod>,
}

impl TestFile {
    fn from_summary(suite_id: &TestNodeId, summary: &FileSummary) -> Result<Self, TestTreeBuildError> {
        if summary.path.as_str().is_empty() {
            return Err(TestTreeBuildError::EmptyName {
                kind: NodeKind::File,
                parent: Some(suite_id.clone()),
            });
        }
        let id = suite_id.child(summary.path.as_str());
        let methods = summary
            .methods
            .iter()
            .map(|method| TestMethod::from_summary(&id, &summary.path, method))
            .collect::<Result<_, _>>()?;
        Ok(Self {
            id,
            path: summary.path.clone(),
            class_name: summary.class_name.clone(),
            lines: summary.location.map(LineRange::from),
            tags: summary.tags.clone(),
            methods,
        })
    }

    /// Returns the unqualified class name, for example `FooTest` for `Tests\Unit\FooTest`.
    pub fn short_class_name(&self) -> Option<&str> {
        let class_name = self.class_name.as_deref()?;
        class_name.rsplit(['\\', '.']).next()
    }

    /// Returns the file name without its extension, for example `FooTest` for
    /// `tests/Unit/FooTest.php`.
    pub fn file_stem(&self) -> Option<&str> {
        self.path.file_stem()
    }

    /// Returns the identifiers of all leaves declared in this file.
    pub fn leaf_ids(&self) -> impl Iterator<Item = &TestNodeId> {
        self.methods.iter().flat_map(|method| method.leaf_ids())
    }

    /// Returns the number of leaves declared in this file.
    pub fn leaf_count(&self) -> usize {
        self.methods
            .iter()
            .map(|method| method.datasets.len().max(1))
            .sum()
    }

    /// Returns the location of this file.
    pub fn location(&self) -> SourceLocation {
        SourceLocation {
            file: self.path.clone(),
            line: self.lines.map(|lines| lines.start),
        }
    }
}

/// A test method, or a function-style test.
#[derive(Clone, Debug)]
pub struct TestMethod {
    /// The identifier: `suite::path::name`.
    pub id: TestNodeId,
    /// The name of the method, as the runner prints it.
    pub name: String,
    /// The file this method is declared in.
    pub file: Utf8PathBuf,
    /// The lines spanned by this method.
    pub lines: Option<LineRange>,
    /// Tags declared on this method.
    pub tags: BTreeSet<String>,
    /// Parameterized invocations of this method.
    pub datasets: Vec<DatasetVariant>,
}

impl TestMethod {
    fn from_summary(
        file_id: &TestNodeId,
        file: &Utf8Path,
        summary: &MethodSummary,
    ) -> Result<Self, TestTreeBuildError> {
        if summary.name.is_empty() {
            return Err(TestTreeBuildError::EmptyName {
                kind: NodeKind::Method,
                parent: Some(file_id.clone()),
            });
        }
        let id = file_id.child(&summary.name);
        let datasets = summary
            .datasets
            .iter()
            .map(|dataset| DatasetVariant::from_summary(&id, dataset))
            .collect::<Result<_, _>>()?;
        Ok(Self {
            id,
            name: summary.name.clone(),
            file: file.to_owned(),
            lines: summary.location.map(LineRange::from),
            tags: summary.tags.clone(),
            datasets,
        })
    }

    /// Returns true if this method is a leaf, i.e. it declares no datasets.
    pub fn is_leaf(&self) -> bool {
        self.datasets.is_empty()
    }

    /// Returns the leaves under this method: its datasets, or the method itself.
    pub fn leaf_ids(&self) -> Box<dyn Iterator<Item = &TestNodeId> + '_> {
        if self.is_leaf() {
            Box::new(std::iter::once(&self.id))
        } else {
            Box::new(self.datasets.iter().map(|dataset| &dataset.id))
        }
    }

    /// Returns the location of this method.
    pub fn location(&self) -> SourceLocation {
        SourceLocation {
            file: self.file.clone(),
            line: self.lines.map(|lines| lines.start),
        }
    }
}

/// One parameterized invocation of a test method.
#[derive(Clone, Debug)]
pub struct DatasetVariant {
    /// The identifier: `suite::path::method::name`.
    pub id: TestNodeId,
    /// The method this dataset belongs to.
    pub method_id: TestNodeId,
    /// The full invocation name as the runner prints it.
    pub name: String,
}

impl DatasetVariant {
    fn from_summary(
        method_id: &TestNodeId,
        summary: &DatasetSummary,
    ) -> Result<Self, TestTreeBuildError> {
        if summary.name.is_empty() {
            return Err(TestTreeBuildError::EmptyName {
                kind: NodeKind::DatasetVariant,
                parent: Some(method_id.clone()),
            });
        }
        Ok(Self {
            id: method_id.child(&summary.name),
            method_id: method_id.clone(),
            name: summary.name.clone(),
        })
    }
}

/// The set of leaves targeted by one invocation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunScope {
    leaves: HashSet<TestNodeId>,
}

impl RunScope {
    /// Returns true if the given leaf is part of this run.
    pub fn contains(&self, id: &TestNodeId) -> bool {
        self.leaves.contains(id)
    }

    /// Returns the number of leaves in this run.
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// Returns true if this run targets no leaves.
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Returns the leaves in this run, in no particular order.
    pub fn leaves(&self) -> impl Iterator<Item = &TestNodeId> {
        self.leaves.iter()
    }

    /// Returns true if the given file has at least one leaf in this run.
    pub fn touches_file(&self, file: &TestFile) -> bool {
        file.leaf_ids().any(|id| self.contains(id))
    }

    /// Returns the files with at least one leaf in this run, in declaration order.
    pub fn files<'a>(&'a self, tree: &'a TestTree) -> impl Iterator<Item = &'a TestFile> + 'a {
        tree.files().filter(move |file| self.touches_file(file))
    }
}
