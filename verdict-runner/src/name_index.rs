// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Matching free-text test identifiers to nodes.
//!
//! Test runners print test names in several shapes: the raw method name, a lowercased form,
//! the name with its `test` prefix removed, or a "testdox" sentence. The [`NameIndex`]
//! canonicalizes every declared name into each of these shapes and stores them in a single map,
//! so that a name printed in any shape resolves to the same node.

use crate::tree::{RunScope, TestFile, TestMethod, TestTree};
use regex::Regex;
use smol_str::SmolStr;
use std::{collections::HashMap, fmt, sync::LazyLock};
use tracing::debug;
use verdict_metadata::TestNodeId;

/// The shape of a canonical key, in lookup priority order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyKind {
    /// The name exactly as declared, trimmed.
    Exact,
    /// The name, lowercased.
    Lowercase,
    /// The lowercased name with a leading `test` prefix (and any `_` after it) removed.
    Stripped,
    /// The name split into lowercase words on camel-case humps and underscores, with a leading
    /// `test` word removed.
    Humanized,
}

impl KeyKind {
    /// All key kinds, in lookup priority order.
    pub const ALL: [KeyKind; 4] = [
        KeyKind::Exact,
        KeyKind::Lowercase,
        KeyKind::Stripped,
        KeyKind::Humanized,
    ];
}

/// A normalized identifier.
///
/// A key may be qualified by a class or file name: `FooTest` narrows `testLogin` to the method
/// declared in `FooTest`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CanonicalKey {
    qualifier: Option<SmolStr>,
    kind: KeyKind,
    text: SmolStr,
}

impl CanonicalKey {
    /// Builds the key of the given kind for a declared name.
    ///
    /// Returns `None` if the name has no key of this kind, for example a `Stripped` key for a
    /// name without a `test` prefix.
    pub fn for_declared(qualifier: Option<&str>, kind: KeyKind, name: &str) -> Option<Self> {
        let text = match kind {
            KeyKind::Exact => non_empty(name.trim().to_owned())?,
            KeyKind::Lowercase => non_empty(name.trim().to_lowercase())?,
            KeyKind::Stripped => strip_test_prefix(name)?,
            KeyKind::Humanized => humanize(name)?,
        };
        Some(Self::from_parts(qualifier, kind, text))
    }

    /// Builds the key of the given kind for a name printed by a test runner.
    ///
    /// This differs from [`Self::for_declared`] only for `Stripped` keys: a printed name
    /// without a `test` prefix is looked up as-is, since it may be the stripped form already.
    pub fn for_lookup(qualifier: Option<&str>, kind: KeyKind, raw: &str) -> Option<Self> {
        match kind {
            KeyKind::Stripped => {
                let text = strip_test_prefix(raw)
                    .or_else(|| non_empty(raw.trim().to_lowercase()))?;
                Some(Self::from_parts(qualifier, kind, text))
            }
            _ => Self::for_declared(qualifier, kind, raw),
        }
    }

    fn from_parts(qualifier: Option<&str>, kind: KeyKind, text: String) -> Self {
        Self {
            qualifier: qualifier.map(SmolStr::from),
            kind,
            text: text.into(),
        }
    }

    /// Returns the kind of this key.
    pub fn kind(&self) -> KeyKind {
        self.kind
    }

    /// Returns the normalized text of this key.
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(qualifier) = &self.qualifier {
            write!(f, "{qualifier}::")?;
        }
        write!(f, "{} ({:?})", self.text, self.kind)
    }
}

/// An O(1) index from canonical keys to declared nodes.
#[derive(Clone, Debug, Default)]
pub struct NameIndex {
    keys: HashMap<CanonicalKey, TestNodeId>,
}

impl NameIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an index over the leaves of `scope`, plus the methods that own them.
    ///
    /// Nodes are registered in tree order, so when two nodes share a key the one declared first
    /// wins.
    pub fn for_scope(tree: &TestTree, scope: &RunScope) -> Self {
        let mut index = Self::new();
        for file in scope.files(tree) {
            for method in &file.methods {
                if !method.leaf_ids().any(|id| scope.contains(id)) {
                    continue;
                }
                index.register_method(file, method, scope);
            }
        }
        debug!(keys = index.len(), "built name index");
        index
    }

    fn register_method(&mut self, file: &TestFile, method: &TestMethod, scope: &RunScope) {
        let qualifiers = file_qualifiers(file);
        self.register(&qualifiers, &method.id, &method.name);
        for dataset in &method.datasets {
            if scope.contains(&dataset.id) {
                self.register(&qualifiers, &dataset.id, &dataset.name);
            }
        }
    }

    /// Registers every key variant of `name`, unqualified and under each of `qualifiers`.
    pub fn register(&mut self, qualifiers: &[SmolStr], node: &TestNodeId, name: &str) {
        let scopes = std::iter::once(None).chain(qualifiers.iter().map(|q| Some(q.as_str())));
        for qualifier in scopes {
            for kind in KeyKind::ALL {
                let Some(key) = CanonicalKey::for_declared(qualifier, kind, name) else {
                    continue;
                };
                match self.keys.get(&key) {
                    Some(existing) if existing != node => {
                        debug!(%key, %existing, ignored = %node, "canonical key collision");
                    }
                    Some(_) => {}
                    None => {
                        self.keys.insert(key, node.clone());
                    }
                }
            }
        }
    }

    /// Returns the number of registered keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns true if no keys are registered.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Looks up an unqualified name: exact, then lowercase, then prefix-stripped, then humanized.
    pub fn lookup(&self, raw: &str) -> Option<&TestNodeId> {
        self.lookup_in(None, raw)
    }

    /// Looks up a name qualified by a class name (`Tests\Unit\FooTest`, `Tests.Unit.FooTest`)
    /// or a file path, falling back to the unqualified lookup.
    pub fn lookup_qualified(&self, qualifier: &str, raw: &str) -> Option<&TestNodeId> {
        normalize_qualifier(qualifier)
            .and_then(|qualifier| self.lookup_in(Some(qualifier.as_str()), raw))
            .or_else(|| self.lookup(raw))
    }

    fn lookup_in(&self, qualifier: Option<&str>, raw: &str) -> Option<&TestNodeId> {
        KeyKind::ALL.into_iter().find_map(|kind| {
            let key = CanonicalKey::for_lookup(qualifier, kind, raw)?;
            self.keys.get(&key)
        })
    }

    /// Resolves an identifier as printed by a test runner.
    ///
    /// Handles `Class::method` forms, an optional separately printed qualifier, and falls back
    /// from an unknown dataset invocation (`testAdd with data set #3`) to its method.
    pub fn resolve(&self, qualifier: Option<&str>, raw: &str) -> Option<&TestNodeId> {
        let raw = raw.trim();
        self.resolve_exact(qualifier, raw).or_else(|| {
            let base = DATASET_SUFFIX
                .captures(raw)
                .and_then(|captures| captures.name("base"))?;
            self.resolve_exact(qualifier, base.as_str())
        })
    }

    fn resolve_exact(&self, qualifier: Option<&str>, raw: &str) -> Option<&TestNodeId> {
        if let Some((class, name)) = raw.rsplit_once(TestNodeId::SEPARATOR)
            && let Some(node) = self.lookup_qualified(class, name)
        {
            return Some(node);
        }
        match qualifier {
            Some(qualifier) => self.lookup_qualified(qualifier, raw),
            None => self.lookup(raw),
        }
    }
}

static DATASET_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<base>.+)\s+with\s+(?:data\s+set\s+.+|\(.*\))$")
        .expect("dataset suffix regex is valid")
});

/// Returns the normalized qualifiers a file's nodes are registered under: the short class name
/// and the file stem.
fn file_qualifiers(file: &TestFile) -> Vec<SmolStr> {
    let mut qualifiers: Vec<SmolStr> = Vec::with_capacity(2);
    for qualifier in [file.short_class_name(), file.file_stem()]
        .into_iter()
        .flatten()
        .filter_map(normalize_qualifier)
    {
        if !qualifiers.contains(&qualifier) {
            qualifiers.push(qualifier);
        }
    }
    qualifiers
}

/// `Tests\Unit\FooTest`, `Tests.Unit.FooTest`, `tests/Unit/FooTest.php` → `footest`.
fn normalize_qualifier(qualifier: &str) -> Option<SmolStr> {
    let qualifier = qualifier.trim();
    let qualifier = qualifier
        .strip_suffix(".php")
        .or_else(|| qualifier.strip_suffix(".PHP"))
        .unwrap_or(qualifier);
    let last = qualifier.rsplit(['\\', '/', '.']).next()?;
    (!last.is_empty()).then(|| last.to_lowercase().into())
}

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}

fn strip_test_prefix(name: &str) -> Option<String> {
    let lower = name.trim().to_lowercase();
    let rest = lower.strip_prefix("test")?.trim_start_matches('_');
    non_empty(rest.to_owned())
}

fn humanize(name: &str) -> Option<String> {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut prev: Option<char> = None;

    for c in name.chars() {
        if c == '_' || c.is_whitespace() {
            flush_word(&mut current, &mut words);
            prev = None;
            continue;
        }
        if let Some(p) = prev {
            let hump = c.is_uppercase() && (p.is_lowercase() || p.is_ascii_digit());
            let digit = c.is_ascii_digit() && p.is_alphabetic();
            if hump || digit {
                flush_word(&mut current, &mut words);
            }
        }
        current.extend(c.to_lowercase());
        prev = Some(c);
    }
    flush_word(&mut current, &mut words);

    if words.len() > 1 && words[0] == "test" {
        words.remove(0);
    }
    non_empty(words.join(" "))
}

fn flush_word(current: &mut String, words: &mut Vec<String>) {
    if !current.is_empty() {
        words.push(std::mem::take(current));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::test_helpers::{file, id, sample_tree, suite, tree};
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case("testLogin", KeyKind::Exact, Some("testLogin"))]
    #[test_case("testLogin", KeyKind::Lowercase, Some("testlogin"))]
    #[test_case("testLogin", KeyKind::Stripped, Some("login"))]
    #[test_case("test_user_can_login", KeyKind::Stripped, Some("user_can_login"))]
    #[test_case("login", KeyKind::Stripped, None; "no prefix")]
    #[test_case("test", KeyKind::Stripped, None; "prefix only")]
    #[test_case("testUserCanLogin", KeyKind::Humanized, Some("user can login"))]
    #[test_case("test_user_can_login", KeyKind::Humanized, Some("user can login"))]
    #[test_case("testAdd2Numbers", KeyKind::Humanized, Some("add 2 numbers"))]
    #[test_case("it can log in", KeyKind::Humanized, Some("it can log in"))]
    #[test_case("   ", KeyKind::Exact, None; "blank")]
    fn declared_keys(name: &str, kind: KeyKind, expected: Option<&str>) {
        let key = CanonicalKey::for_declared(None, kind, name);
        assert_eq!(key.as_ref().map(|key| key.text()), expected);
    }

    #[test_case("Tests\\Unit\\FooTest", Some("footest"))]
    #[test_case("Tests.Unit.FooTest", Some("footest"))]
    #[test_case("tests/Unit/FooTest.php", Some("footest"))]
    #[test_case("/app/tests/Unit/FooTest.php", Some("footest"))]
    #[test_case("", None)]
    fn qualifiers(qualifier: &str, expected: Option<&str>) {
        assert_eq!(normalize_qualifier(qualifier).as_deref(), expected);
    }

    #[test_case("testLogin", Some("Unit::tests/Unit/AuthTest.php::testLogin"); "exact")]
    #[test_case("TESTLOGIN", Some("Unit::tests/Unit/AuthTest.php::testLogin"); "lowercase")]
    #[test_case("logout", Some("Unit::tests/Unit/AuthTest.php::testLogout"); "stripped")]
    #[test_case("Logout", Some("Unit::tests/Unit/AuthTest.php::testLogout"); "stripped capitalized")]
    #[test_case("testAdd with data set #1", Some("Unit::tests/Unit/MathTest.php::testAdd::testAdd with data set #1"); "dataset")]
    #[test_case("testAdd with data set #7", Some("Unit::tests/Unit/MathTest.php::testAdd"); "unknown dataset")]
    #[test_case("Tests\\Unit\\MathTest::testSub", Some("Unit::tests/Unit/MathTest.php::testSub"); "class qualified")]
    #[test_case("testMissing", None; "missing")]
    fn resolve_names(raw: &str, expected: Option<&str>) {
        let tree = sample_tree();
        let scope = tree.scope(&[]).unwrap();
        let index = NameIndex::for_scope(&tree, &scope);
        assert_eq!(index.resolve(None, raw), expected.map(id).as_ref());
    }

    #[test]
    fn qualifier_disambiguates_collisions() {
        let tree = tree(vec![suite(
            "Unit",
            vec![
                file("tests/Unit/AuthTest.php", Some("Tests\\Unit\\AuthTest"), &["testIt"]),
                file("tests/Unit/UserTest.php", Some("Tests\\Unit\\UserTest"), &["testIt"]),
            ],
        )]);
        let scope = tree.scope(&[]).unwrap();
        let index = NameIndex::for_scope(&tree, &scope);

        let auth = id("Unit::tests/Unit/AuthTest.php::testIt");
        let user = id("Unit::tests/Unit/UserTest.php::testIt");
        assert_eq!(index.lookup("testIt"), Some(&auth), "first registered wins");
        assert_eq!(index.lookup_qualified("Tests\\Unit\\UserTest", "testIt"), Some(&user));
        assert_eq!(index.resolve(Some("UserTest"), "testIt"), Some(&user));
        assert_eq!(index.resolve(None, "Tests\\Unit\\UserTest::testIt"), Some(&user));
        assert_eq!(
            index.lookup_qualified("tests/Unit/UserTest.php", "it"),
            Some(&user),
            "file path qualifier with stripped name"
        );
    }

    #[test]
    fn only_scope_is_indexed() {
        let tree = sample_tree();
        let scope = tree
            .scope(&[id("Unit::tests/Unit/AuthTest.php::testLogin")])
            .unwrap();
        let index = NameIndex::for_scope(&tree, &scope);
        assert!(index.lookup("testLogin").is_some());
        assert_eq!(index.lookup("testLogout"), None);
        assert_eq!(index.lookup("testIndex"), None);
    }

    #[test]
    fn humanized_testdox_names() {
        let tree = tree(vec![suite(
            "Unit",
            vec![file(
                "tests/Unit/AuthTest.php",
                None,
                &["testUserCanLogIn", "it rejects bad passwords"],
            )],
        )]);
        let scope = tree.scope(&[]).unwrap();
        let index = NameIndex::for_scope(&tree, &scope);
        assert_eq!(
            index.lookup("User can log in"),
            Some(&id("Unit::tests/Unit/AuthTest.php::testUserCanLogIn"))
        );
        assert_eq!(
            index.lookup("It rejects bad passwords"),
            Some(&id("Unit::tests/Unit/AuthTest.php::it rejects bad passwords"))
        );
    }
}
