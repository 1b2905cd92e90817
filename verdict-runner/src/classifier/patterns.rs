// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Line recognizers, in priority order.

use regex::Regex;
use std::sync::LazyLock;

/// Which recognizer matched a line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatternKind {
    /// `✓ identifier` or `✗ identifier`.
    Glyph,
    /// `identifier: STATUS`.
    StatusSuffix,
    /// `identifier (qualifier) ... STATUS`.
    Verbose,
    /// `ok N - identifier` or `not ok N - identifier`.
    Tap,
    /// `Test <path> > identifier`, printed only for failures.
    FailureHeader,
}

/// A recognized outcome line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineMatch<'a> {
    /// The recognizer that matched.
    pub pattern: PatternKind,
    /// Whether the line reports a pass.
    pub passed: bool,
    /// The identifier, without any qualifier.
    pub identifier: &'a str,
    /// A class name or file path printed next to the identifier.
    pub qualifier: Option<&'a str>,
    /// The identifier including any trailing parenthesized text.
    ///
    /// Parenthesized text is sometimes part of the name (Pest prints dataset invocations as
    /// `it adds with (1, 2)`), so both readings are kept.
    pub full: &'a str,
}

type Matcher = fn(&str) -> Option<LineMatch<'_>>;

/// The recognizers, first match wins.
static MATCHERS: [Matcher; 5] = [
    match_glyph,
    match_status_suffix,
    match_verbose,
    match_tap,
    match_failure_header,
];

/// Classifies a single line with ANSI escapes already removed.
pub fn classify(line: &str) -> Option<LineMatch<'_>> {
    MATCHERS.iter().find_map(|matcher| matcher(line))
}

const SUCCESS_GLYPHS: &[char] = &['✓', '✔', '√'];
const FAILURE_GLYPHS: &[char] = &['✗', '✘', '×', '⨯', '✕'];

static GLYPH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?P<glyph>[✓✔√✗✘×⨯✕])\s+(?P<rest>\S.*?)\s*$").expect("glyph regex is valid")
});

static TRAILING_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s+\d+(?:\.\d+)?\s?(?:ms|s)$").expect("duration regex is valid")
});

static TRAILING_QUALIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<id>\S.*?)\s*\((?P<qualifier>[^()]*)\)$").expect("qualifier regex is valid")
});

static STATUS_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?P<id>\S.*?):\s+(?P<status>ok|failed|passed|error)\s*$")
        .expect("status suffix regex is valid")
});

static VERBOSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?P<id>\S.*?)(?:\s+\((?P<qualifier>[^()]*)\))?\s*\.{3,}\s*(?P<status>ok|failed|passed|error)\s*$",
    )
    .expect("verbose regex is valid")
});

static TAP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?P<not>not\s+)?ok\s+\d+\s+-\s+(?P<id>\S.*?)(?:\s+#\s*(?i:skip|todo)\b.*)?\s*$")
        .expect("TAP regex is valid")
});

static FAILURE_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*Test\s+(?P<path>\S.*?)\s*(?:::|>|›|→)\s*(?P<id>\S.*?)\s*$")
        .expect("failure header regex is valid")
});

fn match_glyph(line: &str) -> Option<LineMatch<'_>> {
    let captures = GLYPH.captures(line)?;
    let glyph = captures.name("glyph")?.as_str().chars().next()?;
    let passed = if SUCCESS_GLYPHS.contains(&glyph) {
        true
    } else if FAILURE_GLYPHS.contains(&glyph) {
        false
    } else {
        return None;
    };

    let rest = captures.name("rest")?.as_str();
    let full = match TRAILING_DURATION.find(rest) {
        Some(duration) if duration.start() > 0 => &rest[..duration.start()],
        _ => rest,
    };
    let (identifier, qualifier) = split_qualifier(full);
    Some(LineMatch {
        pattern: PatternKind::Glyph,
        passed,
        identifier,
        qualifier,
        full,
    })
}

fn split_qualifier(full: &str) -> (&str, Option<&str>) {
    match TRAILING_QUALIFIER.captures(full) {
        Some(captures) => match (captures.name("id"), captures.name("qualifier")) {
            (Some(id), Some(qualifier)) => (id.as_str(), Some(qualifier.as_str())),
            _ => (full, None),
        },
        None => (full, None),
    }
}

fn is_passing_status(status: &str) -> bool {
    status.eq_ignore_ascii_case("ok") || status.eq_ignore_ascii_case("passed")
}

fn match_status_suffix(line: &str) -> Option<LineMatch<'_>> {
    let captures = STATUS_SUFFIX.captures(line)?;
    let identifier = captures.name("id")?.as_str();
    Some(LineMatch {
        pattern: PatternKind::StatusSuffix,
        passed: is_passing_status(captures.name("status")?.as_str()),
        identifier,
        qualifier: None,
        full: identifier,
    })
}

fn match_verbose(line: &str) -> Option<LineMatch<'_>> {
    let captures = VERBOSE.captures(line)?;
    let identifier = captures.name("id")?;
    let qualifier = captures.name("qualifier");
    let full = match qualifier {
        // Include the closing parenthesis.
        Some(qualifier) => &line[identifier.start()..qualifier.end() + 1],
        None => identifier.as_str(),
    };
    Some(LineMatch {
        pattern: PatternKind::Verbose,
        passed: is_passing_status(captures.name("status")?.as_str()),
        identifier: identifier.as_str(),
        qualifier: qualifier.map(|q| q.as_str()),
        full,
    })
}

fn match_tap(line: &str) -> Option<LineMatch<'_>> {
    let captures = TAP.captures(line)?;
    let identifier = captures.name("id")?.as_str();
    Some(LineMatch {
        pattern: PatternKind::Tap,
        passed: captures.name("not").is_none(),
        identifier,
        qualifier: None,
        full: identifier,
    })
}

fn match_failure_header(line: &str) -> Option<LineMatch<'_>> {
    let captures = FAILURE_HEADER.captures(line)?;
    let identifier = captures.name("id")?.as_str();
    Some(LineMatch {
        pattern: PatternKind::FailureHeader,
        passed: false,
        identifier,
        qualifier: captures.name("path").map(|path| path.as_str()),
        full: identifier,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case("✓ testLogin", PatternKind::Glyph, true, "testLogin", None)]
    #[test_case("  ✔ User can log in", PatternKind::Glyph, true, "User can log in", None)]
    #[test_case("√ testLogin", PatternKind::Glyph, true, "testLogin", None)]
    #[test_case("✗ testLogout", PatternKind::Glyph, false, "testLogout", None)]
    #[test_case("  ✘ testLogout", PatternKind::Glyph, false, "testLogout", None)]
    #[test_case("× testLogout", PatternKind::Glyph, false, "testLogout", None)]
    #[test_case("  ⨯ it fails 0.02s", PatternKind::Glyph, false, "it fails", None)]
    #[test_case("✕ testLogout 12 ms", PatternKind::Glyph, false, "testLogout", None)]
    #[test_case(
        "✓ testLogin (Tests\\Unit\\AuthTest)",
        PatternKind::Glyph, true, "testLogin", Some("Tests\\Unit\\AuthTest")
    )]
    #[test_case("testLogin: OK", PatternKind::StatusSuffix, true, "testLogin", None)]
    #[test_case("testLogin: passed", PatternKind::StatusSuffix, true, "testLogin", None)]
    #[test_case("testLogout: FAILED", PatternKind::StatusSuffix, false, "testLogout", None)]
    #[test_case("testLogout: Error", PatternKind::StatusSuffix, false, "testLogout", None)]
    #[test_case(
        "testLogin (Tests\\Unit\\AuthTest) ... ok",
        PatternKind::Verbose, true, "testLogin", Some("Tests\\Unit\\AuthTest")
    )]
    #[test_case(
        "testLogout (Tests\\Unit\\AuthTest) ... FAILED",
        PatternKind::Verbose, false, "testLogout", Some("Tests\\Unit\\AuthTest")
    )]
    #[test_case("ok 1 - testLogin", PatternKind::Tap, true, "testLogin", None)]
    #[test_case(
        "not ok 2 - Tests\\Unit\\AuthTest::testLogout",
        PatternKind::Tap, false, "Tests\\Unit\\AuthTest::testLogout", None
    )]
    #[test_case(
        "ok 3 - testAdd with data set #0 # SKIP not today",
        PatternKind::Tap, true, "testAdd with data set #0", None
    )]
    #[test_case(
        "  Test tests/Unit/AuthTest.php > testLogout",
        PatternKind::FailureHeader, false, "testLogout", Some("tests/Unit/AuthTest.php")
    )]
    #[test_case(
        "Test Tests\\Unit\\AuthTest::testLogout",
        PatternKind::FailureHeader, false, "testLogout", Some("Tests\\Unit\\AuthTest")
    )]
    fn recognizes(
        line: &str,
        pattern: PatternKind,
        passed: bool,
        identifier: &str,
        qualifier: Option<&str>,
    ) {
        let matched = classify(line).expect("line is recognized");
        assert_eq!(matched.pattern, pattern);
        assert_eq!(matched.passed, passed);
        assert_eq!(matched.identifier, identifier);
        assert_eq!(matched.qualifier, qualifier);
    }

    #[test_case(""; "empty")]
    #[test_case("PHPUnit 10.5.0 by Sebastian Bergmann and contributors."; "banner")]
    #[test_case("Tests: 3, Assertions: 5, Failures: 1."; "summary")]
    #[test_case("   PASS  Tests\\Unit\\AuthTest"; "pest file header")]
    #[test_case("..F.                    4 / 4 (100%)"; "progress")]
    fn passes_through(line: &str) {
        assert_eq!(classify(line), None);
    }

    #[test]
    fn pest_dataset_keeps_full_name() {
        let matched = classify("  ✓ it adds with (1, 2) 0.01s").expect("line is recognized");
        assert_eq!(matched.full, "it adds with (1, 2)");
        assert_eq!(matched.identifier, "it adds with");
        assert_eq!(matched.qualifier, Some("1, 2"));
    }

    #[test]
    fn verbose_full_includes_qualifier() {
        let matched = classify("testLogin (Tests\\Unit\\AuthTest) ... ok").expect("recognized");
        assert_eq!(matched.full, "testLogin (Tests\\Unit\\AuthTest)");
    }
}
