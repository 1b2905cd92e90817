// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Detection of unrecoverable runtime errors in test runner output.

use crate::tree::SourceLocation;
use camino::Utf8PathBuf;
use regex::{Captures, Regex};
use std::{fmt, sync::LazyLock};
use verdict_metadata::FatalErrorSummary;

/// An unrecoverable error that aborted a run.
///
/// A fatal error is not tied to a single node. The aggregator uses its file to decide which part
/// of the tree an aborted run is scoped to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FatalErrorInfo {
    /// The error class, for example `ParseError`, if the output named one.
    pub error_class: Option<String>,
    /// The error message.
    pub message: String,
    /// The file the error occurred in.
    pub file: Option<Utf8PathBuf>,
    /// The line the error occurred on.
    pub line: Option<u32>,
}

impl FatalErrorInfo {
    /// Returns the source location of this error, if the output named a file.
    pub fn location(&self) -> Option<SourceLocation> {
        self.file.as_ref().map(|file| SourceLocation {
            file: file.clone(),
            line: self.line,
        })
    }

    /// Converts this error to its serializable form.
    pub fn to_summary(&self) -> FatalErrorSummary {
        FatalErrorSummary {
            error_class: self.error_class.clone(),
            message: self.message.clone(),
            file: self.file.clone(),
            line: self.line,
        }
    }
}

impl fmt::Display for FatalErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(class) = &self.error_class {
            write!(f, "{class}: ")?;
        }
        write!(f, "{}", self.message)?;
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, " at {file}:{line}"),
            (Some(file), None) => write!(f, " at {file}"),
            _ => Ok(()),
        }
    }
}

/// Extracts a fatal error from combined process output.
///
/// Forms are tried in order, and the first match wins:
///
/// 1. An uncaught error with a class, message, file and line, either as PHP prints it
///    (`PHP Fatal error:  Uncaught Error: msg in /path/FooTest.php:42`) or as a Collision
///    error block (class, message, then `at tests/FooTest.php:42`).
/// 2. `<message> in <file> on line <N>`.
/// 3. A bare `Fatal error: <message>` with no location.
pub fn extract(output: &str) -> Option<FatalErrorInfo> {
    EXTRACTORS.iter().find_map(|extractor| extractor(output))
}

static EXTRACTORS: [fn(&str) -> Option<FatalErrorInfo>; 4] = [
    extract_uncaught,
    extract_error_block,
    extract_on_line,
    extract_generic,
];

static UNCAUGHT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)(?:PHP\s+)?Fatal error:\s+Uncaught\s+(?P<class>[A-Za-z_][\w\\]*):\s+(?P<message>.*?)\s+in\s+(?P<file>\S+?\.php)(?::|\s+on\s+line\s+|\()(?P<line>\d+)",
    )
    .expect("uncaught error regex is valid")
});

static ERROR_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^\s*(?P<class>[A-Z][\w\\]*)\s*$\s*^\s*(?P<message>\S.*?)\s*$\s*^\s*at\s+(?P<file>\S+?\.php):(?P<line>\d+)",
    )
    .expect("error block regex is valid")
});

static ON_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^\s*(?:PHP\s+)?(?P<message>\S.*?)\s+in\s+(?P<file>\S+?\.php)\s+on\s+line\s+(?P<line>\d+)",
    )
    .expect("on-line error regex is valid")
});

static GENERIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:PHP\s+)?(?P<kind>Fatal|Parse) error:\s*(?P<message>\S.*?)\s*$")
        .expect("generic error regex is valid")
});

static LOCATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?P<file>[^\s'"()]+\.php)(?::(?P<line>\d+)|\((?P<paren>\d+)\))"#)
        .expect("location regex is valid")
});

// Assertion failures print the same block shape as engine errors.
const NOT_FATAL_CLASSES: &[&str] = &["AssertionFailedError", "ExpectationFailedException"];

// PHP diagnostics that print "in <file> on line <N>" without aborting.
const NON_FATAL_PREFIXES: &[&str] = &["Warning:", "Notice:", "Deprecated:", "PHP Warning:"];

fn extract_uncaught(output: &str) -> Option<FatalErrorInfo> {
    let captures = UNCAUGHT.captures(output)?;
    Some(from_captures(&captures, captures.name("class").map(|c| c.as_str())))
}

fn extract_error_block(output: &str) -> Option<FatalErrorInfo> {
    ERROR_BLOCK.captures_iter(output).find_map(|captures| {
        let class = captures.name("class")?.as_str();
        let short = class.rsplit('\\').next().unwrap_or(class);
        if !short.ends_with("Error") || NOT_FATAL_CLASSES.contains(&short) {
            return None;
        }
        Some(from_captures(&captures, Some(class)))
    })
}

fn extract_on_line(output: &str) -> Option<FatalErrorInfo> {
    ON_LINE.captures_iter(output).find_map(|captures| {
        let message = captures.name("message")?.as_str();
        if NON_FATAL_PREFIXES
            .iter()
            .any(|prefix| message.starts_with(prefix))
        {
            return None;
        }
        let mut info = from_captures(&captures, None);
        info.message = strip_error_prefix(&info.message).to_owned();
        Some(info)
    })
}

fn extract_generic(output: &str) -> Option<FatalErrorInfo> {
    let captures = GENERIC.captures(output)?;
    let kind = captures.name("kind").map(|kind| kind.as_str());
    Some(FatalErrorInfo {
        error_class: (kind == Some("Parse")).then(|| "ParseError".to_owned()),
        message: captures.name("message")?.as_str().to_owned(),
        file: None,
        line: None,
    })
}

fn from_captures(captures: &Captures<'_>, class: Option<&str>) -> FatalErrorInfo {
    FatalErrorInfo {
        error_class: class.map(str::to_owned),
        message: captures
            .name("message")
            .map_or_else(String::new, |m| m.as_str().trim().to_owned()),
        file: captures.name("file").map(|m| Utf8PathBuf::from(m.as_str())),
        line: captures.name("line").and_then(|m| m.as_str().parse().ok()),
    }
}

fn strip_error_prefix(message: &str) -> &str {
    ["Fatal error:", "Parse error:"]
        .iter()
        .find_map(|prefix| message.strip_prefix(prefix))
        .map_or(message, str::trim_start)
}

/// Finds the first `file.php:line` (or `file.php(line)`) reference in `text`.
pub(crate) fn locate(text: &str) -> Option<SourceLocation> {
    let captures = LOCATION.captures(text)?;
    let line = captures
        .name("line")
        .or_else(|| captures.name("paren"))
        .and_then(|m| m.as_str().parse().ok());
    Some(SourceLocation {
        file: captures.name("file")?.as_str().into(),
        line,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn info(
        class: Option<&str>,
        message: &str,
        file: Option<&str>,
        line: Option<u32>,
    ) -> FatalErrorInfo {
        FatalErrorInfo {
            error_class: class.map(str::to_owned),
            message: message.to_owned(),
            file: file.map(Utf8PathBuf::from),
            line,
        }
    }

    #[test_case(
        indoc! {r#"
            PHPUnit 10.5.0 by Sebastian Bergmann and contributors.

            PHP Fatal error:  Uncaught Error: Class "App\Missing" not found in /app/tests/unit/FooTest.php:42
            Stack trace:
            #0 {main}
        "#},
        Some(info(Some("Error"), r#"Class "App\Missing" not found"#, Some("/app/tests/unit/FooTest.php"), Some(42)))
        ; "uncaught"
    )]
    #[test_case(
        indoc! {r#"
              Error

              Call to undefined function foo()

              at tests/unit/FooTest.php:42
                 38|
        "#},
        Some(info(Some("Error"), "Call to undefined function foo()", Some("tests/unit/FooTest.php"), Some(42)))
        ; "collision block"
    )]
    #[test_case(
        indoc! {"
              PHPUnit\\Framework\\ExpectationFailedException

              Failed asserting that false is true.

              at tests/unit/FooTest.php:12
        "},
        None
        ; "assertion block is not fatal"
    )]
    #[test_case(
        "PHP Parse error:  syntax error, unexpected token \"}\" in /app/tests/unit/FooTest.php on line 42\n",
        Some(info(None, "syntax error, unexpected token \"}\"", Some("/app/tests/unit/FooTest.php"), Some(42)))
        ; "on line"
    )]
    #[test_case(
        "Deprecated: strlen(): Passing null in /app/src/Foo.php on line 3\n",
        None
        ; "deprecation is not fatal"
    )]
    #[test_case(
        "Fatal error: Allowed memory size of 134217728 bytes exhausted\n",
        Some(info(None, "Allowed memory size of 134217728 bytes exhausted", None, None))
        ; "generic"
    )]
    #[test_case("✓ testLogin\n✗ testLogout\n", None; "ordinary output")]
    fn extract_forms(output: &str, expected: Option<FatalErrorInfo>) {
        assert_eq!(extract(output), expected);
    }

    #[test_case("at /app/tests/FooTest.php:42", Some(("/app/tests/FooTest.php", Some(42))))]
    #[test_case("C:\\app\\FooTest.php(17)", Some(("C:\\app\\FooTest.php", Some(17))))]
    #[test_case("Failed asserting that 1 is 2.", None)]
    fn locate_references(text: &str, expected: Option<(&str, Option<u32>)>) {
        let expected = expected.map(|(file, line)| SourceLocation {
            file: file.into(),
            line,
        });
        assert_eq!(locate(text), expected);
    }
}
