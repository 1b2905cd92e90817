// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! General support code for verdict-runner.

use camino::Utf8Path;
use std::{fmt, process::ExitStatus, time::Duration};

/// Utilities for pluralizing various words based on count or plurality.
pub mod plural {
    /// Returns "test" if `count` is 1, otherwise "tests".
    pub fn tests_str(count: usize) -> &'static str {
        if count == 1 { "test" } else { "tests" }
    }

    /// Returns "file" if `count` is 1, otherwise "files".
    pub fn files_str(count: usize) -> &'static str {
        if count == 1 { "file" } else { "files" }
    }

    /// Returns "correction" if `count` is 1, otherwise "corrections".
    pub fn corrections_str(count: usize) -> &'static str {
        if count == 1 {
            "correction"
        } else {
            "corrections"
        }
    }
}

#[derive(Debug)]
pub(crate) struct FormattedDuration(pub(crate) Duration);

impl fmt::Display for FormattedDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let duration = self.0.as_secs_f64();
        if duration > 60.0 {
            write!(f, "{}m {:.2}s", duration as u32 / 60, duration % 60.0)
        } else {
            write!(f, "{duration:.2}s")
        }
    }
}

// "exited with"/"terminated via"
pub(crate) fn display_exited_with(exit_status: ExitStatus) -> String {
    match exit_status.code() {
        Some(code) => format!("exited with exit code {code}"),
        None => display_signal(exit_status),
    }
}

#[cfg(unix)]
fn display_signal(exit_status: ExitStatus) -> String {
    use std::os::unix::process::ExitStatusExt;

    match exit_status.signal() {
        Some(libc::SIGTERM) => "terminated via SIGTERM".to_owned(),
        Some(libc::SIGKILL) => "terminated via SIGKILL".to_owned(),
        Some(signal) => format!("terminated via signal {signal}"),
        None => "exited with an unknown error".to_owned(),
    }
}

#[cfg(not(unix))]
fn display_signal(_exit_status: ExitStatus) -> String {
    "exited with an unknown error".to_owned()
}

/// Returns true if `reported` refers to the same file as `declared`.
///
/// `declared` is relative to the project root. `reported` may be absolute, may use Windows
/// separators, and may live under a different root (for example inside a container). The two
/// match if the components of `declared` are a suffix of the components of `reported`.
pub(crate) fn path_matches_suffix(reported: &Utf8Path, declared: &Utf8Path) -> bool {
    let reported = normalize_components(reported.as_str());
    let declared = normalize_components(declared.as_str());
    if declared.is_empty() || declared.len() > reported.len() {
        return false;
    }
    reported[reported.len() - declared.len()..] == declared[..]
}

fn normalize_components(path: &str) -> Vec<&str> {
    path.split(['/', '\\'])
        .filter(|component| !component.is_empty() && *component != ".")
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("tests/Unit/FooTest.php", "tests/Unit/FooTest.php", true; "identical")]
    #[test_case("/app/tests/Unit/FooTest.php", "tests/Unit/FooTest.php", true; "absolute")]
    #[test_case("C:\\work\\tests\\Unit\\FooTest.php", "tests/Unit/FooTest.php", true; "windows")]
    #[test_case("./tests/Unit/FooTest.php", "tests/Unit/FooTest.php", true; "dot prefix")]
    #[test_case("/app/xtests/Unit/FooTest.php", "tests/Unit/FooTest.php", false; "partial component")]
    #[test_case("FooTest.php", "tests/Unit/FooTest.php", false; "reported shorter")]
    #[test_case("/app/src/Foo.php", "tests/Unit/FooTest.php", false; "different file")]
    fn path_suffix_matching(reported: &str, declared: &str, expected: bool) {
        assert_eq!(
            path_matches_suffix(Utf8Path::new(reported), Utf8Path::new(declared)),
            expected
        );
    }

    #[test]
    fn formatted_duration() {
        assert_eq!(FormattedDuration(Duration::from_millis(1500)).to_string(), "1.50s");
        assert_eq!(FormattedDuration(Duration::from_secs(90)).to_string(), "1m 30.00s");
    }
}
