// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `verdict` failures.
///
/// `verdict` runs may fail for a variety of reasons. This structure documents the exit codes
/// that may occur in case of expected failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum VerdictExitCode {}

impl VerdictExitCode {
    /// No errors occurred and verdict exited normally.
    pub const OK: i32 = 0;

    /// One or more tests failed, or the runner exited with a fatal error.
    pub const TEST_RUN_FAILED: i32 = 100;

    /// The test runner process could not be started.
    pub const INVOCATION_FAILED: i32 = 101;

    /// The test runner process did not finish within the configured timeout.
    pub const TIMED_OUT: i32 = 102;

    /// The run was cancelled by the user.
    pub const CANCELLED: i32 = 103;

    /// A user issue happened while setting up a verdict invocation.
    pub const SETUP_ERROR: i32 = 96;

    /// Writing data to stdout or stderr produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;
}
