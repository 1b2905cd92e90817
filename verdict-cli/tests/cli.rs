// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::{Utf8Path, Utf8PathBuf};
use camino_tempfile::tempdir;
use color_eyre::eyre::Result;
use pretty_assertions::assert_eq;
use std::process::{Command, Output};
use verdict_metadata::{
    NodeStatesSummary, OutcomeSummary, RunStatusSummary, RunSummary, TestNodeId, VerdictExitCode,
};

fn fixture(name: &str) -> Utf8PathBuf {
    Utf8Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../verdict-runner/tests/fixtures")
        .join(name)
}

fn verdict(cwd: &Utf8Path, args: &[&str]) -> Result<Output> {
    Ok(Command::new(env!("CARGO_BIN_EXE_verdict"))
        .current_dir(cwd)
        .env("VERDICT_COLOR", "never")
        .args(args)
        .output()?)
}

fn outcome(summary: &RunSummary, id: &str) -> Option<OutcomeSummary> {
    summary.nodes.get(&TestNodeId::new(id)).map(|node| node.outcome)
}

#[test]
fn reconcile_prints_json_summary_and_saves_state() -> Result<()> {
    let dir = tempdir()?;
    let state = dir.path().join("state.json");
    let tree = fixture("tree.json");
    let output_log = fixture("auth-output.log");
    let report = fixture("auth-junit.xml");

    let output = verdict(
        dir.path(),
        &[
            "reconcile",
            "--tree",
            tree.as_str(),
            "--output-log",
            output_log.as_str(),
            "--report",
            report.as_str(),
            "--exit-code",
            "1",
            "--target",
            "Unit::tests/Unit/AuthTest.php",
            "--state",
            state.as_str(),
            "--message-format",
            "json",
        ],
    )?;

    assert_eq!(
        output.status.code(),
        Some(VerdictExitCode::TEST_RUN_FAILED),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stderr = String::from_utf8(output.stderr)?;
    assert!(
        stderr.contains("FAIL Unit::tests/Unit/AuthTest.php::testLogout"),
        "stderr: {stderr}"
    );

    let summary = RunSummary::parse_json(String::from_utf8(output.stdout)?)?;
    assert_eq!(summary.status, RunStatusSummary::Failed);
    assert_eq!(
        outcome(&summary, "Unit::tests/Unit/AuthTest.php::testPasswordReset"),
        Some(OutcomeSummary::Passed)
    );
    assert_eq!(outcome(&summary, "Unit"), Some(OutcomeSummary::Failed));

    let saved = NodeStatesSummary::parse_json(std::fs::read_to_string(&state)?)?;
    assert_eq!(
        saved.nodes[&TestNodeId::new("Unit::tests/Unit/AuthTest.php::testLogout")].outcome,
        OutcomeSummary::Failed
    );
    Ok(())
}

#[test]
fn unknown_target_is_a_setup_error() -> Result<()> {
    let dir = tempdir()?;
    let tree = fixture("tree.json");
    let output_log = fixture("auth-output.log");

    let output = verdict(
        dir.path(),
        &[
            "reconcile",
            "--tree",
            tree.as_str(),
            "--output-log",
            output_log.as_str(),
            "--target",
            "Unit::tests/Unit/MissingTest.php",
        ],
    )?;

    assert_eq!(output.status.code(), Some(VerdictExitCode::SETUP_ERROR));
    let stderr = String::from_utf8(output.stderr)?;
    assert!(stderr.contains("is not in the test tree"), "stderr: {stderr}");
    Ok(())
}

#[test]
fn malformed_tree_is_a_setup_error() -> Result<()> {
    let dir = tempdir()?;
    let tree = dir.path().join("tree.json");
    std::fs::write(&tree, "{ \"suites\": [ }")?;

    let output = verdict(
        dir.path(),
        &["run", "--tree", tree.as_str(), "--command", "true"],
    )?;

    assert_eq!(output.status.code(), Some(VerdictExitCode::SETUP_ERROR));
    Ok(())
}

#[cfg(unix)]
#[test]
fn run_passes_when_every_test_passes() -> Result<()> {
    let dir = tempdir()?;
    let tree = fixture("tree.json");

    let output = verdict(
        dir.path(),
        &[
            "run",
            "--tree",
            tree.as_str(),
            "--target",
            "Feature",
            "--command",
            "printf '  ✓ it completes checkout\\n  ✓ it rejects empty carts\\n'",
        ],
    )?;

    assert_eq!(
        output.status.code(),
        Some(VerdictExitCode::OK),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(output.stdout.is_empty(), "human format keeps stdout clean");
    Ok(())
}
