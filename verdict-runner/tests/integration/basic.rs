// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use camino_tempfile::tempdir;
use color_eyre::eyre::Result;
use pretty_assertions::assert_eq;
use verdict_runner::{
    aggregator::AggregationMode,
    config::VerdictConfig,
    reporter::{MessageFormat, ReporterBuilder, ReporterOutput, run_summary},
    run_table::{Outcome, SourceOfTruth},
    runner::{Invocation, Replay, RunController, ShellExecutor, TerminalStatus},
    state::NodeStateStore,
};
use verdict_metadata::{RunStatusSummary, RunSummary};

fn verdict_outcome(finished: &verdict_runner::runner::RunFinished, node: &str) -> Option<Outcome> {
    finished.verdicts.get(&id(node)).map(|verdict| verdict.outcome)
}

#[tokio::test]
async fn report_fills_gaps_left_by_streaming() -> Result<()> {
    let dir = tempdir()?;
    let report = dir.path().join("junit.xml");
    let executor = ShellExecutor::default();
    let controller = RunController::new(&TREE, &executor, settings());
    let invocation = Invocation::new(
        &TREE,
        scripted_runner("auth-output.log", Some(("auth-junit.xml", &report)), 1),
        &[id("Unit::tests/Unit/AuthTest.php")],
    )?
    .with_report_path(&report);

    let finished = controller.execute(&invocation, |_| {}).await?;

    assert_eq!(finished.terminal, TerminalStatus::Failed);
    assert_eq!(finished.exit_code, Some(1));
    assert_eq!(
        finished.corrections.filled,
        [id("Unit::tests/Unit/AuthTest.php::testPasswordReset")]
    );
    assert!(finished.corrections.corrections.is_empty());

    let reset = finished
        .table
        .get(&id("Unit::tests/Unit/AuthTest.php::testPasswordReset"))
        .expect("password reset has an outcome");
    assert_eq!(reset.outcome, Outcome::Passed);
    assert_eq!(reset.source, Some(SourceOfTruth::Report));

    let logout = finished
        .table
        .get(&id("Unit::tests/Unit/AuthTest.php::testLogout"))
        .expect("logout has an outcome");
    assert_eq!(logout.outcome, Outcome::Failed);
    assert!(
        logout
            .diagnostic
            .as_deref()
            .is_some_and(|diagnostic| diagnostic.contains("Failed asserting")),
        "report detail replaces the streamed line: {:?}",
        logout.diagnostic
    );

    assert_eq!(
        verdict_outcome(&finished, "Unit::tests/Unit/AuthTest.php"),
        Some(Outcome::Failed)
    );
    assert_eq!(verdict_outcome(&finished, "Unit"), Some(Outcome::Failed));
    assert_eq!(
        verdict_outcome(&finished, "Unit::tests/Unit/CartTest.php"),
        None,
        "files outside the run are not assigned"
    );
    Ok(())
}

#[tokio::test]
async fn fatal_error_before_any_result_aborts_the_file() -> Result<()> {
    let dir = tempdir()?;
    let state_path = dir.path().join("state.json");
    std::fs::copy(fixture("state.json"), &state_path)?;

    let executor = ShellExecutor::default();
    let controller = RunController::new(&TREE, &executor, settings());
    let invocation = Invocation::new(
        &TREE,
        scripted_runner("fatal-output.log", None, 255),
        &[id("Unit::tests/Unit/AuthTest.php")],
    )?;
    let finished = controller.execute(&invocation, |_| {}).await?;

    assert_eq!(finished.terminal, TerminalStatus::Failed);
    let fatal = finished.fatal_error.as_ref().expect("fatal error detected");
    assert_eq!(fatal.line, Some(42));
    assert_eq!(
        finished.verdicts.mode(),
        &AggregationMode::EarlyAbort {
            file: Some(id("Unit::tests/Unit/AuthTest.php"))
        }
    );

    let mut store = NodeStateStore::load(&state_path)?;
    store.apply(&finished.verdicts);
    store.save()?;
    let store = NodeStateStore::load(&state_path)?;

    for method in ["testLogin", "testLogout", "testPasswordReset"] {
        assert_eq!(
            store.outcome(&id(&format!("Unit::tests/Unit/AuthTest.php::{method}"))),
            Outcome::Failed,
            "{method} fails with the file"
        );
    }
    assert_eq!(
        store.outcome(&id("Unit")),
        Outcome::Passed,
        "the suite keeps its prior state"
    );
    let cart = store
        .get(&id("Unit::tests/Unit/CartTest.php::testTotals"))
        .expect("cart state retained");
    assert_eq!(cart.diagnostic.as_deref(), Some("✗ totals"));
    Ok(())
}

#[tokio::test]
async fn replay_matches_live_run() -> Result<()> {
    let dir = tempdir()?;
    let report = dir.path().join("junit.xml");
    let targets = [id("Unit::tests/Unit/AuthTest.php")];

    let executor = ShellExecutor::default();
    let controller = RunController::new(&TREE, &executor, settings());
    let invocation = Invocation::new(
        &TREE,
        scripted_runner("auth-output.log", Some(("auth-junit.xml", &report)), 1),
        &targets,
    )?
    .with_report_path(&report);
    let live = controller.execute(&invocation, |_| {}).await?;

    let replayed = Replay::new(&TREE, &targets, fixture("auth-output.log"))?
        .with_report_path(fixture("auth-junit.xml"))
        .with_exit_code(1)
        .run(|_| {})
        .await?;

    assert_eq!(replayed.terminal, live.terminal);
    assert_eq!(replayed.verdicts, live.verdicts);
    assert_eq!(replayed.corrections, live.corrections);
    Ok(())
}

#[tokio::test]
async fn profile_configures_transport_and_default_pass() -> Result<()> {
    let dir = tempdir()?;
    std::fs::create_dir_all(dir.path().join(".config"))?;
    std::fs::write(
        dir.path().join(VerdictConfig::CONFIG_PATH),
        indoc::indoc! {r#"
            [profile.ci]
            default-pass = false

            [profile.ci.transport]
            wrapper = "env VERDICT_WRAPPED=1"
        "#},
    )?;
    let config = VerdictConfig::from_sources(dir.path(), None)?;
    let profile = config.profile("ci")?;

    let executor = ShellExecutor::new(profile.transport());
    let controller = RunController::new(&TREE, &executor, profile.run_settings());
    let invocation = Invocation::new(
        &TREE,
        r#"test "$VERDICT_WRAPPED" = 1 && printf '  ✓ it completes checkout\n'"#,
        &[id("Feature")],
    )?
    .with_cwd(dir.path());

    let mut stderr = Vec::new();
    let mut stdout = Vec::new();
    let mut builder = ReporterBuilder::default();
    builder.set_message_format(MessageFormat::Json);
    let mut reporter = builder.build(
        &TREE,
        ReporterOutput::Buffer(&mut stderr),
        ReporterOutput::Buffer(&mut stdout),
    );
    let mut write_error = None;
    let finished = controller
        .execute(&invocation, |event| {
            if let Err(error) = reporter.report_event(&event) {
                write_error.get_or_insert(error);
            }
        })
        .await?;
    drop(reporter);
    assert!(write_error.is_none());

    assert_eq!(finished.terminal, TerminalStatus::Passed);
    assert_eq!(
        verdict_outcome(
            &finished,
            "Feature::tests/Feature/CheckoutTest.php::it completes checkout"
        ),
        Some(Outcome::Passed)
    );
    assert_eq!(
        verdict_outcome(
            &finished,
            "Feature::tests/Feature/CheckoutTest.php::it rejects empty carts"
        ),
        Some(Outcome::Unset),
        "default pass is disabled in this profile"
    );
    assert_eq!(verdict_outcome(&finished, "Feature"), Some(Outcome::Unset));

    let summary = RunSummary::parse_json(String::from_utf8(stdout)?)?;
    assert_eq!(summary, run_summary(&finished));
    assert_eq!(summary.status, RunStatusSummary::Passed);
    Ok(())
}
