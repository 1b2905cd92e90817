// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::{Utf8Path, Utf8PathBuf};
use std::{sync::LazyLock, time::Duration};
use swrite::{SWrite, swrite};
use verdict_metadata::{TestNodeId, TestTreeSummary};
use verdict_runner::{
    aggregator::AggregationPolicy, report::ReportWait, runner::RunSettings, tree::TestTree,
};

pub(crate) static FIXTURE_DIR: LazyLock<Utf8PathBuf> =
    LazyLock::new(|| Utf8Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures"));

pub(crate) static TREE: LazyLock<TestTree> = LazyLock::new(|| {
    let json = std::fs::read_to_string(FIXTURE_DIR.join("tree.json"))
        .expect("tree fixture is readable");
    let summary = TestTreeSummary::parse_json(json).expect("tree fixture is valid JSON");
    TestTree::from_summary(&summary).expect("tree fixture is a valid tree")
});

pub(crate) fn fixture(name: &str) -> Utf8PathBuf {
    FIXTURE_DIR.join(name)
}

pub(crate) fn id(id: &str) -> TestNodeId {
    TestNodeId::new(id)
}

/// A shell command that replays a captured output log, optionally writes a report, and exits
/// with `exit_code`, the way the real runner would.
pub(crate) fn scripted_runner(
    output_log: &str,
    report: Option<(&str, &Utf8Path)>,
    exit_code: i32,
) -> String {
    let mut command = format!("cat '{}'", fixture(output_log));
    if let Some((report, dest)) = report {
        swrite!(command, "; cp '{}' '{dest}'", fixture(report));
    }
    swrite!(command, "; exit {exit_code}");
    command
}

pub(crate) fn settings() -> RunSettings {
    RunSettings {
        timeout: Duration::from_secs(60),
        termination_grace_period: Duration::from_millis(500),
        report_wait: ReportWait {
            grace_period: Duration::from_millis(500),
            poll_interval: Duration::from_millis(20),
        },
        policy: AggregationPolicy::default(),
    }
}
