// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{io, process::ExitStatus, time::Duration};
use tokio::process::Child;

pub(super) fn set_process_group(_cmd: &mut std::process::Command) {}

/// Terminates the child. Windows has no graceful equivalent of `SIGTERM` for console processes,
/// so the grace period is unused.
pub(super) async fn terminate_child(
    child: &mut Child,
    _grace_period: Duration,
) -> io::Result<ExitStatus> {
    // Fails only if the child already exited, in which case `wait` returns its status.
    _ = child.start_kill();
    child.wait().await
}
