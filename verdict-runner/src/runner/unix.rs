// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use libc::{SIGKILL, SIGTERM};
use std::{io, os::unix::process::CommandExt, process::ExitStatus, time::Duration};
use tokio::process::Child;
use tracing::debug;

/// Pre-execution configuration on Unix.
///
/// The child gets its own process group, so that termination also reaches anything it spawned.
pub(super) fn set_process_group(cmd: &mut std::process::Command) {
    cmd.process_group(0);
}

/// Terminates the child's process group: `SIGTERM`, then `SIGKILL` once `grace_period` elapses.
pub(super) async fn terminate_child(
    child: &mut Child,
    grace_period: Duration,
) -> io::Result<ExitStatus> {
    let Some(pid) = child.id() else {
        // Already reaped.
        return child.wait().await;
    };
    // A negative pid signals the whole process group.
    let pgid = -(pid as libc::pid_t);

    if grace_period.is_zero() {
        unsafe { libc::kill(pgid, SIGKILL) };
        return child.wait().await;
    }

    unsafe { libc::kill(pgid, SIGTERM) };
    tokio::select! {
        status = child.wait() => status,
        () = tokio::time::sleep(grace_period) => {
            debug!(pid, "test runner ignored SIGTERM, sending SIGKILL");
            unsafe { libc::kill(pgid, SIGKILL) };
            child.wait().await
        }
    }
}
