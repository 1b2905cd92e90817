// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The process transport.
//!
//! [`ProcessExecutor`] is the seam between the run controller and however the test runner is
//! actually launched. [`ShellExecutor`] runs the command through the platform shell, optionally
//! behind a wrapper such as `docker exec -i app`.

use crate::{classifier::OutputChannel, config::TransportConfig, errors::InvocationError};
use bytes::Bytes;
use camino::Utf8PathBuf;
use std::{fmt, io, process::Stdio};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::{Child, ChildStderr, ChildStdout},
};
use tracing::debug;

/// A request to start the test runner process.
#[derive(Clone, Debug)]
pub struct SpawnRequest {
    /// The command string, as built by the invocation builder.
    pub command: String,

    /// The working directory. Defaults to the current directory.
    pub cwd: Option<Utf8PathBuf>,
}

/// Starts test runner processes.
pub trait ProcessExecutor: fmt::Debug + Send + Sync {
    /// Spawns the process described by `request`, with stdout and stderr piped.
    fn spawn(&self, request: &SpawnRequest) -> Result<ChildProcess, InvocationError>;
}

/// Runs commands through `sh -c` (`cmd /C` on Windows).
#[derive(Clone, Debug, Default)]
pub struct ShellExecutor {
    transport: TransportConfig,
}

impl ShellExecutor {
    /// Creates a new executor using the given transport.
    pub fn new(transport: &TransportConfig) -> Self {
        Self {
            transport: transport.clone(),
        }
    }

    fn argv(&self, command: &str) -> Result<Vec<String>, InvocationError> {
        if command.trim().is_empty() {
            return Err(InvocationError::EmptyCommand);
        }
        let mut argv = self.transport.wrapper_args()?;
        argv.extend(shell_argv(command));
        Ok(argv)
    }
}

#[cfg(unix)]
fn shell_argv(command: &str) -> [String; 3] {
    ["sh".to_owned(), "-c".to_owned(), command.to_owned()]
}

#[cfg(windows)]
fn shell_argv(command: &str) -> [String; 3] {
    ["cmd".to_owned(), "/C".to_owned(), command.to_owned()]
}

impl ProcessExecutor for ShellExecutor {
    fn spawn(&self, request: &SpawnRequest) -> Result<ChildProcess, InvocationError> {
        let argv = self.argv(&request.command)?;
        let (program, args) = argv.split_first().ok_or(InvocationError::EmptyCommand)?;

        let mut cmd = std::process::Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &request.cwd {
            cmd.current_dir(cwd);
        }
        super::os::set_process_group(&mut cmd);

        let mut cmd = tokio::process::Command::from(cmd);
        cmd.kill_on_drop(true);
        debug!(?argv, "spawning test runner");
        let child = cmd.spawn().map_err(|error| InvocationError::Spawn {
            command: request.command.clone(),
            error,
        })?;
        Ok(ChildProcess::new(child))
    }
}

/// A running test runner process with its output pipes.
#[derive(Debug)]
pub struct ChildProcess {
    pub(super) child: Child,
    pub(super) fds: ChildFds,
}

impl ChildProcess {
    /// Wraps a spawned child. Its stdout and stderr are taken if they were piped.
    pub fn new(mut child: Child) -> Self {
        let fds = ChildFds {
            stdout: child.stdout.take().map(FusedBufReader::new),
            stderr: child.stderr.take().map(FusedBufReader::new),
        };
        Self { child, fds }
    }
}

/// The size of each reader's buffer: the page size on most systems.
const CHUNK_SIZE: usize = 4 * 1024;

/// A `BufReader` that remembers whether it has reached the end of its input.
struct FusedBufReader<R> {
    reader: BufReader<R>,
    done: bool,
}

impl<R: AsyncRead + Unpin> FusedBufReader<R> {
    fn new(reader: R) -> Self {
        Self {
            reader: BufReader::with_capacity(CHUNK_SIZE, reader),
            done: false,
        }
    }

    /// Reads the next chunk. An empty chunk means end of input.
    ///
    /// Cancel-safe: bytes are only consumed once they have been copied out.
    async fn read_chunk(&mut self) -> io::Result<Bytes> {
        if self.done {
            return Ok(Bytes::new());
        }

        match self.reader.fill_buf().await {
            Ok(buf) => {
                let chunk = Bytes::copy_from_slice(buf);
                if chunk.is_empty() {
                    self.done = true;
                }
                self.reader.consume(chunk.len());
                Ok(chunk)
            }
            Err(error) => {
                self.done = true;
                Err(error)
            }
        }
    }

    fn is_done(&self) -> bool {
        self.done
    }
}

impl<R> fmt::Debug for FusedBufReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FusedBufReader")
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

async fn read_chunk_opt<R: AsyncRead + Unpin>(
    reader: &mut Option<FusedBufReader<R>>,
) -> io::Result<Bytes> {
    match reader {
        Some(reader) => reader.read_chunk().await,
        None => Ok(Bytes::new()),
    }
}

fn is_done_opt<R: AsyncRead + Unpin>(reader: &Option<FusedBufReader<R>>) -> bool {
    reader.as_ref().is_none_or(|reader| reader.is_done())
}

/// The stdout and stderr pipes of a child.
#[derive(Debug)]
pub(super) struct ChildFds {
    stdout: Option<FusedBufReader<ChildStdout>>,
    stderr: Option<FusedBufReader<ChildStderr>>,
}

impl ChildFds {
    pub(super) fn is_done(&self) -> bool {
        is_done_opt(&self.stdout) && is_done_opt(&self.stderr)
    }

    /// Waits for the next chunk on either channel.
    ///
    /// Returns `None` once both channels are closed. Chunks on one channel arrive in order; the
    /// order across channels is whichever becomes readable first.
    pub(super) async fn next_chunk(&mut self) -> Option<(OutputChannel, io::Result<Bytes>)> {
        let Self { stdout, stderr } = self;
        tokio::select! {
            res = read_chunk_opt(stdout), if !is_done_opt(stdout) => {
                Some((OutputChannel::Stdout, res))
            }
            res = read_chunk_opt(stderr), if !is_done_opt(stderr) => {
                Some((OutputChannel::Stderr, res))
            }
            else => None,
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn request(command: &str) -> SpawnRequest {
        SpawnRequest {
            command: command.to_owned(),
            cwd: None,
        }
    }

    #[test]
    fn wrapper_comes_first() {
        let executor = ShellExecutor::new(&TransportConfig::with_wrapper("docker exec -i app"));
        assert_eq!(
            executor.argv("vendor/bin/pest").unwrap(),
            ["docker", "exec", "-i", "app", "sh", "-c", "vendor/bin/pest"]
        );
    }

    #[test]
    fn empty_command_is_rejected() {
        let executor = ShellExecutor::default();
        assert!(matches!(
            executor.spawn(&request("  ")),
            Err(InvocationError::EmptyCommand)
        ));
    }

    #[tokio::test]
    async fn reads_both_channels_until_closed() {
        let executor = ShellExecutor::default();
        let mut child = executor
            .spawn(&request("printf out; printf err >&2"))
            .unwrap();

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        while let Some((channel, chunk)) = child.fds.next_chunk().await {
            let chunk = chunk.unwrap();
            match channel {
                OutputChannel::Stdout => stdout.extend_from_slice(&chunk),
                OutputChannel::Stderr => stderr.extend_from_slice(&chunk),
            }
        }
        assert!(child.fds.is_done());
        assert_eq!(stdout, b"out");
        assert_eq!(stderr, b"err");
        assert!(child.child.wait().await.unwrap().success());
    }

    #[tokio::test]
    async fn missing_wrapper_program_fails_to_spawn() {
        let executor =
            ShellExecutor::new(&TransportConfig::with_wrapper("/nonexistent/verdict-wrapper"));
        let error = executor.spawn(&request("true")).unwrap_err();
        assert!(matches!(error, InvocationError::Spawn { .. }), "{error}");
    }
}
