//! Process runner.

use std::ffi::{OsStr, OsString};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use crate::config::RunnerConfig;
use crate::error::{Result, RunError};
use crate::path::clean_path;
use crate::scope::{CancelReason, CancelScope};
use crate::sink::{CaptureBuffer, FanOut, Stream, pump};

/// Everything the child wrote to stdout and stderr.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Output {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl Output {
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// A single command execution with captured output and an enforced deadline.
///
/// Configuration methods consume and return the runner, and [`run`](Self::run)
/// consumes it, so all configuration happens before the child starts and a
/// runner executes at most once.
#[derive(Debug)]
pub struct Runner {
    program: OsString,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    stdout_buf: CaptureBuffer,
    stderr_buf: CaptureBuffer,
    stdout: FanOut,
    stderr: FanOut,
    config: RunnerConfig,
}

/// How the race between the child and the scope ended.
enum Outcome {
    Exited(io::Result<ExitStatus>),
    Expired(CancelReason),
}

/// Failure recorded before the output snapshot is attached.
enum Failure {
    Expired(CancelReason),
    Exit(ExitStatus),
    Wait(io::Error),
    Sink(Stream, io::Error),
}

impl Failure {
    fn into_error(self, output: Output, elapsed: Duration) -> RunError {
        match self {
            Failure::Expired(CancelReason::DeadlineExceeded) => RunError::Timeout { elapsed, output },
            Failure::Expired(CancelReason::Cancelled) => RunError::Cancelled { output },
            Failure::Exit(status) => RunError::Exit { status, output },
            Failure::Wait(source) => RunError::Wait { source, output },
            Failure::Sink(stream, source) => RunError::Sink {
                stream,
                source,
                output,
            },
        }
    }
}

impl Runner {
    /// Create a runner for `program` with `args`, capturing into fresh buffers.
    pub fn new<I, A>(program: impl AsRef<OsStr>, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: AsRef<OsStr>,
    {
        let stdout_buf = CaptureBuffer::new();
        let stderr_buf = CaptureBuffer::new();

        Self {
            program: program.as_ref().to_os_string(),
            args: args
                .into_iter()
                .map(|arg| arg.as_ref().to_os_string())
                .collect(),
            cwd: None,
            stdout: FanOut::new(stdout_buf.clone()),
            stderr: FanOut::new(stderr_buf.clone()),
            stdout_buf,
            stderr_buf,
            config: RunnerConfig::default(),
        }
    }

    /// Set the working directory. The path is normalized lexically; it is
    /// not checked until the child is launched.
    pub fn cd(mut self, path: impl AsRef<Path>) -> Self {
        self.cwd = Some(clean_path(path));
        self
    }

    /// Append a sink that receives a copy of everything written to stdout.
    pub fn add_stdout(mut self, sink: impl Write + Send + 'static) -> Self {
        self.stdout.push(sink);
        self
    }

    /// Append a sink that receives a copy of everything written to stderr.
    pub fn add_stderr(mut self, sink: impl Write + Send + 'static) -> Self {
        self.stderr.push(sink);
        self
    }

    pub fn with_config(mut self, config: RunnerConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the ceiling used when the scope carries no deadline.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_default_timeout(timeout);
        self
    }

    pub fn program(&self) -> &OsStr {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    pub fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    /// Run the command until it exits or `scope` ends.
    ///
    /// The run is bounded by the scope's deadline, or by the configured
    /// default ceiling when the scope has none. When the bound is hit or the
    /// scope is cancelled, the child is killed and the output written so far
    /// is returned inside the error.
    #[instrument(skip_all, fields(program = %self.program.to_string_lossy()))]
    pub async fn run(self, scope: &CancelScope) -> Result<Output> {
        let Runner {
            program,
            args,
            cwd,
            stdout_buf,
            stderr_buf,
            stdout,
            stderr,
            config,
        } = self;

        let timeout = scope.remaining().unwrap_or_else(|| config.default_timeout());
        let bounded = scope.child_with_timeout(timeout);

        let mut command = Command::new(&program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref dir) = cwd {
            command.current_dir(dir);
        }

        let started = Instant::now();
        let mut child = command.spawn().map_err(|source| RunError::Launch {
            program: program.to_string_lossy().into_owned(),
            source,
        })?;
        debug!(pid = ?child.id(), ?timeout, "spawned child");

        let mut pumps = Pumps {
            stdout: child
                .stdout
                .take()
                .map(|pipe| tokio::spawn(pump(pipe, stdout, Stream::Stdout))),
            stderr: child
                .stderr
                .take()
                .map(|pipe| tokio::spawn(pump(pipe, stderr, Stream::Stderr))),
        };

        let outcome = tokio::select! {
            biased;
            status = child.wait() => Outcome::Exited(status),
            reason = bounded.done() => Outcome::Expired(reason),
        };

        let failure = match outcome {
            Outcome::Exited(status) => {
                // Output is only complete once both pipes hit EOF, and the
                // scope still bounds that wait.
                let drained = tokio::select! {
                    biased;
                    result = pumps.join() => Ok(result),
                    reason = bounded.done() => Err(reason),
                };

                match (status, drained) {
                    (_, Err(reason)) => {
                        warn!(%reason, "child exited but its output did not close in time");
                        pumps.abort();
                        Some(Failure::Expired(reason))
                    }
                    (Err(e), Ok(_)) => Some(Failure::Wait(e)),
                    (Ok(status), Ok(_)) if !status.success() => {
                        debug!(%status, "child exited with failure");
                        Some(Failure::Exit(status))
                    }
                    (Ok(_), Ok(Some((stream, e)))) => Some(Failure::Sink(stream, e)),
                    (Ok(_), Ok(None)) => None,
                }
            }
            Outcome::Expired(reason) => {
                warn!(%reason, elapsed = ?started.elapsed(), "killing child");
                if let Err(e) = child.start_kill() {
                    debug!(error = %e, "kill failed, child already exited");
                }
                match tokio::time::timeout(config.drain_grace(), child.wait()).await {
                    Ok(Ok(status)) => debug!(%status, "killed child reaped"),
                    Ok(Err(e)) => debug!(error = %e, "failed to reap killed child"),
                    Err(_) => debug!("killed child not reaped within grace period"),
                }

                if tokio::time::timeout(config.drain_grace(), pumps.join())
                    .await
                    .is_err()
                {
                    debug!("output still open after kill, abandoning pumps");
                    pumps.abort();
                }
                Some(Failure::Expired(reason))
            }
        };

        let output = Output {
            stdout: stdout_buf.snapshot(),
            stderr: stderr_buf.snapshot(),
        };

        match failure {
            None => {
                debug!(elapsed = ?started.elapsed(), "child completed");
                Ok(output)
            }
            Some(failure) => Err(failure.into_error(output, started.elapsed())),
        }
    }
}

/// Background tasks copying the child's pipes into their sinks.
struct Pumps {
    stdout: Option<JoinHandle<io::Result<u64>>>,
    stderr: Option<JoinHandle<io::Result<u64>>>,
}

impl Pumps {
    /// Wait for both pumps and return the first failure, stdout first.
    ///
    /// Safe to call again after being interrupted; finished pumps are not
    /// awaited twice.
    async fn join(&mut self) -> Option<(Stream, io::Error)> {
        let mut first = None;
        for (stream, slot) in [
            (Stream::Stdout, &mut self.stdout),
            (Stream::Stderr, &mut self.stderr),
        ] {
            let Some(handle) = slot.as_mut() else {
                continue;
            };
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(io::Error::other(e)),
            };
            *slot = None;
            if let Err(e) = result
                && first.is_none()
            {
                first = Some((stream, e));
            }
        }
        first
    }

    fn abort(&mut self) {
        for handle in [self.stdout.take(), self.stderr.take()].into_iter().flatten() {
            handle.abort();
        }
    }
}
