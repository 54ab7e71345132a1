//! Error types for process runs.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

use crate::runner::Output;
use crate::sink::Stream;

/// Errors returned by [`Runner::run`](crate::Runner::run).
///
/// Every variant except [`RunError::Launch`] carries the output the child
/// produced before the run ended.
#[derive(Debug, Error)]
pub enum RunError {
    /// The child process could not be started.
    #[error("Failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The deadline passed and the child was killed.
    #[error("Command timed out after {elapsed:?}")]
    Timeout { elapsed: Duration, output: Output },

    /// The caller cancelled the run and the child was killed.
    #[error("Command was cancelled")]
    Cancelled { output: Output },

    /// The child exited with a non-zero status.
    #[error("Command failed with {status}")]
    Exit { status: ExitStatus, output: Output },

    /// Waiting on the child failed.
    #[error("Failed to wait for command: {source}")]
    Wait {
        #[source]
        source: io::Error,
        output: Output,
    },

    /// A sink rejected a write.
    #[error("Failed to write {stream} to sink: {source}")]
    Sink {
        stream: Stream,
        #[source]
        source: io::Error,
        output: Output,
    },
}

impl RunError {
    /// Output captured before the failure, `None` for launch errors.
    pub fn output(&self) -> Option<&Output> {
        match self {
            RunError::Launch { .. } => None,
            RunError::Timeout { output, .. }
            | RunError::Cancelled { output }
            | RunError::Exit { output, .. }
            | RunError::Wait { output, .. }
            | RunError::Sink { output, .. } => Some(output),
        }
    }

    pub fn into_output(self) -> Option<Output> {
        match self {
            RunError::Launch { .. } => None,
            RunError::Timeout { output, .. }
            | RunError::Cancelled { output }
            | RunError::Exit { output, .. }
            | RunError::Wait { output, .. }
            | RunError::Sink { output, .. } => Some(output),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, RunError::Timeout { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunError::Cancelled { .. })
    }

    /// The child's exit code for [`RunError::Exit`], if it exited normally.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            RunError::Exit { status, .. } => status.code(),
            _ => None,
        }
    }
}

/// Result type alias for process runs.
pub type Result<T> = std::result::Result<T, RunError>;
