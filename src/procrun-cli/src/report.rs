//! Rendering a finished run.

use std::io::{self, Write};
use std::time::Duration;

use procrun::{Output, RunError};
use serde::Serialize;

use crate::exit_codes;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Failed,
    TimedOut,
    Cancelled,
    LaunchFailed,
    OutputFailed,
}

/// JSON summary of a run.
///
/// `stdout` and `stderr` are decoded as UTF-8 with invalid sequences replaced
/// by U+FFFD. `lossy_output` is set when that replacement happened; use the
/// text format (or a tee file) to get the exact bytes.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub lossy_output: bool,
    pub elapsed_ms: u64,
    pub error: Option<String>,
}

impl RunReport {
    pub fn new(result: &procrun::Result<Output>, elapsed: Duration) -> Self {
        let (status, exit_code) = match result {
            Ok(_) => (RunStatus::Success, Some(0)),
            Err(err @ RunError::Exit { .. }) => (RunStatus::Failed, err.exit_code()),
            Err(RunError::Timeout { .. }) => (RunStatus::TimedOut, None),
            Err(RunError::Cancelled { .. }) => (RunStatus::Cancelled, None),
            Err(RunError::Launch { .. }) => (RunStatus::LaunchFailed, None),
            Err(RunError::Wait { .. } | RunError::Sink { .. }) => (RunStatus::OutputFailed, None),
        };

        let output = match result {
            Ok(output) => Some(output),
            Err(err) => err.output(),
        };

        Self {
            status,
            exit_code,
            stdout: output.map(Output::stdout_lossy).unwrap_or_default(),
            stderr: output.map(Output::stderr_lossy).unwrap_or_default(),
            lossy_output: output.is_some_and(|output| {
                std::str::from_utf8(&output.stdout).is_err()
                    || std::str::from_utf8(&output.stderr).is_err()
            }),
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            error: result.as_ref().err().map(ToString::to_string),
        }
    }

    /// Exit code procrun should terminate with.
    pub fn process_exit_code(&self) -> i32 {
        match self.status {
            RunStatus::Success => exit_codes::SUCCESS,
            RunStatus::Failed => match self.exit_code {
                Some(code) if code != 0 => code,
                _ => exit_codes::GENERAL_FAILURE,
            },
            RunStatus::TimedOut => exit_codes::TIMED_OUT,
            RunStatus::Cancelled => exit_codes::CANCELLED,
            RunStatus::LaunchFailed => exit_codes::LAUNCH_FAILURE,
            RunStatus::OutputFailed => exit_codes::OUTPUT_FAILURE,
        }
    }
}

/// Replay captured streams byte-for-byte and print a one-line diagnostic on failure.
pub fn write_text(
    result: &procrun::Result<Output>,
    stdout: &mut impl Write,
    stderr: &mut impl Write,
) -> io::Result<()> {
    let output = match result {
        Ok(output) => Some(output),
        Err(err) => err.output(),
    };

    if let Some(output) = output {
        stdout.write_all(&output.stdout)?;
        stderr.write_all(&output.stderr)?;
    }
    if let Err(err) = result {
        writeln!(stderr, "procrun: {err}")?;
    }

    stdout.flush()?;
    stderr.flush()
}

pub fn write_json(report: &RunReport, stdout: &mut impl Write) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *stdout, report)?;
    writeln!(stdout)?;
    stdout.flush()
}
