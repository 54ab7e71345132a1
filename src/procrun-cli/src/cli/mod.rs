//! CLI argument parsing and command dispatch.
//!
//! - `args` - Command-line argument structures
//! - `run_command` - Builds the runner from arguments and executes it

pub mod args;

pub use args::{Cli, LogLevel, OutputFormat};

use std::fs::File;
use std::io;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use procrun::{CancelScope, Runner, RunnerConfig};
use tracing::{debug, info};

use crate::report::{self, RunReport};

/// Build a runner from the parsed arguments.
pub fn build_runner(cli: &Cli) -> Result<Runner> {
    let config = match &cli.config {
        Some(path) => RunnerConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => RunnerConfig::default(),
    };

    let (program, args) = cli.program();
    let mut runner = Runner::new(program, args).with_config(config);

    if let Some(dir) = &cli.cwd {
        runner = runner.cd(dir);
    }
    for path in &cli.tee_stdout {
        runner = runner.add_stdout(create_tee(path)?);
    }
    for path in &cli.tee_stderr {
        runner = runner.add_stderr(create_tee(path)?);
    }

    Ok(runner)
}

fn create_tee(path: &Path) -> Result<File> {
    File::create(path).with_context(|| format!("Failed to create tee file {}", path.display()))
}

/// Cancel `scope` when the process receives Ctrl+C.
fn cancel_on_ctrl_c(scope: &CancelScope) {
    let scope = scope.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, cancelling command");
            scope.cancel();
        }
    });
}

/// Run the command described by `cli` and print its result.
///
/// Returns the exit code procrun should terminate with.
pub async fn run_command(cli: Cli) -> Result<i32> {
    let runner = build_runner(&cli)?;

    let scope = match cli.timeout {
        Some(timeout) => CancelScope::with_timeout(timeout),
        None => CancelScope::new(),
    };
    cancel_on_ctrl_c(&scope);

    debug!(command = ?cli.command, timeout = ?cli.timeout, "starting command");
    let started = Instant::now();
    let result = runner.run(&scope).await;
    let report = RunReport::new(&result, started.elapsed());

    match cli.output_format {
        OutputFormat::Text => {
            report::write_text(&result, &mut io::stdout().lock(), &mut io::stderr().lock())?
        }
        OutputFormat::Json => report::write_json(&report, &mut io::stdout().lock())?,
    }

    Ok(report.process_exit_code())
}
