//! procrun - Main entry point.
//!
//! Runs a single command with captured output and an enforced deadline,
//! then exits with a code describing how the command ended.

use std::process::ExitCode;

use clap::Parser;

use procrun_cli::cli::{Cli, run_command};
use procrun_cli::exit_codes;
use procrun_cli::logging::init_logging;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.effective_log_level());

    let code = match run_command(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("procrun: {err:#}");
            exit_codes::INTERNAL_ERROR
        }
    };

    // Exit statuses are truncated to a byte on Unix.
    ExitCode::from((code & 0xff) as u8)
}
