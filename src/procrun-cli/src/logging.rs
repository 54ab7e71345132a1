//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

use crate::cli::LogLevel;

/// Build the filter for procrun's own diagnostics.
///
/// `RUST_LOG` takes precedence when set; otherwise dependencies log at
/// `warn` and the procrun crates at `level`.
pub fn build_filter(level: LogLevel) -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        return EnvFilter::from_default_env();
    }

    let level = level.level_filter();
    EnvFilter::new(format!("warn,procrun={level},procrun_cli={level}"))
}

/// Install a stderr logger. Stdout stays reserved for the command's output.
pub fn init_logging(level: LogLevel) {
    tracing_subscriber::fmt()
        .with_env_filter(build_filter(level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
