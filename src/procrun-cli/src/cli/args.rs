//! CLI argument structures and parsing.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing::level_filters::LevelFilter;

use crate::duration::parse_duration;

/// Verbosity of procrun's own diagnostics on stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    Error,
    /// Kills and sink failures (default)
    #[default]
    #[value(alias = "warning")]
    Warn,
    Info,
    /// Spawn, reap and stream close events
    Debug,
    Trace,
}

impl LogLevel {
    /// Parse a level name, ignoring case. Accepts the same names as `--log-level`.
    pub fn parse(name: &str) -> Option<Self> {
        <Self as ValueEnum>::from_str(name.trim(), true).ok()
    }

    pub fn level_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// How the result of a run is printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Replay the captured streams to the terminal
    #[default]
    Text,
    /// Print a single JSON report
    Json,
}

/// Run a command with captured output and an enforced deadline.
///
/// The command's stdout and stderr are captured in full and replayed once
/// it finishes. If the deadline passes first the command is killed and the
/// output it produced so far is still shown.
#[derive(Debug, Parser)]
#[command(name = "procrun", version)]
#[command(override_usage = "procrun [OPTIONS] -- <PROGRAM> [ARGS]...")]
pub struct Cli {
    /// Kill the command after this long (e.g. 500ms, 10s, 2m, 1h; bare numbers are seconds).
    /// Defaults to the configured ceiling (5 minutes).
    #[arg(short = 't', long = "timeout", value_name = "DURATION", value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Working directory for the command.
    #[arg(short = 'C', long = "cwd", value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Also write the command's stdout to this file (repeatable).
    #[arg(long = "tee-stdout", value_name = "FILE")]
    pub tee_stdout: Vec<PathBuf>,

    /// Also write the command's stderr to this file (repeatable).
    #[arg(long = "tee-stderr", value_name = "FILE")]
    pub tee_stderr: Vec<PathBuf>,

    /// Runner configuration file (TOML).
    #[arg(short = 'c', long = "config", value_name = "FILE", env = "PROCRUN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format.
    #[arg(short = 'o', long = "output-format", value_enum, default_value = "text")]
    pub output_format: OutputFormat,

    /// Log level for procrun's own diagnostics (written to stderr).
    #[arg(short = 'l', long = "log-level", value_enum, default_value = "warn")]
    pub log_level: LogLevel,

    /// Enable verbose output (same as --log-level debug)
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// The program to run followed by its arguments.
    #[arg(
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true,
        value_name = "PROGRAM"
    )]
    pub command: Vec<String>,
}

impl Cli {
    /// Effective log level: `--verbose`, then `PROCRUN_LOG_LEVEL`, then `--log-level`.
    pub fn effective_log_level(&self) -> LogLevel {
        if self.verbose {
            return LogLevel::Debug;
        }
        std::env::var("PROCRUN_LOG_LEVEL")
            .ok()
            .and_then(|level| LogLevel::parse(&level))
            .unwrap_or(self.log_level)
    }

    /// Program and arguments, split.
    pub fn program(&self) -> (&str, &[String]) {
        match self.command.split_first() {
            Some((program, args)) => (program.as_str(), args),
            None => ("", &[]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_default() {
        assert_eq!(LogLevel::default(), LogLevel::Warn);
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!(LogLevel::parse("warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse(" TrAcE "), Some(LogLevel::Trace));
        assert_eq!(LogLevel::parse("loud"), None);
    }

    #[test]
    fn test_log_level_maps_to_filter() {
        assert_eq!(LogLevel::default().level_filter(), LevelFilter::WARN);
        assert_eq!(LogLevel::Debug.level_filter(), LevelFilter::DEBUG);
    }

    #[test]
    fn test_log_level_flag_accepts_alias() {
        let cli = Cli::try_parse_from(["procrun", "-l", "warning", "true"]).unwrap();
        assert_eq!(cli.log_level, LogLevel::Warn);
    }

    #[test]
    fn test_parse_minimal_command() {
        let cli = Cli::try_parse_from(["procrun", "echo", "hello"]).unwrap();

        assert_eq!(cli.program(), ("echo", &["hello".to_string()][..]));
        assert!(cli.timeout.is_none());
        assert_eq!(cli.output_format, OutputFormat::Text);
    }

    #[test]
    fn test_parse_all_options() {
        let cli = Cli::try_parse_from([
            "procrun",
            "--timeout",
            "250ms",
            "-C",
            "/tmp",
            "--tee-stdout",
            "out.log",
            "--tee-stdout",
            "out2.log",
            "--tee-stderr",
            "err.log",
            "-o",
            "json",
            "--",
            "ls",
            "-la",
        ])
        .unwrap();

        assert_eq!(cli.timeout, Some(Duration::from_millis(250)));
        assert_eq!(cli.cwd, Some(PathBuf::from("/tmp")));
        assert_eq!(cli.tee_stdout.len(), 2);
        assert_eq!(cli.tee_stderr, vec![PathBuf::from("err.log")]);
        assert_eq!(cli.output_format, OutputFormat::Json);
        assert_eq!(cli.command, vec!["ls".to_string(), "-la".to_string()]);
    }

    #[test]
    fn test_command_arguments_may_look_like_flags() {
        let cli = Cli::try_parse_from(["procrun", "-t", "5s", "grep", "-v", "x"]).unwrap();

        assert_eq!(cli.timeout, Some(Duration::from_secs(5)));
        assert_eq!(cli.command, vec!["grep", "-v", "x"]);
        assert!(!cli.verbose);
    }

    #[test]
    fn test_missing_command_is_rejected() {
        assert!(Cli::try_parse_from(["procrun", "--timeout", "1s"]).is_err());
    }

    #[test]
    fn test_invalid_timeout_is_rejected() {
        assert!(Cli::try_parse_from(["procrun", "--timeout", "soon", "true"]).is_err());
    }

    #[test]
    fn test_verbose_forces_debug() {
        let cli = Cli::try_parse_from(["procrun", "-v", "true"]).unwrap();
        assert_eq!(cli.effective_log_level(), LogLevel::Debug);
    }
}
