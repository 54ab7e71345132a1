//! procrun CLI library module.
//!
//! - `cli/` - Argument parsing and command dispatch
//! - `duration` - `--timeout` parsing
//! - `report` - Text and JSON rendering of a finished run
//! - `logging` - Tracing subscriber setup
//! - `exit_codes` - Process exit codes

pub mod cli;
pub mod duration;
pub mod exit_codes;
pub mod logging;
pub mod report;
