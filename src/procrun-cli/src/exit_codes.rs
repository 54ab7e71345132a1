//! Process exit codes for the `procrun` binary.
//!
//! Codes above 123 follow the conventions of coreutils `timeout(1)` and
//! POSIX shells so wrapper scripts can tell failures apart.

/// The command ran and exited successfully.
pub const SUCCESS: i32 = 0;

/// The command was killed by a signal or reported no exit code.
pub const GENERAL_FAILURE: i32 = 1;

/// The deadline passed and the command was killed.
pub const TIMED_OUT: i32 = 124;

/// procrun itself failed (bad config, unwritable tee file).
pub const INTERNAL_ERROR: i32 = 125;

/// The command ran but its output could not be collected or waited on.
pub const OUTPUT_FAILURE: i32 = 126;

/// The command could not be launched.
pub const LAUNCH_FAILURE: i32 = 127;

/// The run was interrupted with Ctrl+C.
pub const CANCELLED: i32 = 130;
