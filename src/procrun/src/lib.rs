//! Run a child process with captured output and an enforced deadline.
//!
//! This crate launches an external program, captures its stdout and stderr
//! in full, and kills it once a deadline passes. It provides:
//!
//! - A builder-style [`Runner`] (program, arguments, working directory)
//! - Extra output sinks that receive a copy of every byte the child writes
//! - [`CancelScope`], a cancellation token that may carry a deadline
//! - A default ceiling of 300 seconds when the caller gives no deadline
//! - Partial output on timeout or cancellation, carried by [`RunError`]
//!
//! # Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use procrun::{CancelScope, CaptureBuffer, Runner};
//!
//! let tee = CaptureBuffer::new();
//! let scope = CancelScope::with_timeout(Duration::from_secs(5));
//!
//! let output = Runner::new("cargo", ["build"])
//!     .cd("./crates/../project")
//!     .add_stdout(tee.clone())
//!     .run(&scope)
//!     .await?;
//!
//! println!("{}", output.stdout_lossy());
//! ```

pub mod config;
pub mod error;
pub mod path;
pub mod runner;
pub mod scope;
pub mod sink;


pub use config::{ConfigError, RunnerConfig};
pub use error::{Result, RunError};
pub use path::clean_path;
pub use runner::{Output, Runner};
pub use scope::{CancelReason, CancelScope};
pub use sink::{CaptureBuffer, FanOut, Sink, Stream};

use std::time::Duration;

/// Ceiling imposed on a run whose scope carries no deadline (5 minutes).
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(300);

/// How long a killed child's output pumps may keep draining before they are
/// abandoned.
///
/// A grandchild that inherited the pipes can keep them open after the
/// direct child is gone.
pub const DEFAULT_DRAIN_GRACE: Duration = Duration::from_millis(250);
