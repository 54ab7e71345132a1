//! Runner configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{DEFAULT_DRAIN_GRACE, DEFAULT_RUN_TIMEOUT};

/// Errors raised while loading a [`RunnerConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for this schema.
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Tunables for a [`Runner`](crate::Runner).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Ceiling in milliseconds for runs whose scope carries no deadline.
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,

    /// Milliseconds the output pumps of a killed child may keep draining.
    #[serde(default = "default_drain_grace_ms")]
    pub drain_grace_ms: u64,
}

fn default_timeout_ms() -> u64 {
    millis_ceil(DEFAULT_RUN_TIMEOUT)
}

fn default_drain_grace_ms() -> u64 {
    millis_ceil(DEFAULT_DRAIN_GRACE)
}

/// Whole milliseconds in `duration`, rounded up and saturating at `u64::MAX`.
fn millis_ceil(duration: Duration) -> u64 {
    let mut millis = duration.as_millis();
    if duration.subsec_nanos() % 1_000_000 != 0 {
        millis += 1;
    }
    u64::try_from(millis).unwrap_or(u64::MAX)
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
            drain_grace_ms: default_drain_grace_ms(),
        }
    }
}

impl RunnerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config from TOML. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Read and parse a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn drain_grace(&self) -> Duration {
        Duration::from_millis(self.drain_grace_ms)
    }

    /// Builder: set the ceiling for runs without a deadline.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout_ms = millis_ceil(timeout);
        self
    }

    /// Builder: set the post-kill drain grace period.
    pub fn with_drain_grace(mut self, grace: Duration) -> Self {
        self.drain_grace_ms = millis_ceil(grace);
        self
    }
}
