//! Client configuration parsing and validation.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

/// How a [`Client`](crate::client::Client) obtains connections.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionMode {
    /// Open a fresh connection for every request.
    ///
    /// netcore servers answer one request per accepted connection and then
    /// hang up, so this is the default.
    #[default]
    PerRequest,
    /// Keep one connection per client and reuse it while it stays open.
    Shared,
}

/// Deadlines in milliseconds; `0` means no deadline.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TimeoutConfig {
    /// Bound on establishing the socket connection.
    #[serde(default)]
    pub connect_ms: u64,
    /// Bound on waiting for the reply to a single request.
    #[serde(default)]
    pub request_ms: u64,
}

impl TimeoutConfig {
    /// Connect deadline, if any.
    #[must_use]
    pub fn connect(&self) -> Option<Duration> {
        non_zero_millis(self.connect_ms)
    }

    /// Request deadline, if any.
    #[must_use]
    pub fn request(&self) -> Option<Duration> {
        non_zero_millis(self.request_ms)
    }
}

fn non_zero_millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

/// Client configuration, usually parsed from a small TOML file.
///
/// ```toml
/// socket_path = "/tmp/netcore.sock"
/// mode = "per_request"
///
/// [timeouts]
/// connect_ms = 1000
/// request_ms = 5000
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ClientConfig {
    /// Filesystem path of the server's socket.
    pub socket_path: PathBuf,
    /// Connection reuse policy.
    #[serde(default)]
    pub mode: ConnectionMode,
    /// Optional deadlines.
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

impl ClientConfig {
    /// Configuration with defaults: per-request connections, no deadlines.
    #[must_use]
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            mode: ConnectionMode::default(),
            timeouts: TimeoutConfig::default(),
        }
    }

    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read, contains
    /// invalid TOML, or fails validation.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.socket_path.as_os_str().is_empty() {
            return Err(AppError::Config("socket_path must not be empty".into()));
        }
        Ok(())
    }
}
