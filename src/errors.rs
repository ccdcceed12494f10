//! Error types shared across the client.

use std::fmt::{Display, Formatter};
use std::io;

/// Shared client result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Client error enumeration covering all connection and request failure modes.
///
/// `Clone` so that a single transport failure can be fanned out to every
/// error subscriber of a [`Connection`](crate::connection::Connection).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Socket path unreachable, missing, or the remote end refused.
    Connect(String),
    /// Inbound payload is not well-formed JSON or not a `{event, data}` envelope.
    Protocol(String),
    /// Operation attempted outside the `Open` state, or the connection closed
    /// before a reply arrived.
    NotConnected(String),
    /// A caller-imposed deadline elapsed.
    Timeout(String),
    /// The server answered with an `error` envelope.
    Remote(String),
    /// Configuration parsing or validation failure.
    Config(String),
    /// Transport I/O failure not covered by the other variants.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connect(msg) => write!(f, "connect: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol: {msg}"),
            Self::NotConnected(msg) => write!(f, "not connected: {msg}"),
            Self::Timeout(msg) => write!(f, "timeout: {msg}"),
            Self::Remote(msg) => write!(f, "remote: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof => Self::NotConnected(err.to_string()),
            _ => Self::Io(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}
