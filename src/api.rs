//! Named operations offered by netcore servers.

use crate::client::Client;
use crate::Result;

/// Tag of the echo operation.
pub const ECHO_EVENT: &str = "echo";
/// Tag of the process-id query.
pub const PID_EVENT: &str = "pid";

impl Client {
    /// Ask the server to send `message` back.
    ///
    /// # Errors
    ///
    /// As [`Client::request`]; `AppError::Protocol` if the reply is not a
    /// string.
    pub async fn echo(&self, message: &str) -> Result<String> {
        self.call(ECHO_EVENT, message).await
    }

    /// Ask the server for its process id.
    ///
    /// # Errors
    ///
    /// As [`Client::request`]; `AppError::Protocol` if the reply is not an
    /// integer process id.
    pub async fn pid(&self) -> Result<i32> {
        self.call(PID_EVENT, "").await
    }
}
