//! The `{event, data}` message envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{AppError, Result};

/// Event tag used by netcore servers to report a request they could not route.
pub const ERROR_EVENT: &str = "error";

/// One message on the wire, identical in both directions.
///
/// A missing `data` field decodes as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Tag naming the logical operation.
    pub event: String,
    /// Request argument or response value.
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    /// Build an envelope from a tag and an already-converted payload.
    #[must_use]
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Interpret a decoded JSON document as an envelope.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Protocol` if the document is not an object with a
    /// string `event` field.
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|err| AppError::Protocol(format!("not an envelope: {err}")))
    }

    /// Serialize to one compact JSON document without a trailing newline.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Protocol` if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|err| AppError::Protocol(format!("failed to serialize envelope: {err}")))
    }
}
