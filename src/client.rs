//! Request/response client over [`Connection`].
//!
//! [`Client::request`] hides the tag matching: it registers for the reply tag
//! before writing the request, then waits for the reply, optionally bounded by
//! the configured request deadline. No request is ever retried.
//!
//! While a request for any tag other than `error` is in flight the client also
//! listens for an `error` envelope, which netcore servers send for events they
//! cannot route; that reply fails the request with [`AppError::Remote`].

use std::sync::Arc;

use futures_util::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info_span, Instrument};

use crate::config::{ClientConfig, ConnectionMode};
use crate::connection::{Connection, ConnectionState, Waiter};
use crate::wire::envelope::ERROR_EVENT;
use crate::{AppError, Result};

/// Client for one server socket.
pub struct Client {
    config: ClientConfig,
    /// Reused connection in [`ConnectionMode::Shared`].
    shared: Mutex<Option<Arc<Connection>>>,
}

impl Client {
    /// Create a client; no connection is opened until the first request.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            shared: Mutex::new(None),
        }
    }

    /// Client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send `{event, data: payload}` and return the `data` of the reply
    /// carrying the same tag.
    ///
    /// # Errors
    ///
    /// - `AppError::Connect` if the socket cannot be reached.
    /// - `AppError::NotConnected` if the connection closes before the reply.
    /// - `AppError::Timeout` if the configured request deadline elapses.
    /// - `AppError::Remote` if the server answers with an `error` envelope.
    /// - `AppError::Protocol` if `payload` cannot be serialized.
    pub async fn request<T>(&self, event: &str, payload: &T) -> Result<Value>
    where
        T: Serialize + ?Sized,
    {
        let span = info_span!("request", event);
        async move {
            let connection = self.connection().await?;

            let reply = connection.register(event)?;
            let remote_error = if event == ERROR_EVENT {
                None
            } else {
                Some(connection.register(ERROR_EVENT)?)
            };
            connection.send(event, payload).await?;

            let outcome = await_reply(reply, remote_error);
            let result = match self.config.timeouts.request() {
                Some(deadline) => tokio::time::timeout(deadline, outcome)
                    .await
                    .map_err(|_| {
                        AppError::Timeout(format!(
                            "no '{event}' reply within {} ms",
                            deadline.as_millis()
                        ))
                    })?,
                None => outcome.await,
            };

            debug!(ok = result.is_ok(), "request finished");
            result
        }
        .instrument(span)
        .await
    }

    /// [`request`](Self::request) with the reply deserialized into `R`.
    ///
    /// # Errors
    ///
    /// As [`request`](Self::request); additionally `AppError::Protocol` if the
    /// reply does not have the expected shape.
    pub async fn call<R, T>(&self, event: &str, payload: &T) -> Result<R>
    where
        R: DeserializeOwned,
        T: Serialize + ?Sized,
    {
        let value = self.request(event, payload).await?;
        serde_json::from_value(value)
            .map_err(|err| AppError::Protocol(format!("unexpected '{event}' reply: {err}")))
    }

    async fn connection(&self) -> Result<Arc<Connection>> {
        match self.config.mode {
            ConnectionMode::PerRequest => Ok(Arc::new(self.connect().await?)),
            ConnectionMode::Shared => {
                let mut slot = self.shared.lock().await;
                if let Some(connection) = slot.as_ref() {
                    if connection.state() == ConnectionState::Open {
                        return Ok(Arc::clone(connection));
                    }
                }
                let connection = Arc::new(self.connect().await?);
                *slot = Some(Arc::clone(&connection));
                Ok(connection)
            }
        }
    }

    async fn connect(&self) -> Result<Connection> {
        let path = &self.config.socket_path;
        match self.config.timeouts.connect() {
            Some(deadline) => Connection::open_with_timeout(path, deadline).await,
            None => Connection::open(path).await,
        }
    }
}

/// Wait for `reply`, failing early if the server sends an `error` envelope.
async fn await_reply(reply: Waiter, remote_error: Option<Waiter>) -> Result<Value> {
    let Some(remote_error) = remote_error else {
        return reply.recv().await;
    };

    let reply = reply.recv();
    let remote_error = remote_error.recv();
    tokio::pin!(reply, remote_error);

    tokio::select! {
        biased;

        // The server may send `error` and hang up before we get to run, in
        // which case the reply waiter only reports the closed connection.
        result = &mut reply => match (result, (&mut remote_error).now_or_never()) {
            (Err(_), Some(Ok(data))) => Err(AppError::Remote(remote_message(&data))),
            (result, _) => result,
        },
        remote = &mut remote_error => match remote {
            Ok(data) => Err(AppError::Remote(remote_message(&data))),
            // Connection closed: the reply waiter reports it.
            Err(_) => reply.await,
        },
    }
}

fn remote_message(data: &Value) -> String {
    match data {
        Value::String(message) => message.clone(),
        other => other.to_string(),
    }
}
