//! Socket connection with tag-based reply correlation.
//!
//! A [`Connection`] owns one local socket. A background reader task decodes
//! the inbound stream into `{event, data}` envelopes and resolves, per tag,
//! the oldest [`Waiter`] registered for it. Writers are serialized through an
//! async mutex on the send half.
//!
//! Correlation is by event tag only. Callers must register before sending the
//! request that triggers the reply; [`Connection::request`] does both in the
//! right order.
//!
//! Submodules:
//! - `reader`: the inbound decode/dispatch task.
//! - `waiters`: the tag → waiter registry and the [`Waiter`] handle.

mod reader;
pub mod waiters;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use interprocess::local_socket::tokio::Stream;
use interprocess::local_socket::traits::tokio::Stream as _;
use interprocess::local_socket::{GenericFilePath, ToFsName};
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::wire::envelope::Envelope;
use crate::{AppError, Result};

pub use waiters::{ConnectionState, Waiter};
use waiters::{lock, SharedRegistry};

/// Capacity of the error notification channel per connection.
const ERROR_CHANNEL_CAPACITY: usize = 16;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// One open socket plus its pending-reply registry.
///
/// Dropping the connection cancels the reader task and closes the socket.
pub struct Connection {
    peer: String,
    registry: SharedRegistry,
    writer: Mutex<BoxedWriter>,
    errors: broadcast::Sender<AppError>,
    cancel: CancellationToken,
}

impl Connection {
    /// Connect to the server socket at `path`.
    ///
    /// Blocks until the platform transport succeeds or fails; there is no
    /// deadline. Must be called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Connect` if the path is invalid, does not exist, or
    /// the server refuses the connection.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let peer = path.display().to_string();
        debug!(peer, state = ?ConnectionState::Connecting, "connecting");

        let name = path
            .to_fs_name::<GenericFilePath>()
            .map_err(|err| AppError::Connect(format!("invalid socket path '{peer}': {err}")))?;

        let stream = Stream::connect(name)
            .await
            .map_err(|err| AppError::Connect(format!("cannot connect to '{peer}': {err}")))?;

        info!(peer, "connected");
        let (recv_half, send_half) = stream.split();
        Ok(Self::spawn(peer, recv_half, send_half))
    }

    /// [`open`](Self::open) bounded by `deadline`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Timeout` if the deadline elapses first, otherwise as
    /// [`open`](Self::open).
    pub async fn open_with_timeout(path: impl AsRef<Path>, deadline: Duration) -> Result<Self> {
        let path = path.as_ref();
        tokio::time::timeout(deadline, Self::open(path))
            .await
            .map_err(|_| {
                AppError::Timeout(format!(
                    "connecting to '{}' took longer than {} ms",
                    path.display(),
                    deadline.as_millis()
                ))
            })?
    }

    /// Build a connection over an arbitrary byte transport.
    ///
    /// Used for in-memory pipes and for sockets opened elsewhere. Must be
    /// called within a tokio runtime.
    pub fn from_transport<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::spawn("transport".to_owned(), reader, writer)
    }

    fn spawn<R, W>(peer: String, recv_half: R, send_half: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let registry = SharedRegistry::default();
        lock(&registry).set_state(ConnectionState::Open);

        let (errors, _) = broadcast::channel(ERROR_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        let span = info_span!("connection_reader", peer = %peer);
        tokio::spawn(
            reader::run_reader(
                peer.clone(),
                recv_half,
                Arc::clone(&registry),
                errors.clone(),
                cancel.clone(),
            )
            .instrument(span),
        );

        Self {
            peer,
            registry,
            writer: Mutex::new(Box::new(send_half)),
            errors,
            cancel,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        lock(&self.registry).state()
    }

    /// Number of registered waiters that have not been resolved yet.
    #[must_use]
    pub fn pending_waiters(&self) -> usize {
        lock(&self.registry).pending()
    }

    /// Subscribe to protocol and transport error notifications.
    ///
    /// These are not tied to any request: a malformed chunk is reported here
    /// and the connection keeps reading.
    #[must_use]
    pub fn subscribe_errors(&self) -> broadcast::Receiver<AppError> {
        self.errors.subscribe()
    }

    /// Register a single-use waiter for the next message tagged `event`.
    ///
    /// Registration is immediate, so a reply that arrives before the caller
    /// starts awaiting the [`Waiter`] is not lost.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotConnected` unless the connection is `Open`.
    pub fn register(&self, event: &str) -> Result<Waiter> {
        Waiter::register(&self.registry, event)
    }

    /// Wait for the next message tagged `event` and return its `data`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotConnected` if the connection is not open or
    /// closes before a matching message arrives.
    pub async fn await_once(&self, event: &str) -> Result<Value> {
        self.register(event)?.recv().await
    }

    /// Serialize `{event, data}` and write it as one message.
    ///
    /// # Errors
    ///
    /// - `AppError::NotConnected` outside the `Open` state or when the peer
    ///   has gone away (the connection then moves to `Closed`).
    /// - `AppError::Protocol` if `data` cannot be serialized.
    /// - `AppError::Io` for other write failures.
    pub async fn send<T>(&self, event: &str, data: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let data = serde_json::to_value(data).map_err(|err| {
            AppError::Protocol(format!("failed to serialize '{event}' payload: {err}"))
        })?;
        let bytes = Envelope::new(event, data).to_bytes()?;

        let state = self.state();
        if state != ConnectionState::Open {
            return Err(AppError::NotConnected(format!(
                "cannot send '{event}' in state {state:?}"
            )));
        }

        let mut writer = self.writer.lock().await;
        let written = match writer.write_all(&bytes).await {
            Ok(()) => writer.flush().await,
            Err(err) => Err(err),
        };

        written.map_err(|err| {
            warn!(peer = %self.peer, event, error = %err, "write failed");
            let err = AppError::from(err);
            if matches!(err, AppError::NotConnected(_)) {
                lock(&self.registry).close("peer went away during write");
            }
            err
        })?;

        debug!(peer = %self.peer, event, bytes = bytes.len(), "envelope sent");
        Ok(())
    }

    /// Register for `event`, send the request, and wait for the reply.
    ///
    /// # Errors
    ///
    /// As [`send`](Self::send) and [`Waiter::recv`].
    pub async fn request<T>(&self, event: &str, data: &T) -> Result<Value>
    where
        T: Serialize + ?Sized,
    {
        let waiter = self.register(event)?;
        self.send(event, data).await?;
        waiter.recv().await
    }

    /// Stop the reader, fail pending waiters, and shut the socket down.
    pub async fn close(&self) {
        self.cancel.cancel();
        let failed = lock(&self.registry).close("closed locally");
        if let Err(err) = self.writer.lock().await.shutdown().await {
            debug!(peer = %self.peer, error = %err, "shutdown after close failed");
        }
        info!(peer = %self.peer, failed, "connection closed");
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.peer)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
