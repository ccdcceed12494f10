//! Pending waiter registry.
//!
//! Maps each event tag to a FIFO queue of one-shot senders. The registry also
//! owns the connection state so that registering a waiter, resolving it, and
//! closing the connection are serialized under a single lock: a waiter can
//! never be registered after the close that would have failed it.
//!
//! The lock is a `std::sync::Mutex` because [`Waiter`] removes its own slot in
//! `Drop`, which cannot await. Critical sections never await.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

use crate::wire::envelope::Envelope;
use crate::{AppError, Result};

/// Lifecycle of a [`Connection`](super::Connection).
///
/// `Unconnected → Connecting → Open → Closed`. Only `Open` accepts sends and
/// registrations; `Closed` is terminal.
///
/// [`Connection::open`](super::Connection::open) returns only once the
/// socket is connected, so a `Connection` is observed in `Open` or `Closed`
/// alone. `Unconnected` is the registry's state before the reader starts and
/// `Connecting` is what `open` logs while it waits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport yet.
    #[default]
    Unconnected,
    /// Transport is being established.
    Connecting,
    /// Reader task running; requests allowed.
    Open,
    /// Transport closed or shut down locally.
    Closed,
}

/// One registered waiter.
#[derive(Debug)]
struct Slot {
    id: u64,
    tx: oneshot::Sender<Result<Value>>,
}

/// Connection state plus the tag → waiter queue map.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    state: ConnectionState,
    next_id: u64,
    waiters: HashMap<String, VecDeque<Slot>>,
}

pub(crate) type SharedRegistry = Arc<Mutex<Registry>>;

/// Lock the registry, recovering the data if a holder panicked.
pub(crate) fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Registry {
    pub(crate) fn state(&self) -> ConnectionState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: ConnectionState) {
        if self.state != ConnectionState::Closed {
            self.state = state;
        }
    }

    /// Number of waiters still pending across all tags.
    pub(crate) fn pending(&self) -> usize {
        self.waiters.values().map(VecDeque::len).sum()
    }

    fn register(&mut self, event: &str) -> Result<(u64, oneshot::Receiver<Result<Value>>)> {
        if self.state != ConnectionState::Open {
            return Err(AppError::NotConnected(format!(
                "cannot await '{event}' in state {:?}",
                self.state
            )));
        }

        let id = self.next_id;
        self.next_id += 1;
        let (tx, rx) = oneshot::channel();
        self.waiters
            .entry(event.to_owned())
            .or_default()
            .push_back(Slot { id, tx });
        Ok((id, rx))
    }

    /// Hand `envelope.data` to the oldest waiter for its tag.
    ///
    /// Returns `false` when nobody was waiting; the message is dropped.
    pub(crate) fn resolve(&mut self, envelope: Envelope) -> bool {
        let Entry::Occupied(mut queue) = self.waiters.entry(envelope.event) else {
            return false;
        };

        let mut data = Some(envelope.data);
        while let Some(value) = data.take() {
            let Some(slot) = queue.get_mut().pop_front() else {
                data = Some(value);
                break;
            };
            // Receiver vanished between drop and cleanup; try the next one.
            if let Err(returned) = slot.tx.send(Ok(value)) {
                data = returned.ok();
            }
        }

        if queue.get().is_empty() {
            queue.remove();
        }
        data.is_none()
    }

    fn cancel(&mut self, event: &str, id: u64) {
        if let Some(queue) = self.waiters.get_mut(event) {
            queue.retain(|slot| slot.id != id);
            if queue.is_empty() {
                self.waiters.remove(event);
            }
        }
    }

    /// Move to `Closed` and fail every pending waiter. Returns how many were
    /// failed; `0` if the registry was already closed.
    pub(crate) fn close(&mut self, reason: &str) -> usize {
        self.state = ConnectionState::Closed;
        let mut failed = 0;
        for (event, queue) in self.waiters.drain() {
            for slot in queue {
                let _ = slot.tx.send(Err(AppError::NotConnected(format!(
                    "connection closed before '{event}' reply: {reason}"
                ))));
                failed += 1;
            }
        }
        failed
    }
}

/// Single-use handle for the next message carrying one event tag.
///
/// Obtained from [`Connection::register`](super::Connection::register).
/// Dropping an unresolved `Waiter` removes it from the registry, so a
/// timed-out or abandoned request does not keep a slot alive.
#[derive(Debug)]
pub struct Waiter {
    event: String,
    id: u64,
    rx: oneshot::Receiver<Result<Value>>,
    registry: Weak<Mutex<Registry>>,
    settled: bool,
}

impl Waiter {
    pub(crate) fn register(registry: &SharedRegistry, event: &str) -> Result<Self> {
        let (id, rx) = lock(registry).register(event)?;
        debug!(event, id, "waiter registered");
        Ok(Self {
            event: event.to_owned(),
            id,
            rx,
            registry: Arc::downgrade(registry),
            settled: false,
        })
    }

    /// Tag this waiter is registered for.
    #[must_use]
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Suspend until a message with this tag arrives and return its `data`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotConnected` if the connection closes first.
    pub async fn recv(mut self) -> Result<Value> {
        let outcome = (&mut self.rx).await;
        self.settled = true;
        outcome.unwrap_or_else(|_| {
            Err(AppError::NotConnected(format!(
                "connection dropped before '{}' reply",
                self.event
            )))
        })
    }

    /// [`recv`](Self::recv) bounded by `deadline`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Timeout` when the deadline elapses; the waiter is
    /// removed from the registry. Otherwise as [`recv`](Self::recv).
    pub async fn recv_timeout(self, deadline: Duration) -> Result<Value> {
        let event = self.event.clone();
        tokio::time::timeout(deadline, self.recv())
            .await
            .map_err(|_| {
                AppError::Timeout(format!(
                    "no '{event}' reply within {} ms",
                    deadline.as_millis()
                ))
            })?
    }
}

impl Drop for Waiter {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).cancel(&self.event, self.id);
            debug!(event = %self.event, id = self.id, "waiter cancelled");
        }
    }
}
