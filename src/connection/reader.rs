//! Connection reader task.
//!
//! Drives a [`FramedRead`] over the receive half with [`EnvelopeCodec`] and
//! hands every decoded envelope to the waiter registry. Messages nobody is
//! waiting for are dropped.
//!
//! Malformed chunks are logged, broadcast to error subscribers as
//! [`AppError::Protocol`], and skipped: they do **not** stop the reader. EOF,
//! an I/O error, or cancellation closes the registry, which fails any waiter
//! still pending.

use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio::sync::broadcast;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::connection::waiters::{lock, SharedRegistry};
use crate::wire::codec::{EnvelopeCodec, Frame};
use crate::AppError;

/// Read frames until EOF, a transport error, or cancellation.
pub(crate) async fn run_reader<R>(
    peer: String,
    reader: R,
    registry: SharedRegistry,
    errors: broadcast::Sender<AppError>,
    cancel: CancellationToken,
) where
    R: AsyncRead + Unpin + Send,
{
    let mut framed = FramedRead::new(reader, EnvelopeCodec::new());

    let reason = loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!(peer, "reader: cancellation received, stopping");
                break "closed locally".to_owned();
            }

            item = framed.next() => match item {
                None => {
                    debug!(peer, "reader: EOF detected");
                    break "stream closed".to_owned();
                }

                Some(Err(err)) => {
                    warn!(peer, error = %err, "reader: transport error, stopping");
                    let _ = errors.send(err.clone());
                    break format!("stream error: {err}");
                }

                Some(Ok(Frame::Malformed(reason))) => {
                    warn!(peer, error = %reason, "reader: undecodable chunk, skipping");
                    let _ = errors.send(AppError::Protocol(reason));
                }

                Some(Ok(Frame::Envelope(envelope))) => {
                    let event = envelope.event.clone();
                    if lock(&registry).resolve(envelope) {
                        debug!(peer, event, "reader: reply delivered");
                    } else {
                        debug!(peer, event, "reader: no waiter for event, message dropped");
                    }
                }
            }
        }
    };

    let failed = lock(&registry).close(&reason);
    debug!(peer, reason, failed, "reader: connection closed");
}
