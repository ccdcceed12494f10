//! Envelope codec for netcore socket streams.
//!
//! Peers write one compact JSON document per message with no delimiter, so
//! framing is done by the JSON parser itself: [`EnvelopeCodec`] pulls the next
//! complete document off the front of the buffer and leaves partial documents
//! buffered until more bytes arrive. Whitespace (including newlines) between
//! documents is tolerated.
//!
//! Malformed input never fails the stream. It is reported as
//! [`Frame::Malformed`] so the reader can notify subscribers and carry on.
//! Decoding then restarts at the next `{`, which also recovers a document
//! that follows a truncated one in the same buffer.

use bytes::{Buf, BytesMut};
use serde_json::Value;
use tokio_util::codec::Decoder;

use crate::wire::envelope::Envelope;
use crate::{AppError, Result};

/// Largest partial document the codec will buffer: 1 MiB.
pub const MAX_FRAME_BYTES: usize = 1_048_576;

/// One decoded unit of the inbound stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// A well-formed `{event, data}` message.
    Envelope(Envelope),
    /// A chunk that could not be decoded; carries the reason.
    Malformed(String),
}

/// Streaming decoder turning bytes into [`Frame`]s.
///
/// # Examples
///
/// ```rust,ignore
/// use tokio_util::codec::FramedRead;
/// use netcore_client::wire::codec::EnvelopeCodec;
///
/// let frames = FramedRead::new(recv_half, EnvelopeCodec::new());
/// ```
#[derive(Debug)]
pub struct EnvelopeCodec {
    max_frame_bytes: usize,
}

impl EnvelopeCodec {
    /// Create a codec with the default [`MAX_FRAME_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_frame_bytes(MAX_FRAME_BYTES)
    }

    /// Create a codec with a custom partial-document limit.
    #[must_use]
    pub fn with_max_frame_bytes(max_frame_bytes: usize) -> Self {
        Self { max_frame_bytes }
    }
}

impl Default for EnvelopeCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for EnvelopeCodec {
    type Item = Frame;
    type Error = AppError;

    /// Decode the next JSON document from the front of `src`.
    ///
    /// Returns `Ok(None)` while only whitespace or an incomplete document is
    /// buffered.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if src.is_empty() {
            return Ok(None);
        }

        let (consumed, next) = {
            let mut documents = serde_json::Deserializer::from_slice(src).into_iter::<Value>();
            let next = documents.next();
            (documents.byte_offset(), next)
        };

        match next {
            None => {
                // Only whitespace left.
                src.clear();
                Ok(None)
            }
            Some(Ok(value)) => {
                src.advance(consumed);
                Ok(Some(match Envelope::from_value(value) {
                    Ok(envelope) => Frame::Envelope(envelope),
                    Err(err) => Frame::Malformed(err.to_string()),
                }))
            }
            Some(Err(err)) if err.is_eof() => {
                if src.len() > self.max_frame_bytes {
                    src.clear();
                    return Ok(Some(Frame::Malformed(format!(
                        "frame too long: exceeded {} bytes",
                        self.max_frame_bytes
                    ))));
                }
                Ok(None)
            }
            Some(Err(err)) => {
                // A run of broken fragments is reported once.
                skip_broken_document(src);
                while syntax_error_at_front(src) {
                    skip_broken_document(src);
                }
                Ok(Some(Frame::Malformed(format!("malformed json: {err}"))))
            }
        }
    }

    /// Decode at end of stream; a trailing partial document is reported as
    /// malformed instead of failing the stream.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => {
                let len = src.len();
                src.clear();
                Ok(Some(Frame::Malformed(format!(
                    "truncated message: {len} bytes at end of stream"
                ))))
            }
        }
    }
}

/// Whether the document at the front of `src` is broken, as opposed to
/// valid, merely incomplete, or absent.
fn syntax_error_at_front(src: &[u8]) -> bool {
    matches!(
        serde_json::Deserializer::from_slice(src).into_iter::<Value>().next(),
        Some(Err(err)) if !err.is_eof()
    )
}

/// Resynchronize on the next `{` after the start of the broken document.
///
/// A document truncated by the sender is followed directly by the next one,
/// so the restart point may sit before the byte the parser choked on.
/// Without another `{` the whole buffer is dropped.
fn skip_broken_document(src: &mut BytesMut) {
    let start = src
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(src.len());
    match src
        .iter()
        .skip(start + 1)
        .position(|&b| b == b'{')
    {
        Some(pos) => src.advance(start + 1 + pos),
        None => src.clear(),
    }
}
