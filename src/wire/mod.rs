//! Wire format for netcore sockets.
//!
//! Both directions exchange the same unit, a JSON object of shape
//! `{"event": <string>, "data": <any>}`. There is no length prefix and no
//! request identifier; documents follow each other on the stream.
//!
//! - `envelope`: the [`Envelope`](envelope::Envelope) message type.
//! - `codec`: [`Decoder`](tokio_util::codec::Decoder) that splits the inbound
//!   byte stream into envelopes and reports malformed chunks without failing.

pub mod codec;
pub mod envelope;
