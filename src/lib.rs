#![forbid(unsafe_code)]

//! Client for netcore servers.
//!
//! Talks to a long-lived process over a local domain socket by exchanging
//! `{"event": ..., "data": ...}` JSON envelopes. Replies are matched to
//! callers by event tag.

pub mod api;
pub mod client;
pub mod config;
pub mod connection;
pub mod errors;
pub mod paths;
pub mod wire;

pub use client::Client;
pub use config::ClientConfig;
pub use connection::Connection;
pub use errors::{AppError, Result};
