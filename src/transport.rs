//! Answer transport
//!
//! The runtime only depends on the [`crate::runtime::Transport`] trait; this
//! module provides the HTTP implementation for the answer backend and its wire
//! format.

mod error;
mod http;
mod wire;

pub use error::{TransportError, TransportErrorKind};
pub use http::HttpTransport;
pub use wire::{decode_event, ChatRequest, HistoryMessage, SseDecoder, SseFrame};
