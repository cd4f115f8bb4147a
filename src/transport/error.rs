//! Transport error types

use thiserror::Error;

/// Longest backend error body kept in a message
const MAX_BODY_CHARS: usize = 200;

/// Transport error with classification
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
    /// HTTP status, when the backend answered with one
    pub status: Option<u16>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Network, message)
    }

    pub fn http(status: u16, body: &str) -> Self {
        let body: String = body.trim().chars().take(MAX_BODY_CHARS).collect();
        let message = if body.is_empty() {
            format!("backend returned HTTP {status}")
        } else {
            format!("backend returned HTTP {status}: {body}")
        };
        Self {
            kind: TransportErrorKind::Http,
            message,
            status: Some(status),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Decode, message)
    }

    pub fn truncated(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Truncated, message)
    }

    /// Whether asking again could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self.kind {
            TransportErrorKind::Network | TransportErrorKind::Truncated => true,
            TransportErrorKind::Http => self.status.is_some_and(|s| s == 429 || s >= 500),
            TransportErrorKind::Decode => false,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::decode(e.to_string())
        } else if let Some(status) = e.status() {
            Self::http(status.as_u16(), "")
        } else {
            Self::network(e.to_string())
        }
    }
}

/// Error classification for retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connection failures and timeouts
    Network,
    /// Non-success HTTP status
    Http,
    /// Malformed event payload
    Decode,
    /// Body ended before the stream-end event
    Truncated,
}
