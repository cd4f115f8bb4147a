//! Wire format of the answer backend
//!
//! Requests are JSON bodies; responses are server-sent events whose `data`
//! is a JSON envelope `{"event": <kind>, "data": {...}}`.

use super::error::TransportError;
use crate::session::{Query, Role, SearchResult, Transcript, Turn};
use crate::state_machine::StreamUpdate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of a chat request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub query: String,
    pub history: Vec<HistoryMessage>,
}

/// Prior turn as the backend sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryMessage {
    pub role: Role,
    pub content: String,
}

impl ChatRequest {
    /// Request for `query` with everything in `history` as context.
    ///
    /// Answers that failed before producing any text are left out.
    pub fn new(query: &Query, history: &Transcript) -> Self {
        let history = history
            .iter()
            .filter(|turn| match turn {
                Turn::User(_) => true,
                Turn::Assistant(answer) => !answer.content.is_empty(),
            })
            .map(|turn| HistoryMessage {
                role: turn.role(),
                content: turn.content().to_string(),
            })
            .collect();

        Self {
            query: query.as_str().to_string(),
            history,
        }
    }
}

// ============================================================================
// Event payloads
// ============================================================================

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct SearchResultsData {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct TextChunkData {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RelatedQueriesData {
    #[serde(default)]
    related_queries: Vec<String>,
}

/// Decode one event payload.
///
/// Returns `Ok(None)` for events that carry nothing for the answer, such as
/// the rephrased search query or kinds added by newer backends.
pub fn decode_event(payload: &str) -> Result<Option<StreamUpdate>, TransportError> {
    let envelope: Envelope = serde_json::from_str(payload)
        .map_err(|e| TransportError::decode(format!("invalid event envelope: {e}")))?;

    let update = match envelope.event.as_str() {
        "search-results" => {
            let data: SearchResultsData = payload_data(&envelope)?;
            StreamUpdate::SourcesReceived(data.results)
        }
        "text-chunk" => {
            let data: TextChunkData = payload_data(&envelope)?;
            StreamUpdate::ContentDelta(data.text.unwrap_or_default())
        }
        "related-queries" => {
            let data: RelatedQueriesData = payload_data(&envelope)?;
            StreamUpdate::RelatedQuestionsReceived(data.related_queries)
        }
        "stream-end" => StreamUpdate::StreamComplete,
        "search-query" => return Ok(None),
        other => {
            tracing::debug!(event = other, "Ignoring unknown stream event");
            return Ok(None);
        }
    };
    Ok(Some(update))
}

fn payload_data<T: serde::de::DeserializeOwned>(envelope: &Envelope) -> Result<T, TransportError> {
    T::deserialize(&envelope.data)
        .map_err(|e| TransportError::decode(format!("invalid {} payload: {e}", envelope.event)))
}

// ============================================================================
// Server-sent events framing
// ============================================================================

/// One dispatched server-sent event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental server-sent events decoder.
///
/// Bytes are buffered until a full line is available, so chunk boundaries
/// inside a line or inside a multi-byte character are harmless.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    /// Feed a chunk and return every frame it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(end) = self.buf.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=end).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(frame) = self.feed_line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush a frame left unterminated at end of input
    pub fn finish(&mut self) -> Option<SseFrame> {
        if !self.buf.is_empty() {
            let rest = std::mem::take(&mut self.buf);
            let line = String::from_utf8_lossy(&rest);
            let line = line.trim_end_matches('\r').to_string();
            if let Some(frame) = self.feed_line(&line) {
                return Some(frame);
            }
        }
        self.dispatch()
    }

    fn feed_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        // Comment lines carry keep-alive pings
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        if self.data.is_empty() {
            self.event = None;
            return None;
        }
        let frame = SseFrame {
            event: self.event.take(),
            data: self.data.join("\n"),
        };
        self.data.clear();
        Some(frame)
    }
}
