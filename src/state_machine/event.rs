//! Events that drive the streaming controller

use super::state::StreamId;
use crate::session::{Query, SearchResult};

/// Incremental update produced by a transport for one stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamUpdate {
    SourcesReceived(Vec<SearchResult>),
    ContentDelta(String),
    RelatedQuestionsReceived(Vec<String>),
    StreamComplete,
    StreamError(String),
}

impl StreamUpdate {
    /// Whether this update ends the stream
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamUpdate::StreamComplete | StreamUpdate::StreamError(_)
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StreamUpdate::SourcesReceived(_) => "sources",
            StreamUpdate::ContentDelta(_) => "content_delta",
            StreamUpdate::RelatedQuestionsReceived(_) => "related_questions",
            StreamUpdate::StreamComplete => "complete",
            StreamUpdate::StreamError(_) => "error",
        }
    }
}

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // User events
    Submit {
        stream_id: StreamId,
        query: Query,
    },
    Cancel,

    // Transport events
    Stream {
        stream_id: StreamId,
        update: StreamUpdate,
    },
}
