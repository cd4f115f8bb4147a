//! Effects produced by state transitions

use super::state::StreamId;
use crate::session::{AssistantTurn, Query, Turn};

/// How a stream ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed,
    Failed { reason: String },
    Cancelled,
}

/// Effects to be executed after a state transition, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Open a transport stream for `query`.
    ///
    /// The request history is captured when this runs, so it must precede the
    /// `AppendTurn` for the same query.
    StartStream { stream_id: StreamId, query: Query },

    /// Stop the transport stream; anything it still sends is stale
    AbortStream { stream_id: StreamId },

    /// Commit a turn to the session store
    AppendTurn(Turn),

    /// Publish the controller's live turn to readers
    PublishLive,

    /// Tell subscribers a stream is over
    NotifyStreamEnded {
        stream_id: StreamId,
        outcome: StreamOutcome,
    },
}

impl Effect {
    pub fn append_user(query: Query) -> Self {
        Effect::AppendTurn(Turn::user(query))
    }

    pub fn append_assistant(turn: AssistantTurn) -> Self {
        Effect::AppendTurn(Turn::Assistant(turn))
    }

    pub fn stream_ended(stream_id: StreamId, outcome: StreamOutcome) -> Self {
        Effect::NotifyStreamEnded { stream_id, outcome }
    }
}
