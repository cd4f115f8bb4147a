//! Streaming controller state types

use crate::session::AssistantTurn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Identifies one assistant stream.
///
/// Updates carry the id of the stream that produced them, so late chunks from
/// an aborted stream can be told apart from the live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(pub u64);

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream-{}", self.0)
    }
}

/// Controller state
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamState {
    /// No response in flight
    #[default]
    Idle,

    /// An assistant turn is being assembled from transport updates
    Streaming {
        stream_id: StreamId,
        turn: AssistantTurn,
    },
}

impl StreamState {
    /// The assistant turn being built, if any
    pub fn live_turn(&self) -> Option<&AssistantTurn> {
        match self {
            StreamState::Idle => None,
            StreamState::Streaming { turn, .. } => Some(turn),
        }
    }

    pub fn stream_id(&self) -> Option<StreamId> {
        match self {
            StreamState::Idle => None,
            StreamState::Streaming { stream_id, .. } => Some(*stream_id),
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, StreamState::Streaming { .. })
    }
}

/// What happens when a query is submitted while another is streaming
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmitPolicy {
    /// Abort the live stream, drop its partial answer, start the new one
    #[default]
    Restart,
    /// Refuse the new query until the live stream ends
    Reject,
}

/// What a failed stream leaves in the transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Commit whatever arrived, marked with the failure reason
    #[default]
    CommitPartial,
    /// Commit an answer holding only the failure reason
    Discard,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown policy {value:?} (expected one of: {expected})")]
pub struct ParsePolicyError {
    value: String,
    expected: &'static str,
}

impl FromStr for SubmitPolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "restart" => Ok(SubmitPolicy::Restart),
            "reject" => Ok(SubmitPolicy::Reject),
            _ => Err(ParsePolicyError {
                value: s.to_string(),
                expected: "restart, reject",
            }),
        }
    }
}

impl FromStr for ErrorPolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "commit_partial" | "commit-partial" => Ok(ErrorPolicy::CommitPartial),
            "discard" => Ok(ErrorPolicy::Discard),
            _ => Err(ParsePolicyError {
                value: s.to_string(),
                expected: "commit_partial, discard",
            }),
        }
    }
}

/// Immutable controller configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerContext {
    pub submit_policy: SubmitPolicy,
    pub error_policy: ErrorPolicy,
}

impl ControllerContext {
    pub fn new(submit_policy: SubmitPolicy, error_policy: ErrorPolicy) -> Self {
        Self {
            submit_policy,
            error_policy,
        }
    }
}
