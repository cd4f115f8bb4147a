//! Pure state transition function

use super::effect::{Effect, StreamOutcome};
use super::event::{Event, StreamUpdate};
use super::state::{ControllerContext, ErrorPolicy, StreamId, StreamState, SubmitPolicy};
use crate::session::{AssistantTurn, Query};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: StreamState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: StreamState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("An answer is still streaming (cancel it first)")]
    Busy,
    #[error("Update for {0} which is not the live stream")]
    StaleStream(StreamId),
}

/// Pure transition function.
///
/// Given the same inputs it always produces the same outputs; all I/O is
/// described by the returned effects.
pub fn transition(
    state: &StreamState,
    context: &ControllerContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // Submission
        // ============================================================

        // Idle + Submit -> Streaming
        (StreamState::Idle, Event::Submit { stream_id, query }) => Ok(start(stream_id, query)),

        // Streaming + Submit -> depends on policy
        (StreamState::Streaming { stream_id: live, .. }, Event::Submit { stream_id, query }) => {
            match context.submit_policy {
                SubmitPolicy::Reject => Err(TransitionError::Busy),
                SubmitPolicy::Restart => {
                    let aborted = [
                        Effect::AbortStream { stream_id: *live },
                        Effect::stream_ended(*live, StreamOutcome::Cancelled),
                    ];
                    let restarted = start(stream_id, query);
                    Ok(TransitionResult::new(restarted.new_state)
                        .with_effects(aborted)
                        .with_effects(restarted.effects))
                }
            }
        }

        // ============================================================
        // Cancellation
        // ============================================================

        // Streaming + Cancel -> Idle, partial answer dropped
        (StreamState::Streaming { stream_id, .. }, Event::Cancel) => {
            Ok(TransitionResult::new(StreamState::Idle)
                .with_effect(Effect::AbortStream {
                    stream_id: *stream_id,
                })
                .with_effect(Effect::PublishLive)
                .with_effect(Effect::stream_ended(*stream_id, StreamOutcome::Cancelled)))
        }

        // Idle + Cancel -> no-op
        (StreamState::Idle, Event::Cancel) => Ok(TransitionResult::new(StreamState::Idle)),

        // ============================================================
        // Transport updates
        // ============================================================
        (StreamState::Streaming { stream_id: live, turn }, Event::Stream { stream_id, update })
            if *live == stream_id =>
        {
            Ok(apply_update(stream_id, turn, context, update))
        }

        (StreamState::Streaming { .. } | StreamState::Idle, Event::Stream { stream_id, .. }) => {
            Err(TransitionError::StaleStream(stream_id))
        }
    }
}

fn start(stream_id: StreamId, query: Query) -> TransitionResult {
    TransitionResult::new(StreamState::Streaming {
        stream_id,
        turn: AssistantTurn::default(),
    })
    .with_effect(Effect::StartStream {
        stream_id,
        query: query.clone(),
    })
    .with_effect(Effect::append_user(query))
    .with_effect(Effect::PublishLive)
}

fn apply_update(
    stream_id: StreamId,
    turn: &AssistantTurn,
    context: &ControllerContext,
    update: StreamUpdate,
) -> TransitionResult {
    let streaming = |turn: AssistantTurn| StreamState::Streaming { stream_id, turn };

    match update {
        StreamUpdate::SourcesReceived(sources) => {
            let mut turn = turn.clone();
            turn.sources = sources;
            TransitionResult::new(streaming(turn)).with_effect(Effect::PublishLive)
        }

        // Backends emit empty deltas between tokens
        StreamUpdate::ContentDelta(delta) if delta.is_empty() => {
            TransitionResult::new(streaming(turn.clone()))
        }

        StreamUpdate::ContentDelta(delta) => {
            let mut turn = turn.clone();
            turn.content.push_str(&delta);
            TransitionResult::new(streaming(turn)).with_effect(Effect::PublishLive)
        }

        StreamUpdate::RelatedQuestionsReceived(questions) => {
            let mut turn = turn.clone();
            turn.related_questions = Some(questions);
            TransitionResult::new(streaming(turn)).with_effect(Effect::PublishLive)
        }

        StreamUpdate::StreamComplete => TransitionResult::new(StreamState::Idle)
            .with_effect(Effect::append_assistant(turn.clone()))
            .with_effect(Effect::PublishLive)
            .with_effect(Effect::stream_ended(stream_id, StreamOutcome::Completed)),

        StreamUpdate::StreamError(reason) => {
            let committed = match context.error_policy {
                ErrorPolicy::CommitPartial => AssistantTurn {
                    error: Some(reason.clone()),
                    ..turn.clone()
                },
                ErrorPolicy::Discard => AssistantTurn::failed(reason.clone()),
            };
            TransitionResult::new(StreamState::Idle)
                .with_effect(Effect::append_assistant(committed))
                .with_effect(Effect::PublishLive)
                .with_effect(Effect::stream_ended(
                    stream_id,
                    StreamOutcome::Failed { reason },
                ))
        }
    }
}
