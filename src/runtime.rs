//! Runtime for executing a chat session
//!
//! A single task owns the controller state and the session store. Every
//! mutation, whether it comes from the user or from a transport, arrives as a
//! command on one channel and is applied to completion before the next.

mod executor;
pub mod traits;


pub use executor::SessionRuntime;
pub use traits::{Transport, UpdateSink};

use crate::session::{AssistantTurn, Query, Role, Transcript};
use crate::state_machine::{Event, StreamId, StreamOutcome, StreamUpdate, TransitionError};
use futures::Stream;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Notifications broadcast to session subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StreamStarted {
        stream_id: StreamId,
        query: String,
    },
    TurnAppended {
        index: usize,
        role: Role,
    },
    StreamEnded {
        stream_id: StreamId,
        outcome: StreamOutcome,
    },
    Error {
        message: String,
    },
}

/// Errors returned to callers of [`SessionHandle`]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Query is empty")]
    InvalidQuery,
    #[error("No related question at position {0}")]
    NoSuchRelatedQuestion(usize),
    #[error(transparent)]
    Rejected(#[from] TransitionError),
    #[error("Session runtime has stopped")]
    Stopped,
}

/// One unit of work for the runtime loop
#[derive(Debug)]
pub(crate) struct Command {
    event: Event,
    /// Present for user commands, which report the transition outcome back
    ack: Option<oneshot::Sender<Result<(), TransitionError>>>,
}

impl Command {
    fn user(event: Event) -> (Self, oneshot::Receiver<Result<(), TransitionError>>) {
        let (ack, rx) = oneshot::channel();
        (
            Self {
                event,
                ack: Some(ack),
            },
            rx,
        )
    }

    fn update(stream_id: StreamId, update: StreamUpdate) -> Self {
        Self {
            event: Event::Stream { stream_id, update },
            ack: None,
        }
    }
}

/// Handle to interact with a running session.
///
/// Handles are cheap to clone. The runtime stops once every handle and every
/// in-flight stream has been dropped.
#[derive(Clone)]
pub struct SessionHandle {
    command_tx: mpsc::Sender<Command>,
    transcript_rx: watch::Receiver<Transcript>,
    live_rx: watch::Receiver<Option<AssistantTurn>>,
    broadcast_tx: broadcast::Sender<SessionEvent>,
    next_stream: Arc<AtomicU64>,
}

impl SessionHandle {
    /// Ask a new question.
    ///
    /// Blank queries are refused here and never reach the controller.
    pub async fn submit(&self, text: &str) -> Result<StreamId, SubmitError> {
        let query = Query::parse(text).ok_or(SubmitError::InvalidQuery)?;
        let stream_id = StreamId(self.next_stream.fetch_add(1, Ordering::Relaxed) + 1);
        self.dispatch(Event::Submit { stream_id, query }).await?;
        Ok(stream_id)
    }

    /// Ask one of the suggested follow-up questions
    pub async fn select_related(&self, question: &str) -> Result<StreamId, SubmitError> {
        self.submit(question).await
    }

    /// Ask the related question at `index` of the latest answer
    pub async fn select_related_at(&self, index: usize) -> Result<StreamId, SubmitError> {
        let question = self
            .transcript()
            .related_questions()
            .get(index)
            .cloned()
            .ok_or(SubmitError::NoSuchRelatedQuestion(index))?;
        self.select_related(&question).await
    }

    /// Abort the live stream, if any. Cancelling when idle does nothing.
    pub async fn cancel(&self) -> Result<(), SubmitError> {
        self.dispatch(Event::Cancel).await
    }

    async fn dispatch(&self, event: Event) -> Result<(), SubmitError> {
        let (command, ack) = Command::user(event);
        self.command_tx
            .send(command)
            .await
            .map_err(|_| SubmitError::Stopped)?;
        ack.await.map_err(|_| SubmitError::Stopped)??;
        Ok(())
    }

    /// Committed turns
    pub fn transcript(&self) -> Transcript {
        self.transcript_rx.borrow().clone()
    }

    /// The answer currently being streamed
    pub fn live_turn(&self) -> Option<AssistantTurn> {
        self.live_rx.borrow().clone()
    }

    pub fn is_streaming(&self) -> bool {
        self.live_rx.borrow().is_some()
    }

    pub fn watch_transcript(&self) -> watch::Receiver<Transcript> {
        self.transcript_rx.clone()
    }

    pub fn watch_live_turn(&self) -> watch::Receiver<Option<AssistantTurn>> {
        self.live_rx.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.broadcast_tx.subscribe()
    }

    /// Session events as a stream, skipping any a slow reader missed
    pub fn events(&self) -> impl Stream<Item = SessionEvent> + Send + 'static {
        BroadcastStream::new(self.subscribe()).filter_map(Result::ok)
    }
}
