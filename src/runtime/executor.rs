//! Session runtime executor

use super::traits::{Transport, UpdateSink};
use super::{Command, SessionEvent, SessionHandle};
use crate::session::{AssistantTurn, Query, SessionStore};
use crate::state_machine::{
    transition, ControllerContext, Effect, Event, StreamId, StreamState, StreamUpdate,
    TransitionError,
};
use crate::transport::ChatRequest;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

const BROADCAST_CAPACITY: usize = 128;

/// Event loop that owns the controller state and the session store
pub struct SessionRuntime<T>
where
    T: Transport + 'static,
{
    session_id: String,
    context: ControllerContext,
    state: StreamState,
    store: SessionStore,
    transport: Arc<T>,
    command_rx: mpsc::Receiver<Command>,
    /// Weak so that the loop ends once handles and sinks are gone
    command_tx: mpsc::WeakSender<Command>,
    live_tx: watch::Sender<Option<AssistantTurn>>,
    broadcast_tx: broadcast::Sender<SessionEvent>,
    /// Token of the transport task feeding the live stream
    active_stream: Option<(StreamId, CancellationToken)>,
}

impl<T> SessionRuntime<T>
where
    T: Transport + 'static,
{
    /// Build a runtime and the handle that drives it.
    ///
    /// `buffer` bounds the command channel shared by user commands and
    /// transport updates.
    pub fn new(context: ControllerContext, transport: T, buffer: usize) -> (Self, SessionHandle) {
        let (command_tx, command_rx) = mpsc::channel(buffer.max(1));
        let (live_tx, live_rx) = watch::channel(None);
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let store = SessionStore::new();

        let handle = SessionHandle {
            command_tx: command_tx.clone(),
            transcript_rx: store.subscribe(),
            live_rx,
            broadcast_tx: broadcast_tx.clone(),
            next_stream: Arc::new(AtomicU64::new(0)),
        };

        let runtime = Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            context,
            state: StreamState::Idle,
            store,
            transport: Arc::new(transport),
            command_rx,
            command_tx: command_tx.downgrade(),
            live_tx,
            broadcast_tx,
            active_stream: None,
        };

        (runtime, handle)
    }

    /// Build a runtime and run it on the current tokio runtime
    pub fn spawn(context: ControllerContext, transport: T, buffer: usize) -> SessionHandle {
        let (runtime, handle) = Self::new(context, transport, buffer);
        tokio::spawn(runtime.run());
        handle
    }

    pub async fn run(mut self) {
        tracing::info!(session_id = %self.session_id, "Starting session runtime");

        // Process commands one at a time - each runs to completion
        while let Some(command) = self.command_rx.recv().await {
            self.handle_command(command);
        }

        if let Some((stream_id, token)) = self.active_stream.take() {
            tracing::debug!(stream_id = %stream_id, "Aborting stream on shutdown");
            token.cancel();
        }

        tracing::info!(session_id = %self.session_id, "Session runtime stopped");
    }

    fn handle_command(&mut self, command: Command) {
        let Command { event, ack } = command;
        let result = self.process_event(event);

        match (ack, result) {
            (Some(ack), result) => {
                if let Err(e) = &result {
                    tracing::info!(session_id = %self.session_id, error = %e, "Command rejected");
                    let _ = self.broadcast_tx.send(SessionEvent::Error {
                        message: e.to_string(),
                    });
                }
                let _ = ack.send(result);
            }
            (None, Ok(())) => {}
            (None, Err(TransitionError::StaleStream(stream_id))) => {
                tracing::debug!(stream_id = %stream_id, "Dropping update from inactive stream");
            }
            (None, Err(e)) => {
                tracing::warn!(session_id = %self.session_id, error = %e, "Update rejected");
                let _ = self.broadcast_tx.send(SessionEvent::Error {
                    message: e.to_string(),
                });
            }
        }
    }

    fn process_event(&mut self, event: Event) -> Result<(), TransitionError> {
        if let Event::Stream { stream_id, update } = &event {
            tracing::debug!(stream_id = %stream_id, kind = update.kind(), "Applying update");
        }

        // Pure state transition
        let result = transition(&self.state, &self.context, event)?;
        self.state = result.new_state;

        for effect in result.effects {
            self.execute_effect(effect);
        }
        Ok(())
    }

    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::StartStream { stream_id, query } => self.start_stream(stream_id, query),

            Effect::AbortStream { stream_id } => {
                if self.release_stream(stream_id) {
                    tracing::info!(stream_id = %stream_id, "Answer stream aborted");
                }
            }

            Effect::AppendTurn(turn) => {
                let role = turn.role();
                let index = self.store.append(turn);
                let _ = self
                    .broadcast_tx
                    .send(SessionEvent::TurnAppended { index, role });
            }

            Effect::PublishLive => {
                self.live_tx.send_replace(self.state.live_turn().cloned());
            }

            Effect::NotifyStreamEnded { stream_id, outcome } => {
                self.release_stream(stream_id);
                tracing::info!(
                    session_id = %self.session_id,
                    stream_id = %stream_id,
                    outcome = ?outcome,
                    turns = self.store.len(),
                    "Answer stream ended"
                );
                let _ = self
                    .broadcast_tx
                    .send(SessionEvent::StreamEnded { stream_id, outcome });
            }
        }
    }

    /// Cancel the token for `stream_id` if it is the active stream
    fn release_stream(&mut self, stream_id: StreamId) -> bool {
        match self.active_stream.take() {
            Some((active, token)) if active == stream_id => {
                token.cancel();
                true
            }
            other => {
                self.active_stream = other;
                false
            }
        }
    }

    fn start_stream(&mut self, stream_id: StreamId, query: Query) {
        // History is everything committed before this query
        let request = ChatRequest::new(&query, &self.store.transcript());

        let Some(command_tx) = self.command_tx.upgrade() else {
            tracing::debug!(stream_id = %stream_id, "Session closed, not starting stream");
            return;
        };

        let token = CancellationToken::new();
        if let Some((previous, stale)) = self.active_stream.replace((stream_id, token.clone())) {
            tracing::warn!(stream_id = %previous, "Replacing stream that was never released");
            stale.cancel();
        }

        tracing::info!(
            session_id = %self.session_id,
            stream_id = %stream_id,
            query = %query,
            history = request.history.len(),
            "Starting answer stream"
        );
        let _ = self.broadcast_tx.send(SessionEvent::StreamStarted {
            stream_id,
            query: query.into_string(),
        });

        let transport = Arc::clone(&self.transport);
        let sink = UpdateSink::new(stream_id, command_tx);

        tokio::spawn(async move {
            tokio::select! {
                biased;

                () = token.cancelled() => {
                    tracing::debug!(stream_id = %stream_id, "Transport task cancelled");
                }

                result = transport.stream(request, sink.clone()) => {
                    let failure = match result {
                        Ok(()) if sink.is_finished() => None,
                        Ok(()) => Some("transport closed before the answer completed".to_string()),
                        Err(e) => {
                            tracing::warn!(
                                stream_id = %stream_id,
                                error = %e,
                                retryable = e.is_retryable(),
                                "Answer stream failed"
                            );
                            Some(e.to_string())
                        }
                    };
                    if let Some(reason) = failure {
                        sink.send(StreamUpdate::StreamError(reason)).await;
                    }
                }
            }
        });
    }
}
