//! Trait abstractions for runtime I/O
//!
//! The transport is the only outside collaborator; tests swap in scripted
//! implementations from `testing`.

use super::Command;
use crate::state_machine::{StreamId, StreamUpdate};
use crate::transport::{ChatRequest, TransportError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Source of streamed answers
#[async_trait]
pub trait Transport: Send + Sync {
    /// Produce the answer for `request`, forwarding updates to `sink` in the
    /// order they were produced.
    ///
    /// Returning `Ok` without having sent a terminal update is treated as a
    /// failed stream.
    async fn stream(&self, request: ChatRequest, sink: UpdateSink) -> Result<(), TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn stream(&self, request: ChatRequest, sink: UpdateSink) -> Result<(), TransportError> {
        (**self).stream(request, sink).await
    }
}

/// Where a transport delivers updates for one stream
#[derive(Debug, Clone)]
pub struct UpdateSink {
    stream_id: StreamId,
    tx: mpsc::Sender<Command>,
    finished: Arc<AtomicBool>,
}

impl UpdateSink {
    pub(crate) fn new(stream_id: StreamId, tx: mpsc::Sender<Command>) -> Self {
        Self {
            stream_id,
            tx,
            finished: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    /// Queue an update. Returns `false` once the session is gone.
    pub async fn send(&self, update: StreamUpdate) -> bool {
        if update.is_terminal() {
            self.finished.store(true, Ordering::Release);
        }
        self.tx
            .send(Command::update(self.stream_id, update))
            .await
            .is_ok()
    }

    /// Whether a terminal update has been sent
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}
