//! Owner of the committed transcript

use super::transcript::Transcript;
use super::turn::Turn;
use tokio::sync::watch;

/// Single source of truth for committed turns.
///
/// History is append-only: there is no removal or reordering.
#[derive(Debug)]
pub struct SessionStore {
    tx: watch::Sender<Transcript>,
}

impl SessionStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Transcript::default());
        Self { tx }
    }

    /// Append a turn and notify subscribers. Returns the index of the new turn.
    pub fn append(&self, turn: Turn) -> usize {
        let mut index = 0;
        self.tx.send_modify(|transcript| {
            transcript.push(turn);
            index = transcript.len() - 1;
        });
        index
    }

    /// Current committed transcript
    pub fn transcript(&self) -> Transcript {
        self.tx.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.tx.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Receiver that observes every append
    pub fn subscribe(&self) -> watch::Receiver<Transcript> {
        self.tx.subscribe()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
