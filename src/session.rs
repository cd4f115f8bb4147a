//! Committed conversation state
//!
//! The store owns the transcript; everything else reads snapshots of it.

mod store;
mod transcript;
mod turn;

pub use store::SessionStore;
pub use transcript::{Exchange, Transcript};
pub use turn::{AssistantTurn, Query, Role, SearchResult, Turn, UserTurn};
