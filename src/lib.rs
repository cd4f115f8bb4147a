//! Ask Engine - conversational state for search-and-answer chat
//!
//! A session keeps an append-only transcript of questions and answers. Each
//! question opens a stream of partial updates from an answer backend; the
//! streaming answer is shown live and committed to the transcript once the
//! stream ends.

pub mod config;
pub mod runtime;
pub mod session;
pub mod state_machine;
pub mod transport;

pub use config::SessionConfig;
pub use runtime::{SessionEvent, SessionHandle, SessionRuntime, SubmitError, Transport, UpdateSink};
pub use session::{AssistantTurn, Query, Role, SearchResult, SessionStore, Transcript, Turn};
pub use state_machine::{ControllerContext, ErrorPolicy, StreamId, StreamOutcome, SubmitPolicy};
pub use transport::{HttpTransport, TransportError};
