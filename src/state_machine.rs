//! Streaming turn controller
//!
//! Implements the Elm Architecture pattern with pure state transitions: the
//! runtime feeds events in one at a time and executes the returned effects.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::{Effect, StreamOutcome};
pub use event::{Event, StreamUpdate};
pub use state::{
    ControllerContext, ErrorPolicy, ParsePolicyError, StreamId, StreamState, SubmitPolicy,
};
pub use transition::{transition, TransitionError, TransitionResult};
