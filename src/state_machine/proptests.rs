//! Property-based tests for the streaming controller
//!
//! These tests drive `transition` with a simulated store and check the
//! transcript invariants across arbitrary event sequences.

use super::*;
use crate::session::{AssistantTurn, Query, Role, SearchResult, Turn};
use proptest::prelude::*;

// ============================================================================
// Test Harness
// ============================================================================

/// Minimal stand-in for the runtime: applies `AppendTurn` effects to a vector
struct Harness {
    context: ControllerContext,
    state: StreamState,
    transcript: Vec<Turn>,
    next_stream: u64,
}

impl Harness {
    fn new(context: ControllerContext) -> Self {
        Self {
            context,
            state: StreamState::Idle,
            transcript: Vec::new(),
            next_stream: 0,
        }
    }

    fn dispatch(&mut self, event: Event) -> Result<(), TransitionError> {
        let result = transition(&self.state, &self.context, event)?;
        self.state = result.new_state;
        for effect in result.effects {
            if let Effect::AppendTurn(turn) = effect {
                self.transcript.push(turn);
            }
        }
        Ok(())
    }

    fn submit(&mut self, text: &str) -> Result<StreamId, TransitionError> {
        self.next_stream += 1;
        let stream_id = StreamId(self.next_stream);
        self.dispatch(Event::Submit {
            stream_id,
            query: Query::parse(text).expect("test queries are non-blank"),
        })?;
        Ok(stream_id)
    }

    fn live(&mut self, update: StreamUpdate) -> Result<(), TransitionError> {
        let stream_id = self.state.stream_id().unwrap_or(StreamId(0));
        self.dispatch(Event::Stream { stream_id, update })
    }

    fn roles(&self) -> Vec<Role> {
        self.transcript.iter().map(Turn::role).collect()
    }
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_query() -> impl Strategy<Value = String> {
    "[a-zA-Z?]{1,8}( [a-zA-Z?]{1,8}){0,3}"
}

fn arb_search_result() -> impl Strategy<Value = SearchResult> {
    ("[A-Z][a-z]{1,10}", "[a-z]{1,8}", "[a-z ]{0,30}").prop_map(|(title, host, content)| {
        SearchResult::new(title, format!("https://{host}.example"), content)
    })
}

fn arb_update() -> impl Strategy<Value = StreamUpdate> {
    prop_oneof![
        proptest::collection::vec(arb_search_result(), 0..4)
            .prop_map(StreamUpdate::SourcesReceived),
        "[a-zA-Z .,]{0,12}".prop_map(StreamUpdate::ContentDelta),
        proptest::collection::vec(arb_query(), 0..4)
            .prop_map(StreamUpdate::RelatedQuestionsReceived),
        Just(StreamUpdate::StreamComplete),
        "[a-z ]{1,20}".prop_map(StreamUpdate::StreamError),
    ]
}

fn arb_submit_policy() -> impl Strategy<Value = SubmitPolicy> {
    prop_oneof![Just(SubmitPolicy::Restart), Just(SubmitPolicy::Reject)]
}

fn arb_error_policy() -> impl Strategy<Value = ErrorPolicy> {
    prop_oneof![Just(ErrorPolicy::CommitPartial), Just(ErrorPolicy::Discard)]
}

fn arb_context() -> impl Strategy<Value = ControllerContext> {
    (arb_submit_policy(), arb_error_policy())
        .prop_map(|(submit, error)| ControllerContext::new(submit, error))
}

/// What the simulated user or transport does next
#[derive(Debug, Clone)]
enum Action {
    Submit(String),
    Update(StreamUpdate),
    StaleUpdate(StreamUpdate),
    Cancel,
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        1 => arb_query().prop_map(Action::Submit),
        4 => arb_update().prop_map(Action::Update),
        1 => arb_update().prop_map(Action::StaleUpdate),
        1 => Just(Action::Cancel),
    ]
}

// ============================================================================
// Invariant Checkers
// ============================================================================

/// Every assistant turn directly follows a user turn
fn answers_follow_questions(transcript: &[Turn]) -> bool {
    transcript.iter().enumerate().all(|(i, turn)| match turn {
        Turn::User(_) => true,
        Turn::Assistant(_) => i > 0 && matches!(transcript[i - 1], Turn::User(_)),
    })
}

fn content_of(state: &StreamState) -> Option<(StreamId, String)> {
    match state {
        StreamState::Idle => None,
        StreamState::Streaming { stream_id, turn } => Some((*stream_id, turn.content.clone())),
    }
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Invariant 1: transcript shape survives any interleaving
    #[test]
    fn prop_answers_always_follow_questions(
        context in arb_context(),
        actions in proptest::collection::vec(arb_action(), 0..40)
    ) {
        let mut harness = Harness::new(context);

        for action in actions {
            let before = harness.transcript.clone();
            let outcome = match action {
                Action::Submit(text) => harness.submit(&text).map(|_| ()),
                Action::Update(update) => harness.live(update),
                Action::StaleUpdate(update) => harness.dispatch(Event::Stream {
                    stream_id: StreamId(u64::MAX),
                    update,
                }),
                Action::Cancel => harness.dispatch(Event::Cancel),
            };

            // Committed history is never edited
            prop_assert_eq!(&harness.transcript[..before.len()], &before[..]);
            prop_assert!(harness.transcript.len() <= before.len() + 2);
            if outcome.is_err() {
                prop_assert_eq!(&harness.transcript, &before);
            }
            prop_assert!(
                answers_follow_questions(&harness.transcript),
                "Answer without question: {:?}",
                harness.roles()
            );
        }
    }

    // Invariant 2: live content only grows while the same stream is live
    #[test]
    fn prop_live_content_is_append_only(
        context in arb_context(),
        actions in proptest::collection::vec(arb_action(), 0..40)
    ) {
        let mut harness = Harness::new(context);

        for action in actions {
            let before = content_of(&harness.state);
            let _ = match action {
                Action::Submit(text) => harness.submit(&text).map(|_| ()),
                Action::Update(update) | Action::StaleUpdate(update) => harness.live(update),
                Action::Cancel => harness.dispatch(Event::Cancel),
            };
            let after = content_of(&harness.state);

            if let (Some((id_before, old)), Some((id_after, new))) = (before, after) {
                if id_before == id_after {
                    prop_assert!(new.starts_with(&old), "{:?} is not a prefix of {:?}", old, new);
                }
            }
        }
    }

    // Invariant 3: N completed round-trips give 2N alternating turns
    #[test]
    fn prop_round_trips_alternate(
        queries in proptest::collection::vec(arb_query(), 1..10),
        context in arb_context()
    ) {
        let mut harness = Harness::new(context);

        for query in &queries {
            harness.submit(query).unwrap();
            harness.live(StreamUpdate::ContentDelta("answer".into())).unwrap();
            harness.live(StreamUpdate::StreamComplete).unwrap();
            prop_assert_eq!(&harness.state, &StreamState::Idle);
        }

        prop_assert_eq!(harness.transcript.len(), 2 * queries.len());
        let expected: Vec<Role> = queries
            .iter()
            .flat_map(|_| [Role::User, Role::Assistant])
            .collect();
        prop_assert_eq!(harness.roles(), expected);
    }

    // Invariant 4: deltas concatenate in receipt order
    #[test]
    fn prop_deltas_concatenate(deltas in proptest::collection::vec("[a-zA-Zé ]{0,6}", 0..20)) {
        let mut harness = Harness::new(ControllerContext::default());
        harness.submit("q").unwrap();
        for delta in &deltas {
            harness.live(StreamUpdate::ContentDelta(delta.clone())).unwrap();
        }
        harness.live(StreamUpdate::StreamComplete).unwrap();

        let Some(Turn::Assistant(answer)) = harness.transcript.last() else {
            panic!("expected a committed answer");
        };
        prop_assert_eq!(&answer.content, &deltas.concat());
    }

    // Invariant 5: sources and related questions are replaced, never merged
    #[test]
    fn prop_last_write_wins(
        sources in proptest::collection::vec(
            proptest::collection::vec(arb_search_result(), 0..4), 1..4),
        related in proptest::collection::vec(
            proptest::collection::vec(arb_query(), 0..4), 1..3)
    ) {
        let mut harness = Harness::new(ControllerContext::default());
        harness.submit("q").unwrap();
        for set in &sources {
            harness.live(StreamUpdate::SourcesReceived(set.clone())).unwrap();
        }
        for set in &related {
            harness.live(StreamUpdate::RelatedQuestionsReceived(set.clone())).unwrap();
        }
        harness.live(StreamUpdate::StreamComplete).unwrap();

        let Some(Turn::Assistant(answer)) = harness.transcript.last() else {
            panic!("expected a committed answer");
        };
        prop_assert_eq!(Some(&answer.sources), sources.last());
        prop_assert_eq!(answer.related_questions.as_ref(), related.last());
    }

    // Invariant 6: cancelling after completion changes nothing
    #[test]
    fn prop_cancel_after_complete_is_noop(query in arb_query(), cancels in 1usize..4) {
        let mut harness = Harness::new(ControllerContext::default());
        harness.submit(&query).unwrap();
        harness.live(StreamUpdate::ContentDelta("done".into())).unwrap();
        harness.live(StreamUpdate::StreamComplete).unwrap();
        let before = harness.transcript.clone();

        for _ in 0..cancels {
            prop_assert!(harness.dispatch(Event::Cancel).is_ok());
        }

        prop_assert_eq!(harness.transcript, before);
        prop_assert_eq!(harness.state, StreamState::Idle);
    }

    // Invariant 7: a rejected submit leaves everything untouched
    #[test]
    fn prop_reject_policy_keeps_live_stream(first in arb_query(), second in arb_query()) {
        let context = ControllerContext::new(SubmitPolicy::Reject, ErrorPolicy::default());
        let mut harness = Harness::new(context);
        let live = harness.submit(&first).unwrap();
        harness.live(StreamUpdate::ContentDelta("partial".into())).unwrap();
        let state_before = harness.state.clone();

        prop_assert_eq!(harness.submit(&second), Err(TransitionError::Busy));
        prop_assert_eq!(&harness.state, &state_before);
        prop_assert_eq!(harness.state.stream_id(), Some(live));
        prop_assert_eq!(harness.transcript.len(), 1);
    }

    // Invariant 8: a restarted stream never commits its partial answer
    #[test]
    fn prop_restart_discards_first_answer(
        first in arb_query(),
        second in arb_query(),
        partial in "[a-z]{1,10}"
    ) {
        let mut harness = Harness::new(ControllerContext::default());
        let first_id = harness.submit(&first).unwrap();
        harness.live(StreamUpdate::ContentDelta(partial.clone())).unwrap();
        harness.submit(&second).unwrap();

        // The aborted stream's late chunks cannot reach the new turn
        let late = harness.dispatch(Event::Stream {
            stream_id: first_id,
            update: StreamUpdate::StreamComplete,
        });
        prop_assert_eq!(late, Err(TransitionError::StaleStream(first_id)));

        harness.live(StreamUpdate::ContentDelta("fresh".into())).unwrap();
        harness.live(StreamUpdate::StreamComplete).unwrap();

        prop_assert_eq!(harness.roles(), vec![Role::User, Role::User, Role::Assistant]);
        let answers: Vec<&AssistantTurn> =
            harness.transcript.iter().filter_map(Turn::as_assistant).collect();
        prop_assert_eq!(answers.len(), 1);
        prop_assert_eq!(&answers[0].content, "fresh");
    }
}
