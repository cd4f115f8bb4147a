//! Read model over the committed turns

use super::turn::{AssistantTurn, Role, Turn, UserTurn};
use serde::Serialize;
use std::sync::Arc;

/// Immutable snapshot of the committed conversation.
///
/// Cloning is cheap. Appends go through [`super::SessionStore`], which copies
/// the backing vector when older snapshots are still alive, so a snapshot never
/// changes after it has been handed out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Transcript {
    turns: Arc<Vec<Turn>>,
}

/// A user question together with its answer, if one was committed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exchange<'a> {
    pub question: &'a UserTurn,
    pub answer: Option<&'a AssistantTurn>,
}

impl Transcript {
    pub(super) fn push(&mut self, turn: Turn) {
        Arc::make_mut(&mut self.turns).push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Turn> {
        self.turns.iter()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Roles in commit order
    pub fn roles(&self) -> Vec<Role> {
        self.turns.iter().map(Turn::role).collect()
    }

    /// Groups turns into question/answer pairs.
    ///
    /// A question whose stream was cancelled has no answer.
    pub fn exchanges(&self) -> Vec<Exchange<'_>> {
        let mut exchanges: Vec<Exchange<'_>> = Vec::new();
        for turn in self.turns.iter() {
            match turn {
                Turn::User(question) => exchanges.push(Exchange {
                    question,
                    answer: None,
                }),
                Turn::Assistant(answer) => match exchanges.last_mut() {
                    Some(exchange) if exchange.answer.is_none() => {
                        exchange.answer = Some(answer);
                    }
                    _ => tracing::debug!("Assistant turn without a pending question"),
                },
            }
        }
        exchanges
    }

    /// The most recently committed answer
    pub fn latest_answer(&self) -> Option<&AssistantTurn> {
        self.turns.iter().rev().find_map(Turn::as_assistant)
    }

    /// Follow-up suggestions attached to the latest answer
    pub fn related_questions(&self) -> &[String] {
        self.latest_answer()
            .map(AssistantTurn::related_questions)
            .unwrap_or_default()
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a Turn;
    type IntoIter = std::slice::Iter<'a, Turn>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
