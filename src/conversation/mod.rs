// Per-thread conversation history and follow-up query rewriting

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Framing placed between a follow-up question and the question it refers to
pub const CONTEXT_FRAMING: &str = " In the context of: ";

/// One answered question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub question: String,
    pub answer: String,
}

impl Turn {
    #[inline]
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// The text to embed for `current`, given the previous question of the same thread.
///
/// Only one prior question is considered; a missing or blank one leaves `current`
/// unchanged.
#[inline]
pub fn rewrite(current: &str, prior: Option<&str>) -> String {
    match prior.map(str::trim).filter(|prior| !prior.is_empty()) {
        Some(prior) => format!("{}{}{}", current, CONTEXT_FRAMING, prior),
        None => current.to_string(),
    }
}

/// Effective query for `question` after the turns in `history`
#[inline]
pub fn effective_query(history: &[Turn], question: &str) -> String {
    rewrite(question, history.last().map(|turn| turn.question.as_str()))
}

/// Append-only turn logs keyed by thread identifier
#[derive(Debug, Default)]
pub struct ConversationStore {
    threads: RwLock<HashMap<String, Vec<Turn>>>,
}

impl ConversationStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Vec<Turn>>> {
        self.threads.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Vec<Turn>>> {
        self.threads.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// A copy of the turns recorded for `thread`, oldest first
    #[inline]
    pub fn history(&self, thread: &str) -> Vec<Turn> {
        self.read().get(thread).cloned().unwrap_or_default()
    }

    #[inline]
    pub fn record(&self, thread: &str, turn: Turn) {
        let mut threads = self.write();
        let turns = threads.entry(thread.to_string()).or_default();
        turns.push(turn);
        debug!("Thread '{}' now has {} turns", thread, turns.len());
    }

    #[inline]
    pub fn effective_query(&self, thread: &str, question: &str) -> String {
        let prior = self
            .read()
            .get(thread)
            .and_then(|turns| turns.last())
            .map(|turn| turn.question.clone());
        rewrite(question, prior.as_deref())
    }

    #[inline]
    pub fn clear(&self, thread: &str) -> bool {
        self.write().remove(thread).is_some()
    }

    #[inline]
    pub fn thread_count(&self) -> usize {
        self.read().len()
    }
}
