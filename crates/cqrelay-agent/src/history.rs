//! Per-user conversation history with FIFO eviction.
//!
//! History lives in process memory only and is lost on restart. A single
//! mutex guards every user's history; it is held for the append+evict
//! critical section and for snapshot copies, never across a network call.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use cqrelay_core::config::HistoryConfig;
use cqrelay_core::types::UserId;

use crate::provider::{Message, Role};

/// One side of a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
    /// Tokens attributed by the completion service's usage report.
    pub token_cost: u32,
}

impl HistoryEntry {
    pub fn user(content: impl Into<String>, token_cost: u32) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            token_cost,
        }
    }

    pub fn assistant(content: impl Into<String>, token_cost: u32) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            token_cost,
        }
    }

    /// Render as a plain-text request message.
    pub fn to_message(&self) -> Message {
        Message::text(self.role, self.content.clone())
    }
}

/// Bounds applied after every append.
#[derive(Debug, Clone, Copy)]
pub struct HistoryLimits {
    pub max_entries: usize,
    pub soft_token_limit: u64,
    pub hard_token_limit: u64,
}

impl Default for HistoryLimits {
    fn default() -> Self {
        HistoryLimits::from(&HistoryConfig::default())
    }
}

impl From<&HistoryConfig> for HistoryLimits {
    fn from(cfg: &HistoryConfig) -> Self {
        Self {
            max_entries: cfg.max_entries,
            soft_token_limit: cfg.soft_token_limit,
            hard_token_limit: cfg.hard_token_limit,
        }
    }
}

/// Maps each user to their ordered history, oldest entry first.
pub struct ConversationStore {
    histories: Mutex<HashMap<UserId, VecDeque<HistoryEntry>>>,
    limits: HistoryLimits,
}

impl ConversationStore {
    pub fn new(limits: HistoryLimits) -> Self {
        Self {
            histories: Mutex::new(HashMap::new()),
            limits,
        }
    }

    /// Record a completed exchange (user entry first), then evict.
    pub fn append_exchange(&self, user_id: &UserId, user: HistoryEntry, assistant: HistoryEntry) {
        let mut histories = self.histories.lock().unwrap_or_else(PoisonError::into_inner);
        let entries = histories.entry(*user_id).or_default();
        entries.push_back(user);
        entries.push_back(assistant);

        let evicted = evict(entries, &self.limits);
        if evicted > 0 {
            debug!(
                user = %user_id,
                evicted,
                retained = entries.len(),
                "history limit reached, dropped oldest entries"
            );
        }
    }

    /// Snapshot of a user's history, oldest first. Empty for unknown users.
    pub fn get_history(&self, user_id: &UserId) -> Vec<HistoryEntry> {
        let histories = self.histories.lock().unwrap_or_else(PoisonError::into_inner);
        histories
            .get(user_id)
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop a user's history. Returns how many entries were removed.
    pub fn clear(&self, user_id: &UserId) -> usize {
        let mut histories = self.histories.lock().unwrap_or_else(PoisonError::into_inner);
        histories.remove(user_id).map(|e| e.len()).unwrap_or(0)
    }

    /// Number of users that currently hold any history.
    pub fn user_count(&self) -> usize {
        let histories = self.histories.lock().unwrap_or_else(PoisonError::into_inner);
        histories.values().filter(|e| !e.is_empty()).count()
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new(HistoryLimits::default())
    }
}

/// Pop from the front until the bounds hold. Returns the number removed.
///
/// Triggers once the round limit is reached or the soft token limit is
/// exceeded; then drops oldest entries until below the round limit and
/// within the hard token limit.
fn evict(entries: &mut VecDeque<HistoryEntry>, limits: &HistoryLimits) -> usize {
    let mut total: u64 = entries.iter().map(|e| u64::from(e.token_cost)).sum();
    if entries.len() < limits.max_entries && total <= limits.soft_token_limit {
        return 0;
    }

    let mut evicted = 0;
    while entries.len() >= limits.max_entries || total > limits.hard_token_limit {
        match entries.pop_front() {
            Some(oldest) => {
                total -= u64::from(oldest.token_cost);
                evicted += 1;
            }
            None => break,
        }
    }
    evicted
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn total_cost(entries: &[HistoryEntry]) -> u64 {
        entries.iter().map(|e| u64::from(e.token_cost)).sum()
    }

    #[test]
    fn unknown_user_has_empty_history() {
        let store = ConversationStore::default();
        assert!(store.get_history(&UserId(1)).is_empty());
    }

    #[test]
    fn append_keeps_user_then_assistant_order() {
        let store = ConversationStore::default();
        let uid = UserId(42);
        store.append_exchange(&uid, HistoryEntry::user("q", 3), HistoryEntry::assistant("a", 5));

        let history = store.get_history(&uid);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[0].content, "q");
        assert_eq!(history[1].role, Role::Assistant);
        assert_eq!(history[1].token_cost, 5);
    }

    #[test]
    fn get_history_is_idempotent() {
        let store = ConversationStore::default();
        let uid = UserId(7);
        store.append_exchange(&uid, HistoryEntry::user("q", 1), HistoryEntry::assistant("a", 1));
        assert_eq!(store.get_history(&uid), store.get_history(&uid));
    }

    #[test]
    fn round_limit_never_exceeded() {
        let store = ConversationStore::default();
        let uid = UserId(1);
        for i in 0..20 {
            store.append_exchange(
                &uid,
                HistoryEntry::user(format!("q{i}"), 10),
                HistoryEntry::assistant(format!("a{i}"), 10),
            );
            let history = store.get_history(&uid);
            assert!(history.len() <= 10, "len {} after round {i}", history.len());
        }
        // Newest exchange is always retained.
        let history = store.get_history(&uid);
        assert_eq!(history.last().unwrap().content, "a19");
        assert_eq!(history[history.len() - 2].content, "q19");
    }

    #[test]
    fn reaching_round_limit_evicts_below_it() {
        let store = ConversationStore::default();
        let uid = UserId(1);
        for i in 0..5 {
            store.append_exchange(
                &uid,
                HistoryEntry::user(format!("q{i}"), 1),
                HistoryEntry::assistant(format!("a{i}"), 1),
            );
        }
        // The fifth exchange reaches 10 entries, which trips the bound check.
        let history = store.get_history(&uid);
        assert_eq!(history.len(), 9);
        assert_eq!(history[0].content, "a0");
    }

    #[test]
    fn soft_limit_alone_does_not_evict_under_hard_cap() {
        let store = ConversationStore::default();
        let uid = UserId(1);
        store.append_exchange(
            &uid,
            HistoryEntry::user("q0", 6000),
            HistoryEntry::assistant("a0", 6000),
        );
        // 12000 > soft limit but within the hard cap: nothing is dropped.
        assert_eq!(store.get_history(&uid).len(), 2);
    }

    #[test]
    fn hard_cap_evicts_oldest_first() {
        let store = ConversationStore::default();
        let uid = UserId(1);
        store.append_exchange(
            &uid,
            HistoryEntry::user("q0", 6000),
            HistoryEntry::assistant("a0", 2000),
        );
        store.append_exchange(
            &uid,
            HistoryEntry::user("q1", 6000),
            HistoryEntry::assistant("a1", 2000),
        );

        let history = store.get_history(&uid);
        assert!(total_cost(&history) <= 15_000);
        assert_eq!(history[0].content, "a0");
        assert_eq!(history.last().unwrap().content, "a1");
    }

    #[test]
    fn single_oversized_exchange_can_be_fully_evicted() {
        let store = ConversationStore::default();
        let uid = UserId(1);
        store.append_exchange(
            &uid,
            HistoryEntry::user("q", 9000),
            HistoryEntry::assistant("a", 9000),
        );

        let history = store.get_history(&uid);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "a");
    }

    #[test]
    fn users_are_isolated() {
        let store = ConversationStore::default();
        store.append_exchange(
            &UserId(1),
            HistoryEntry::user("one", 1),
            HistoryEntry::assistant("1", 1),
        );
        store.append_exchange(
            &UserId(2),
            HistoryEntry::user("two", 1),
            HistoryEntry::assistant("2", 1),
        );

        assert_eq!(store.get_history(&UserId(1))[0].content, "one");
        assert_eq!(store.get_history(&UserId(2))[0].content, "two");
        assert_eq!(store.user_count(), 2);
    }

    #[test]
    fn clear_removes_history() {
        let store = ConversationStore::default();
        let uid = UserId(9);
        store.append_exchange(&uid, HistoryEntry::user("q", 1), HistoryEntry::assistant("a", 1));
        assert_eq!(store.clear(&uid), 2);
        assert!(store.get_history(&uid).is_empty());
        assert_eq!(store.clear(&uid), 0);
    }

    #[test]
    fn concurrent_appends_respect_bounds() {
        let store = Arc::new(ConversationStore::default());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let uid = UserId(t % 2);
                        store.append_exchange(
                            &uid,
                            HistoryEntry::user(format!("q{t}-{i}"), 700),
                            HistoryEntry::assistant(format!("a{t}-{i}"), 900),
                        );
                        let history = store.get_history(&uid);
                        assert!(history.len() <= 10);
                        assert!(total_cost(&history) <= 15_000);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        for uid in [UserId(0), UserId(1)] {
            let history = store.get_history(&uid);
            // Pairs are appended atomically, so a user entry is always
            // directly followed by its assistant entry.
            for pair in history.windows(2) {
                if pair[0].role == Role::User {
                    assert_eq!(pair[1].role, Role::Assistant);
                    assert_eq!(pair[0].content[1..], pair[1].content[1..]);
                }
            }
        }
    }
}
