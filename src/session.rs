//! Per-user conversation state
//!
//! One active session per user. Sessions live in an explicit keyed store
//! with a per-key lock: events for the same user serialize because
//! accumulator mutation is not commutative, while different users proceed
//! fully in parallel.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::draft::DraftExpense;
use crate::models::FlowKind;

/// States of the expense conversation machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    AwaitingDate,
    AwaitingCustomDate,
    AwaitingCategory,
    AwaitingAmount,
    AwaitingComment,
    EditMenu,
    DeleteMenu,
}

/// Accumulator for one conversation: the current state tag, the flow kind,
/// and the draft being built. Created on first inbound action, cleared on
/// terminal transition or explicit cancellation.
#[derive(Debug, Clone)]
pub struct ConversationState {
    pub state: FlowState,
    pub flow: FlowKind,
    pub draft: DraftExpense,
    /// Report message an edit/delete sub-flow is anchored to.
    pub anchor_message_id: Option<i64>,
}

impl ConversationState {
    pub fn idle() -> Self {
        Self {
            state: FlowState::Idle,
            flow: FlowKind::NewEntry,
            draft: DraftExpense::new(),
            anchor_message_id: None,
        }
    }

    /// Reset to idle, discarding the accumulator.
    pub fn clear(&mut self) {
        *self = Self::idle();
    }

    pub fn is_idle(&self) -> bool {
        self.state == FlowState::Idle
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::idle()
    }
}

/// Keyed store `user_id -> ConversationState` with serialized access per key.
pub struct SessionStore {
    sessions: RwLock<HashMap<i64, Arc<Mutex<ConversationState>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// The session handle for a user, created idle on first access. The
    /// caller holds the returned lock for the whole event so concurrent
    /// events for one user cannot interleave.
    pub async fn entry(&self, user_id: i64) -> Arc<Mutex<ConversationState>> {
        {
            let sessions = self.sessions.read().await;
            if let Some(entry) = sessions.get(&user_id) {
                return entry.clone();
            }
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(ConversationState::idle())))
            .clone()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_entry_created_idle_and_reused() {
        let store = SessionStore::new();
        let entry = store.entry(1).await;
        {
            let mut session = entry.lock().await;
            assert!(session.is_idle());
            session.state = FlowState::AwaitingDate;
        }

        let again = store.entry(1).await;
        assert_eq!(again.lock().await.state, FlowState::AwaitingDate);

        let other = store.entry(2).await;
        assert!(other.lock().await.is_idle());
    }

    #[tokio::test]
    async fn test_per_user_serialization() {
        let store = Arc::new(SessionStore::new());
        let entry = store.entry(1).await;

        // Hold the lock; a second handler for the same user must wait.
        let guard = entry.lock().await;
        let store2 = store.clone();
        let contended = tokio::spawn(async move {
            let entry = store2.entry(1).await;
            let mut session = entry.lock().await;
            session.state = FlowState::AwaitingAmount;
        });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!contended.is_finished());
        drop(guard);

        contended.await.unwrap();
        assert_eq!(entry.lock().await.state, FlowState::AwaitingAmount);
    }

    #[test]
    fn test_clear_resets_accumulator() {
        let mut session = ConversationState::idle();
        session.state = FlowState::AwaitingComment;
        session.draft.comment = Some("half-done".to_string());
        session.clear();
        assert!(session.is_idle());
        assert!(session.draft.comment.is_none());
    }
}
