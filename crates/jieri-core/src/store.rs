//! Conversation-scoped holiday list storage.
//!
//! Holds the most recent holiday list produced in each session so that a
//! follow-up turn can reference it. An explicit state object passed to
//! whoever needs conversational context, never process-wide implicit state.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::holiday::Holiday;

/// Stores the most recently produced holiday list per session.
///
/// Entries are created lazily on first `put` and replaced wholesale on each
/// subsequent one; there is no TTL or eviction, retention is process-lifetime
/// by design. Cloning the store clones the handle, not the contents, so one
/// store can be shared across components.
///
/// Concurrent access from distinct sessions is safe. Turns within one
/// session are expected to be sequential; serializing them is the caller's
/// responsibility.
#[derive(Debug, Clone, Default)]
pub struct HolidayListStore {
    lists: Arc<RwLock<HashMap<String, Vec<Holiday>>>>,
}

impl HolidayListStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the most recently stored list for the session.
    ///
    /// Unknown sessions yield an empty list. The returned vector is an owned
    /// snapshot; mutating it does not affect the stored state.
    pub async fn get(&self, session_id: &str) -> Vec<Holiday> {
        let lists = self.lists.read().await;
        lists.get(session_id).cloned().unwrap_or_default()
    }

    /// Replaces the stored list for the session, creating the entry if
    /// absent.
    pub async fn put(&self, session_id: impl Into<String>, list: Vec<Holiday>) {
        let mut lists = self.lists.write().await;
        lists.insert(session_id.into(), list);
    }
}
