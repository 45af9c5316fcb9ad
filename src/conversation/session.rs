use super::ReplyOption;
use crate::db::UserId;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// What the user was shown before picking a quality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSelection {
    pub url: String,
    pub title: String,
    /// The options the user was offered, shown again after an unusable pick.
    pub options: Vec<ReplyOption>,
}

/// Per-user selection state. A user with a pending selection is awaiting a quality choice.
pub trait SessionStore: Send + Sync {
    /// Replaces any earlier selection for the user.
    fn put(&self, user_id: UserId, selection: PendingSelection);

    /// Removes and returns the selection, so a second pick finds nothing.
    fn take(&self, user_id: UserId) -> Option<PendingSelection>;

    /// The selection, left in place.
    fn peek(&self, user_id: UserId) -> Option<PendingSelection>;
}

#[derive(Default)]
pub struct InMemorySessions {
    pending: Mutex<HashMap<UserId, PendingSelection>>,
}

impl InMemorySessions {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessions {
    fn put(&self, user_id: UserId, selection: PendingSelection) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user_id, selection);
    }

    fn take(&self, user_id: UserId) -> Option<PendingSelection> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&user_id)
    }

    fn peek(&self, user_id: UserId) -> Option<PendingSelection> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&user_id)
            .cloned()
    }
}
