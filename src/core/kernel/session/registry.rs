use crate::core::types::{SubscriptionKey, SubscriptionState};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock-guarded map of subscription keys to their confirmation state
///
/// Shared between caller operations (subscribe, optimistic unsubscribe) and
/// the receive loop (ack-driven confirm/remove). The lock is never held across
/// an await point.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    entries: Mutex<HashMap<SubscriptionKey, SubscriptionState>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<SubscriptionKey, SubscriptionState>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a request about to be written. An already confirmed key keeps
    /// its state. Returns true when a new entry was created.
    pub fn mark_pending(&self, key: SubscriptionKey) -> bool {
        let mut entries = self.entries();
        if entries.contains_key(&key) {
            return false;
        }
        entries.insert(key, SubscriptionState::Pending);
        true
    }

    /// Apply a successful acknowledgement. Keys that are not tracked stay untracked.
    pub fn confirm(&self, key: &SubscriptionKey) -> bool {
        match self.entries().get_mut(key) {
            Some(state) => {
                *state = SubscriptionState::Confirmed;
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, key: &SubscriptionKey) -> Option<SubscriptionState> {
        self.entries().remove(key)
    }

    pub fn remove_if_pending(&self, key: &SubscriptionKey) -> bool {
        let mut entries = self.entries();
        if entries.get(key) == Some(&SubscriptionState::Pending) {
            entries.remove(key);
            true
        } else {
            false
        }
    }

    /// Drop every entry still waiting for an acknowledgement
    pub fn discard_pending(&self) -> Vec<SubscriptionKey> {
        let mut entries = self.entries();
        let pending: Vec<_> = entries
            .iter()
            .filter(|(_, state)| **state == SubscriptionState::Pending)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &pending {
            entries.remove(key);
        }
        pending
    }

    /// Confirmed keys in a stable order, as replayed after a reconnect
    pub fn confirmed(&self) -> Vec<SubscriptionKey> {
        let mut keys: Vec<_> = self
            .entries()
            .iter()
            .filter(|(_, state)| **state == SubscriptionState::Confirmed)
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn snapshot(&self) -> Vec<(SubscriptionKey, SubscriptionState)> {
        let mut entries: Vec<_> = self
            .entries()
            .iter()
            .map(|(key, state)| (key.clone(), *state))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn state(&self, key: &SubscriptionKey) -> Option<SubscriptionState> {
        self.entries().get(key).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }
}
