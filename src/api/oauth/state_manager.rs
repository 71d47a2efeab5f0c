//! Pending consent states.
//!
//! Each state nonce is handed to the provider on redirect and must come
//! back exactly once, before it expires.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct StateEntry {
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

/// In-memory nonce table with a fixed TTL.
#[derive(Clone)]
pub struct StateManager {
    states: Arc<Mutex<HashMap<String, StateEntry>>>,
    expiry_duration: Duration,
}

impl StateManager {
    pub fn new(expiry_seconds: i64) -> Self {
        Self {
            states: Arc::new(Mutex::new(HashMap::new())),
            expiry_duration: Duration::seconds(expiry_seconds),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, StateEntry>> {
        // A panic while holding the lock cannot leave the map half-updated
        self.states.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Records a fresh nonce for `user_id` and returns it.
    pub fn create_state(&self, user_id: &str) -> String {
        let state = Uuid::new_v4().to_string();
        let entry = StateEntry {
            user_id: user_id.to_string(),
            created_at: Utc::now(),
        };

        self.lock().insert(state.clone(), entry);
        state
    }

    /// Removes the nonce and returns its entry if it had not expired.
    ///
    /// The entry is gone after this call whether or not it was valid.
    pub fn validate_and_consume(&self, state: &str) -> Option<StateEntry> {
        let entry = self.lock().remove(state)?;

        if Utc::now() - entry.created_at > self.expiry_duration {
            return None;
        }

        Some(entry)
    }

    pub fn cleanup_expired(&self) {
        let now = Utc::now();
        let expiry = self.expiry_duration;
        self.lock()
            .retain(|_, entry| now - entry.created_at <= expiry);
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    #[cfg(test)]
    fn backdate(&self, state: &str, by: Duration) {
        if let Some(entry) = self.lock().get_mut(state) {
            entry.created_at = entry.created_at - by;
        }
    }
}

/// Background task that drops expired states.
pub async fn run_state_cleanup(manager: StateManager, interval_seconds: u64) {
    let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(interval_seconds.max(1)));

    loop {
        interval.tick().await;
        manager.cleanup_expired();
        tracing::debug!(remaining = manager.count(), "OAuth state cleanup complete");
    }
}
