//! Run session storage.
//!
//! An explicit per-process store keyed by run token, passed to whoever needs
//! run access. Create/get/expire is the whole lifecycle; there is no ambient
//! global state.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::Utc;

use crate::coordinator::RunHandle;

/// In-memory run store with age-based expiry.
pub struct SessionStore {
    runs: RwLock<HashMap<String, Arc<RunHandle>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            runs: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<RunHandle>>> {
        self.runs.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<RunHandle>>> {
        self.runs.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a run under its token.
    pub fn insert(&self, handle: Arc<RunHandle>) {
        self.write().insert(handle.token().to_string(), handle);
    }

    pub fn get(&self, token: &str) -> Option<Arc<RunHandle>> {
        self.read().get(token).cloned()
    }

    pub fn remove(&self, token: &str) -> Option<Arc<RunHandle>> {
        self.write().remove(token)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Drop runs older than the store TTL, including abandoned reviews.
    /// Returns the number of runs removed.
    pub fn expire_stale(&self) -> usize {
        let now = Utc::now();
        let mut runs = self.write();
        let before = runs.len();
        runs.retain(|_, handle| {
            let age = now
                .signed_duration_since(handle.created_at())
                .to_std()
                .unwrap_or_default();
            age <= self.ttl
        });
        let removed = before - runs.len();
        if removed > 0 {
            tracing::info!("Expired {} stale run(s)", removed);
        }
        removed
    }
}
