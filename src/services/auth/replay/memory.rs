//! In-process JTI store.
//!
//! Suitable for a single server instance; records are lost on restart.
//! Use the Valkey store when several instances share replay state.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, Weak},
    time::Duration,
};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::services::auth::replay::store::{JtiRecord, JtiStore, ReplayError};

/// Expired records are purged on write once the map grows past this size.
const PURGE_THRESHOLD: usize = 10_000;

#[derive(Debug, Default)]
pub struct InMemoryJtiStore {
    entries: Mutex<HashMap<String, JtiRecord>>,
}

impl InMemoryJtiStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, JtiRecord>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Remove every record that expired before `now`. Returns the number removed.
    pub fn purge_expired(&self, now: i64) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, record| !record.is_expired(now));
        before - entries.len()
    }

    /// Spawn a task purging expired records every `every`.
    ///
    /// The task holds a weak reference and ends once the store is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let store: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // First tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                let removed = store.purge_expired(chrono::Utc::now().timestamp());
                if removed > 0 {
                    debug!(removed, remaining = store.len(), "jti sweep");
                }
            }
        })
    }

    fn maybe_purge(entries: &mut HashMap<String, JtiRecord>) {
        if entries.len() >= PURGE_THRESHOLD {
            let now = chrono::Utc::now().timestamp();
            entries.retain(|_, record| !record.is_expired(now));
        }
    }
}

#[async_trait]
impl JtiStore for InMemoryJtiStore {
    async fn set(&self, jti: &str, record: JtiRecord) -> Result<(), ReplayError> {
        let mut entries = self.entries();
        Self::maybe_purge(&mut entries);
        entries.insert(jti.to_string(), record);
        Ok(())
    }

    async fn get(&self, jti: &str) -> Result<Option<JtiRecord>, ReplayError> {
        Ok(self.entries().get(jti).copied())
    }

    async fn check_and_store(&self, jti: &str, record: JtiRecord) -> Result<bool, ReplayError> {
        let mut entries = self.entries();
        if entries.contains_key(jti) {
            return Ok(false);
        }
        Self::maybe_purge(&mut entries);
        entries.insert(jti.to_string(), record);
        Ok(true)
    }
}
