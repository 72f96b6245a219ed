use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::services::cache::CacheError;

/// Metadata stored for a consumed DPoP proof id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JtiRecord {
    // Unix seconds after which the record may be reaped.
    pub expires_at: i64,
}

impl JtiRecord {
    pub fn new(expires_at: i64) -> Self {
        Self { expires_at }
    }

    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at < now
    }
}

/// Store of consumed proof identifiers (`jti`).
///
/// A present record means "already used", whether or not it has logically
/// expired; reaping expired records is the store's job.
///
/// Returns `Err(_)` on backend failure; callers must fail closed.
#[async_trait]
pub trait JtiStore: Send + Sync {
    // Store `record` under `jti`, overwriting any previous value.
    async fn set(&self, jti: &str, record: JtiRecord) -> Result<(), ReplayError>;

    async fn get(&self, jti: &str) -> Result<Option<JtiRecord>, ReplayError>;

    // Record `jti` unless it is already present.
    //
    // Returns:
    // - Ok(true)  => first time (stored)
    // - Ok(false) => replay detected (already exists)
    //
    // The default is a plain read-then-write; backends with an atomic
    // primitive should override it.
    async fn check_and_store(&self, jti: &str, record: JtiRecord) -> Result<bool, ReplayError> {
        if self.get(jti).await?.is_some() {
            return Ok(false);
        }
        self.set(jti, record).await?;
        Ok(true)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("invalid jti record: {0}")]
    Record(#[from] serde_json::Error),
}
