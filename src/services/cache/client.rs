//! Cache client interface used by higher-level services (JTI replay store, etc.).
use async_trait::async_trait;
use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache-layer errors (transport/command/serialization).
///
/// Note:
/// - We keep this independent from `AuthError` so callers can decide how to fail
///   (fail-closed for the replay store).
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    BackendConnection(String),
    #[error("cache command error: {0}")]
    BackendCommand(String),
    #[error("cache value error: {0}")]
    InvalidValue(String),
}

/// A minimal cache interface.
///
/// This is intentionally small and string-based:
/// - The JTI store only needs `GET`, `SET ... EXAT` and `SET ... NX EXAT`.
///
/// Implementations must be cheap to clone (typically `Arc<...>` inside)
#[async_trait]
pub trait CacheClient: Clone + Send + Sync + 'static {
    // Returns the cache backend name (for logging).
    fn backend_name(&self) -> &'static str;

    // Get UTF-8 string value.
    async fn get_string(&self, key: &str) -> CacheResult<Option<String>>;

    // Set value unconditionally; the key expires at `expire_at` (unix seconds).
    async fn set_until(&self, key: &str, value: &str, expire_at: i64) -> CacheResult<()>;

    // Set value if the key does not exist; the key expires at `expire_at` (unix seconds).
    //
    // Returns:
    // - `Ok(true)`  if the key was set (not seen before)
    // - `Ok(false)` if the key already exists
    async fn set_if_absent_until(
        &self,
        key: &str,
        value: &str,
        expire_at: i64,
    ) -> CacheResult<bool>;
}
