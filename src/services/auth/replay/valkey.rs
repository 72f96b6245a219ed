use std::sync::Arc;

use async_trait::async_trait;

use crate::services::{
    auth::replay::store::{JtiRecord, JtiStore, ReplayError},
    cache::{CacheClient, ValkeyClient},
};

/// Valkey-backed JTI store (Redis protocol)
///
/// Records are stored as JSON and expire natively at `expires_at` (`EXAT`).
/// Fail-closed policy is implemented by returning `Err` on any backend error.
#[derive(Clone)]
pub struct ValkeyJtiStore<C: CacheClient> {
    cache: Arc<C>,
    // Optional key prefix to avoid collisions across environments
    prefix: String,
}

impl ValkeyJtiStore<ValkeyClient> {
    pub async fn new(redis_url: &str) -> Result<Self, ReplayError> {
        Self::new_with_prefix(redis_url, "dpop:jti").await
    }

    pub async fn new_with_prefix(
        redis_url: &str,
        prefix: impl Into<String>,
    ) -> Result<Self, ReplayError> {
        let client = ValkeyClient::new(redis_url).await?;

        Ok(Self {
            cache: Arc::new(client),
            prefix: prefix.into(),
        })
    }
}

impl<C: CacheClient> ValkeyJtiStore<C> {
    pub fn new_with_cache(cache: Arc<C>, prefix: impl Into<String>) -> Self {
        Self {
            cache,
            prefix: prefix.into(),
        }
    }

    pub fn key(&self, jti: &str) -> String {
        format!("{}:{}", self.prefix, jti)
    }

    pub fn backend_name(&self) -> &'static str {
        self.cache.backend_name()
    }
}

#[async_trait]
impl<C: CacheClient> JtiStore for ValkeyJtiStore<C> {
    async fn set(&self, jti: &str, record: JtiRecord) -> Result<(), ReplayError> {
        let value = serde_json::to_string(&record)?;
        self.cache
            .set_until(&self.key(jti), &value, record.expires_at)
            .await?;
        Ok(())
    }

    async fn get(&self, jti: &str) -> Result<Option<JtiRecord>, ReplayError> {
        match self.cache.get_string(&self.key(jti)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn check_and_store(&self, jti: &str, record: JtiRecord) -> Result<bool, ReplayError> {
        // SET <key> <json> NX EXAT <expires_at>
        let value = serde_json::to_string(&record)?;
        let first_time = self
            .cache
            .set_if_absent_until(&self.key(jti), &value, record.expires_at)
            .await?;
        Ok(first_time)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::services::cache::client::CacheResult;

    #[derive(Clone, Default)]
    struct FakeCache {
        data: Arc<Mutex<HashMap<String, (String, i64)>>>,
    }

    #[async_trait]
    impl CacheClient for FakeCache {
        fn backend_name(&self) -> &'static str {
            "fake"
        }

        async fn get_string(&self, key: &str) -> CacheResult<Option<String>> {
            Ok(self.data.lock().unwrap().get(key).map(|(v, _)| v.clone()))
        }

        async fn set_until(&self, key: &str, value: &str, expire_at: i64) -> CacheResult<()> {
            self.data
                .lock()
                .unwrap()
                .insert(key.to_string(), (value.to_string(), expire_at));
            Ok(())
        }

        async fn set_if_absent_until(
            &self,
            key: &str,
            value: &str,
            expire_at: i64,
        ) -> CacheResult<bool> {
            let mut data = self.data.lock().unwrap();
            if data.contains_key(key) {
                return Ok(false);
            }
            data.insert(key.to_string(), (value.to_string(), expire_at));
            Ok(true)
        }
    }

    #[tokio::test]
    async fn records_are_prefixed_json_with_native_expiry() {
        let cache = Arc::new(FakeCache::default());
        let store = ValkeyJtiStore::new_with_cache(cache.clone(), "test:jti");
        assert_eq!(store.backend_name(), "fake");

        store.set("abc", JtiRecord::new(1_750_113_600)).await.unwrap();

        let data = cache.data.lock().unwrap();
        let (value, expire_at) = data.get("test:jti:abc").unwrap();
        assert_eq!(value, r#"{"expiresAt":1750113600}"#);
        assert_eq!(*expire_at, 1_750_113_600);
    }

    #[tokio::test]
    async fn get_decodes_stored_record() {
        let cache = Arc::new(FakeCache::default());
        let store = ValkeyJtiStore::new_with_cache(cache, "p");

        assert_eq!(store.get("missing").await.unwrap(), None);
        store.set("x", JtiRecord::new(42)).await.unwrap();
        assert_eq!(store.get("x").await.unwrap(), Some(JtiRecord::new(42)));
    }

    #[tokio::test]
    async fn check_and_store_uses_set_if_absent() {
        let cache = Arc::new(FakeCache::default());
        let store = ValkeyJtiStore::new_with_cache(cache, "p");

        assert!(store.check_and_store("j", JtiRecord::new(42)).await.unwrap());
        assert!(!store.check_and_store("j", JtiRecord::new(42)).await.unwrap());
    }

    #[tokio::test]
    async fn corrupt_value_is_an_error() {
        let cache = Arc::new(FakeCache::default());
        cache.set_until("p:bad", "not json", 1).await.unwrap();
        let store = ValkeyJtiStore::new_with_cache(cache, "p");

        assert!(matches!(store.get("bad").await, Err(ReplayError::Record(_))));
    }
}
