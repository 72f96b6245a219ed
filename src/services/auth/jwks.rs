//! Verification key set for the configured issuer.
//!
//! `RemoteJwks` fetches `jwks_uri` over HTTP and caches the result for a TTL.
//! A token naming a `kid` the cached set lacks triggers one refresh, rate
//! limited so a stream of bogus `kid`s cannot hammer the issuer.
use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use thiserror::Error;
use tokio::{sync::RwLock, time::Instant};
use tracing::{debug, info, warn};

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(600);
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(5);
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum KeySetError {
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("failed to fetch key set from {uri}: {source}")]
    Fetch {
        uri: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("key set endpoint {uri} returned {status}")]
    Status {
        uri: String,
        status: reqwest::StatusCode,
    },

    #[error("invalid key set document from {uri}: {source}")]
    Decode {
        uri: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Source of the issuer's public keys.
#[async_trait]
pub trait KeySetProvider: Send + Sync {
    async fn key_set(&self) -> Result<JwkSet, KeySetError>;

    // Called when a token names a `kid` missing from `key_set()`.
    // Providers without a remote source return the same set.
    async fn refresh(&self) -> Result<JwkSet, KeySetError> {
        self.key_set().await
    }
}

/// A fixed key set. Useful for tests and for issuers that publish keys out of band.
#[derive(Debug, Clone)]
pub struct StaticKeySet {
    keys: JwkSet,
}

impl StaticKeySet {
    pub fn new(keys: JwkSet) -> Self {
        Self { keys }
    }
}

#[async_trait]
impl KeySetProvider for StaticKeySet {
    async fn key_set(&self) -> Result<JwkSet, KeySetError> {
        Ok(self.keys.clone())
    }
}

#[derive(Debug, Clone)]
struct CachedJwks {
    jwks: JwkSet,
    fetched_at: Instant,
}

#[derive(Debug, Clone)]
pub struct RemoteJwks {
    jwks_uri: String,
    http: reqwest::Client,
    cache: Arc<RwLock<Option<CachedJwks>>>,
    cache_ttl: Duration,
    min_refresh_interval: Duration,
}

impl RemoteJwks {
    pub fn new(jwks_uri: impl Into<String>) -> Result<Self, KeySetError> {
        let http = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(KeySetError::Client)?;

        Ok(Self {
            jwks_uri: jwks_uri.into(),
            http,
            cache: Arc::new(RwLock::new(None)),
            cache_ttl: DEFAULT_CACHE_TTL,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
        })
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    pub fn jwks_uri(&self) -> &str {
        &self.jwks_uri
    }

    async fn fetch_and_cache(&self) -> Result<JwkSet, KeySetError> {
        // Fetches are serialized; a caller that waited on the lock may find fresh keys.
        let mut cache = self.cache.write().await;
        if let Some(cached) = cache.as_ref()
            && cached.fetched_at.elapsed() < self.min_refresh_interval
        {
            return Ok(cached.jwks.clone());
        }

        info!(jwks_uri = %self.jwks_uri, "fetching key set");

        let response = self
            .http
            .get(&self.jwks_uri)
            .send()
            .await
            .map_err(|source| KeySetError::Fetch {
                uri: self.jwks_uri.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(KeySetError::Status {
                uri: self.jwks_uri.clone(),
                status,
            });
        }

        let jwks: JwkSet = response.json().await.map_err(|source| KeySetError::Decode {
            uri: self.jwks_uri.clone(),
            source,
        })?;

        debug!(keys = jwks.keys.len(), "key set cached");
        *cache = Some(CachedJwks {
            jwks: jwks.clone(),
            fetched_at: Instant::now(),
        });

        Ok(jwks)
    }
}

#[async_trait]
impl KeySetProvider for RemoteJwks {
    async fn key_set(&self) -> Result<JwkSet, KeySetError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref()
                && cached.fetched_at.elapsed() < self.cache_ttl
            {
                return Ok(cached.jwks.clone());
            }
        }

        self.fetch_and_cache().await
    }

    async fn refresh(&self) -> Result<JwkSet, KeySetError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref()
                && cached.fetched_at.elapsed() < self.min_refresh_interval
            {
                warn!(jwks_uri = %self.jwks_uri, "key set refresh rate limited, using cache");
                return Ok(cached.jwks.clone());
            }
        }

        self.fetch_and_cache().await
    }
}
