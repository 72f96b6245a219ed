/// Factory: build the authentication services from application `Config`.
use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::services::auth::{
    Authenticator, AuthSetupError,
    replay::{InMemoryJtiStore, JtiStore, ReplayError, ValkeyJtiStore},
};

/// Valkey when `REDIS_URL` is set; otherwise an in-process store with a periodic sweep.
pub async fn build_jti_store(config: &Config) -> Result<Arc<dyn JtiStore>, ReplayError> {
    match config.redis_url.as_deref() {
        Some(url) => {
            let store = ValkeyJtiStore::new(url).await?;
            info!(backend = store.backend_name(), "jti store ready");
            Ok(Arc::new(store))
        }
        None => {
            let store = Arc::new(InMemoryJtiStore::new());
            store.spawn_sweeper(config.jti_sweep_interval);
            info!(
                sweep_interval_secs = config.jti_sweep_interval.as_secs(),
                "jti store ready (in-memory)"
            );
            Ok(store)
        }
    }
}

pub fn build_authenticator(
    config: &Config,
    jti_store: Arc<dyn JtiStore>,
) -> Result<Arc<Authenticator>, AuthSetupError> {
    let auth = Authenticator::from_options(config.auth_options(), jti_store)?;
    Ok(Arc::new(auth))
}
