/*
 * Responsibility
 * - 環境変数や設定の読み込み (CORS 許可、Auth 設定、JTI store の接続先など)
 * - 設定値のバリデーション (不足なら起動失敗)
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::services::auth::{AuthOptions, NonceSecret};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn from_env() -> Self {
        Self::parse(&std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()))
    }

    fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

pub struct Config {
    pub addr: SocketAddr,

    pub app_env: AppEnv,
    pub cors_allowed_origins: Vec<String>,

    pub auth_issuer: String,
    pub auth_audience: String,
    pub auth_jwks_uri: Option<String>,
    pub auth_nonce_secret: NonceSecret,
    pub auth_protect_routes: bool,
    pub auth_enforce_dpop: bool,
    pub public_base_url: Option<String>,
    pub access_token_leeway_seconds: u64,

    // JTI store: Valkey when set, in-process otherwise.
    pub redis_url: Option<String>,
    pub jti_sweep_interval: Duration,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print the nonce secret or credentials in REDIS_URL
        f.debug_struct("Config")
            .field("addr", &self.addr)
            .field("app_env", &self.app_env)
            .field("auth_issuer", &self.auth_issuer)
            .field("auth_audience", &self.auth_audience)
            .field("auth_protect_routes", &self.auth_protect_routes)
            .field("auth_enforce_dpop", &self.auth_enforce_dpop)
            .finish_non_exhaustive()
    }
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn flag(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match optional(key) {
        None => Ok(default),
        Some(v) => match v.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid(key)),
        },
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::from_env();

        let cors_allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        let auth_issuer = optional("AUTH_ISSUER").ok_or(ConfigError::Missing("AUTH_ISSUER"))?;

        let auth_audience =
            optional("AUTH_AUDIENCE").ok_or(ConfigError::Missing("AUTH_AUDIENCE"))?;

        let auth_nonce_secret = std::env::var("AUTH_NONCE_SECRET")
            .map_err(|_| ConfigError::Missing("AUTH_NONCE_SECRET"))
            .and_then(|v| {
                NonceSecret::parse(&v).map_err(|_| ConfigError::Invalid("AUTH_NONCE_SECRET"))
            })?;

        let access_token_leeway_seconds = match optional("ACCESS_TOKEN_LEEWAY_SECONDS") {
            None => 0,
            Some(v) => v
                .parse::<u64>()
                .map_err(|_| ConfigError::Invalid("ACCESS_TOKEN_LEEWAY_SECONDS"))?,
        };

        let jti_sweep_interval = Duration::from_secs(
            optional("JTI_SWEEP_INTERVAL_SECONDS")
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(60),
        );

        Ok(Self {
            addr,
            app_env,
            cors_allowed_origins,
            auth_issuer,
            auth_audience,
            auth_jwks_uri: optional("AUTH_JWKS_URI"),
            auth_nonce_secret,
            auth_protect_routes: flag("AUTH_PROTECT_ROUTES", true)?,
            auth_enforce_dpop: flag("AUTH_ENFORCE_DPOP", false)?,
            public_base_url: optional("PUBLIC_BASE_URL"),
            access_token_leeway_seconds,
            redis_url: optional("REDIS_URL"),
            jti_sweep_interval,
        })
    }

    pub fn auth_options(&self) -> AuthOptions {
        let mut options = AuthOptions::new(
            self.auth_issuer.clone(),
            self.auth_audience.clone(),
            self.auth_nonce_secret.clone(),
        );
        options.jwks_uri = self.auth_jwks_uri.clone();
        options.protect_routes = self.auth_protect_routes;
        options.enforce_dpop = self.auth_enforce_dpop;
        options.public_base_url = self.public_base_url.clone();
        options.access_token_leeway_seconds = self.access_token_leeway_seconds;
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_env_parsing() {
        assert_eq!(AppEnv::parse("PROD"), AppEnv::Production);
        assert_eq!(AppEnv::parse("production"), AppEnv::Production);
        assert_eq!(AppEnv::parse("staging"), AppEnv::Development);
    }

    #[test]
    fn config_error_display() {
        assert_eq!(
            ConfigError::Missing("AUTH_ISSUER").to_string(),
            "missing configuration: AUTH_ISSUER"
        );
        assert_eq!(
            ConfigError::Invalid("PORT").to_string(),
            "invalid configuration: PORT"
        );
    }
}
