//! Per-boundary authentication settings.
use thiserror::Error;
use url::Url;

use crate::services::auth::{
    jwks::KeySetError,
    nonce::{NonceSecret, NonceSecretError},
};

const WELL_KNOWN_JWKS_PATH: &str = "/.well-known/jwks.json";

#[derive(Debug, Error)]
pub enum AuthSetupError {
    #[error("'issuer' must be provided")]
    MissingIssuer,

    #[error("'audience' must be provided")]
    MissingAudience,

    #[error("invalid jwks uri '{uri}': {source}")]
    InvalidJwksUri {
        uri: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid nonce secret: {0}")]
    NonceSecret(#[from] NonceSecretError),

    #[error(transparent)]
    KeySet(#[from] KeySetError),
}

/// Settings shared by every request through one protected boundary.
///
/// Only `issuer`, `audience` and the nonce secret are mandatory.
#[derive(Debug, Clone)]
pub struct AuthOptions {
    pub issuer: String,
    pub audience: String,
    /// Defaults to `{issuer}/.well-known/jwks.json`.
    pub jwks_uri: Option<String>,
    pub nonce_secret: NonceSecret,
    /// When false, requests without `Authorization` pass through anonymously
    /// and per-route gates decide.
    pub protect_routes: bool,
    /// Require a DPoP proof for every token, bound or not.
    pub enforce_dpop: bool,
    /// e.g. `https://api.example.com`; overrides forwarded headers when
    /// rebuilding the request URL for `htu`.
    pub public_base_url: Option<String>,
    pub access_token_leeway_seconds: u64,
}

impl AuthOptions {
    pub fn new(
        issuer: impl Into<String>,
        audience: impl Into<String>,
        nonce_secret: NonceSecret,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
            jwks_uri: None,
            nonce_secret,
            protect_routes: true,
            enforce_dpop: false,
            public_base_url: None,
            access_token_leeway_seconds: 0,
        }
    }

    pub fn validate(&self) -> Result<(), AuthSetupError> {
        if self.issuer.trim().is_empty() {
            return Err(AuthSetupError::MissingIssuer);
        }
        if self.audience.trim().is_empty() {
            return Err(AuthSetupError::MissingAudience);
        }
        self.jwks_uri().map(|_| ())
    }

    /// Resolved key-set location.
    pub fn jwks_uri(&self) -> Result<Url, AuthSetupError> {
        match self.jwks_uri.as_deref() {
            Some(uri) => Url::parse(uri).map_err(|source| AuthSetupError::InvalidJwksUri {
                uri: uri.to_string(),
                source,
            }),
            None => Url::parse(&self.issuer)
                .and_then(|issuer| issuer.join(WELL_KNOWN_JWKS_PATH))
                .map_err(|source| AuthSetupError::InvalidJwksUri {
                    uri: self.issuer.clone(),
                    source,
                }),
        }
    }
}
