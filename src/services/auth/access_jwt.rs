use std::sync::Arc;

use jsonwebtoken::{
    Algorithm, DecodingKey, Header, Validation,
    errors::ErrorKind,
    jwk::{Jwk, JwkSet},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::services::auth::jwks::{KeySetError, KeySetProvider};

/// Algorithms accepted for access tokens. HMAC is never accepted: the key set
/// is public.
const ACCESS_TOKEN_ALGORITHMS: &[Algorithm] = &[
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
    Algorithm::ES256,
    Algorithm::ES384,
    Algorithm::EdDSA,
];

// Errors returned by access-token verification.
#[derive(Debug, Error)]
pub enum AccessTokenError {
    #[error("malformed access token: {0}")]
    Malformed(#[source] jsonwebtoken::errors::Error),

    #[error("unsupported access token alg: {0:?}")]
    UnsupportedAlg(Algorithm),

    #[error(transparent)]
    KeySet(#[from] KeySetError),

    #[error("no key with kid '{0}' in key set")]
    UnknownKid(String),

    #[error("no key in key set verifies the access token")]
    NoMatchingKey,

    #[error("access token expired")]
    Expired,

    #[error("jwt verification failed: {0}")]
    Jwt(#[source] jsonwebtoken::errors::Error),
}

impl AccessTokenError {
    pub fn is_expired(&self) -> bool {
        matches!(self, AccessTokenError::Expired)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CnfClaim {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jkt: Option<String>,
}

/// Access token (JWT) claims.
///
/// NOTE:
/// - `aud` can be either string or array; jsonwebtoken validates it via `Validation::set_audience`.
/// - Claims this type does not name are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub iss: String,
    // Keep as Value to accept both string and array.
    #[serde(default)]
    pub aud: serde_json::Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    // NumericDate; may be fractional.
    pub exp: serde_json::Number,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<serde_json::Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<serde_json::Number>,

    // Space-separated string when well-formed; any other shape grants no scopes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cnf: Option<CnfClaim>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AccessTokenClaims {
    /// `cnf.jkt`, when the token is bound to a DPoP key.
    pub fn jkt(&self) -> Option<&str> {
        self.cnf
            .as_ref()
            .and_then(|c| c.jkt.as_deref())
            .filter(|jkt| !jkt.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct VerifiedAccessToken {
    pub header: Header,
    pub claims: AccessTokenClaims,
    pub token: String,
}

/// Verifies access tokens against the issuer's key set.
#[derive(Clone)]
pub struct AccessTokenVerifier {
    keys: Arc<dyn KeySetProvider>,
    issuer: String,
    audience: String,
    leeway_seconds: u64,
}

impl std::fmt::Debug for AccessTokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessTokenVerifier")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("leeway_seconds", &self.leeway_seconds)
            .finish_non_exhaustive()
    }
}

impl AccessTokenVerifier {
    pub fn new(
        keys: Arc<dyn KeySetProvider>,
        issuer: impl Into<String>,
        audience: impl Into<String>,
        leeway_seconds: u64,
    ) -> Self {
        Self {
            keys,
            issuer: issuer.into(),
            audience: audience.into(),
            leeway_seconds,
        }
    }

    fn validation(&self, alg: Algorithm) -> Validation {
        let mut validation = Validation::new(alg);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation.validate_nbf = true;
        validation.leeway = self.leeway_seconds;
        validation
    }

    /// Verify signature, `iss`, `aud`, `exp` (and `nbf` when present).
    pub async fn verify(&self, token: &str) -> Result<VerifiedAccessToken, AccessTokenError> {
        let header = jsonwebtoken::decode_header(token).map_err(AccessTokenError::Malformed)?;

        if !ACCESS_TOKEN_ALGORITHMS.contains(&header.alg) {
            return Err(AccessTokenError::UnsupportedAlg(header.alg));
        }

        let candidates = self.candidate_keys(header.kid.as_deref()).await?;
        let validation = self.validation(header.alg);

        let mut last_err = None;
        for jwk in &candidates {
            let decoding_key = match DecodingKey::from_jwk(jwk) {
                Ok(key) => key,
                Err(e) => {
                    debug!(error = ?e, kid = ?jwk.common.key_id, "skipping unusable jwk");
                    continue;
                }
            };

            match jsonwebtoken::decode::<AccessTokenClaims>(token, &decoding_key, &validation) {
                Ok(data) => {
                    return Ok(VerifiedAccessToken {
                        header,
                        claims: data.claims,
                        token: token.to_string(),
                    });
                }
                Err(e) => match e.kind() {
                    // Signature already verified by the time exp is checked.
                    ErrorKind::ExpiredSignature => return Err(AccessTokenError::Expired),
                    // Wrong key for this token; try the next one.
                    ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                        last_err = Some(e);
                    }
                    _ => return Err(AccessTokenError::Jwt(e)),
                },
            }
        }

        match last_err {
            Some(e) if header.kid.is_some() => Err(AccessTokenError::Jwt(e)),
            _ => Err(AccessTokenError::NoMatchingKey),
        }
    }

    /// Keys to try: the one named by `kid`, or every key when there is no `kid`.
    async fn candidate_keys(&self, kid: Option<&str>) -> Result<Vec<Jwk>, AccessTokenError> {
        let set = self.keys.key_set().await?;

        let Some(kid) = kid else {
            return Ok(set.keys);
        };

        if let Some(jwk) = set.find(kid) {
            return Ok(vec![jwk.clone()]);
        }

        // Unknown kid: the issuer may have rotated keys.
        warn!(kid, "kid not in cached key set, refreshing");
        let refreshed: JwkSet = self.keys.refresh().await?;
        refreshed
            .find(kid)
            .cloned()
            .map(|jwk| vec![jwk])
            .ok_or_else(|| AccessTokenError::UnknownKid(kid.to_string()))
    }
}
