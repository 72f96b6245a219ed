//! DPoP proof validation (RFC 9449) - core logic.
//!
//! This module does not know about Axum. The caller resolves the effective URL,
//! the raw `DPoP` header and the verified access token, then calls
//! [`DpopVerifier::verify`]. Replay protection and the nonce flow run here.
use std::sync::Arc;

use jsonwebtoken::{DecodingKey, Validation, decode, errors::ErrorKind};
use tracing::{debug, error, warn};

use crate::services::auth::{
    dpop::{
        claims::{
            ClaimError, IAT_LEEWAY_SECONDS, require_jti, validate_alg, validate_ath, validate_htm,
            validate_htu, validate_iat, validate_jkt, validate_typ,
        },
        thumbprint::jwk_thumbprint,
        types::{DpopClaims, ProofRequest, VerifiedDpop},
    },
    nonce::{NONCE_ROTATE_BEFORE_SECONDS, NonceCodec, NonceError},
    replay::{JtiRecord, JtiStore, ReplayError},
};

pub const NONCE_REQUIRED: &str = "DPoP 'nonce' claim is required";
pub const NONCE_INVALID: &str = "DPoP 'nonce' is not valid";

#[derive(Debug, thiserror::Error)]
pub enum DpopError {
    /// Proof rejected; the message is client-facing.
    #[error("{0}")]
    Claim(#[from] ClaimError),

    /// Client must retry with `nonce`.
    #[error("{description}")]
    UseNonce {
        nonce: String,
        description: &'static str,
    },

    #[error(transparent)]
    Nonce(#[from] NonceError),

    #[error(transparent)]
    Replay(#[from] ReplayError),
}

pub struct DpopVerifier {
    nonces: NonceCodec,
    jti_store: Arc<dyn JtiStore>,
}

impl std::fmt::Debug for DpopVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DpopVerifier").finish_non_exhaustive()
    }
}

impl DpopVerifier {
    pub fn new(nonces: NonceCodec, jti_store: Arc<dyn JtiStore>) -> Self {
        Self { nonces, jti_store }
    }

    pub async fn verify(&self, req: ProofRequest<'_>) -> Result<VerifiedDpop, DpopError> {
        self.verify_at(req, chrono::Utc::now().timestamp()).await
    }

    /// Verify proof signature + claims as of `now`.
    ///
    /// Every step is a hard gate; the first failure aborts.
    pub async fn verify_at(
        &self,
        req: ProofRequest<'_>,
        now: i64,
    ) -> Result<VerifiedDpop, DpopError> {
        // 1) Signature, with the key embedded in the proof header.
        let header = jsonwebtoken::decode_header(req.proof).map_err(|e| {
            warn!(error = ?e, "invalid DPoP proof header");
            ClaimError::new("Invalid Compact JWS")
        })?;
        validate_alg(header.alg)?;

        let jwk = header
            .jwk
            .as_ref()
            .ok_or_else(|| ClaimError::new("DPoP 'jwk' header is required"))?;
        let decoding_key = DecodingKey::from_jwk(jwk).map_err(|e| {
            warn!(error = ?e, "invalid DPoP jwk");
            ClaimError::new("DPoP 'jwk' header is not a valid public key")
        })?;

        // A proof is not an access token: no exp, no aud, no iss.
        let mut validation = Validation::new(header.alg);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let claims = decode::<DpopClaims>(req.proof, &decoding_key, &validation)
            .map_err(|e| {
                warn!(error = ?e, "invalid DPoP proof");
                match e.kind() {
                    ErrorKind::InvalidSignature => {
                        ClaimError::new("DPoP proof signature is invalid")
                    }
                    ErrorKind::Json(_) => ClaimError::new("DPoP proof claims are malformed"),
                    _ => ClaimError::new("Invalid Compact JWS"),
                }
            })?
            .claims;

        // 2) Header
        validate_typ(header.typ.as_deref())?;

        // 3) sender-constrained: cnf.jkt vs proof jwk thumbprint
        let jkt = jwk_thumbprint(jwk)
            .map_err(|_| ClaimError::new("DPoP 'jwk' header is not a valid public key"))?;
        validate_jkt(&jkt, req.expected_jkt)?;

        // 4) - 7) freshness and request binding
        validate_iat(claims.iat, now)?;
        validate_htm(claims.htm.as_deref(), req.method)?;
        validate_htu(claims.htu.as_deref(), req.url)?;
        validate_ath(claims.ath.as_deref(), req.access_token)?;

        let DpopClaims {
            htm,
            htu,
            iat,
            jti,
            ath,
            nonce,
        } = claims;
        // validated above
        let (htm, htu, iat, ath) = (
            htm.unwrap_or_default(),
            htu.unwrap_or_default(),
            iat.map_or(now, |iat| iat.floor() as i64),
            ath.unwrap_or_default(),
        );

        // 8) nonce
        let fresh_nonce = self.check_nonce(nonce.as_deref(), &ath, now)?;

        // 9) replay
        let jti = require_jti(jti.as_deref())?.to_string();
        // Cover the whole acceptance window of a future-dated proof.
        let record = JtiRecord::new(iat.max(now) + IAT_LEEWAY_SECONDS);

        let first_seen = self
            .jti_store
            .check_and_store(&jti, record)
            .await
            .map_err(|e| {
                error!(error = ?e, "jti store failure");
                DpopError::Replay(e)
            })?;
        if !first_seen {
            warn!(jti = %jti, "DPoP proof replay");
            return Err(ClaimError::new("DPoP 'jti' has already been used").into());
        }

        debug!(jti = %jti, htm = %htm, "DPoP proof verified");

        Ok(VerifiedDpop {
            jti,
            iat,
            htm,
            htu,
            jkt,
            fresh_nonce,
        })
    }

    /// Returns a replacement nonce when the presented one is close to expiry.
    fn check_nonce(
        &self,
        nonce: Option<&str>,
        ath: &str,
        now: i64,
    ) -> Result<Option<String>, DpopError> {
        let Some(nonce) = nonce.filter(|n| !n.is_empty()) else {
            return Err(DpopError::UseNonce {
                nonce: self.nonces.issue_at(ath, now)?,
                description: NONCE_REQUIRED,
            });
        };

        match self.nonces.open_at(nonce, now) {
            Ok(data) if data.ath == ath => {
                if data.remaining_seconds(now) < NONCE_ROTATE_BEFORE_SECONDS {
                    debug!("rotating DPoP nonce");
                    Ok(Some(self.nonces.issue_at(ath, now)?))
                } else {
                    Ok(None)
                }
            }
            Ok(_) => {
                debug!("DPoP nonce bound to another access token");
                Err(DpopError::UseNonce {
                    nonce: self.nonces.issue_at(ath, now)?,
                    description: NONCE_INVALID,
                })
            }
            Err(e) => {
                debug!(error = %e, "DPoP nonce rejected");
                Err(DpopError::UseNonce {
                    nonce: self.nonces.issue_at(ath, now)?,
                    description: NONCE_INVALID,
                })
            }
        }
    }
}
