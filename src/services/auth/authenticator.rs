/*
 * Responsibility
 * - リクエスト単位の認証フロー: Authorization 解析 → access token 検証 → (必要なら) DPoP proof 検証
 * - 下位レイヤのエラーを AuthError (wire format) に変換する
 * - HTTP フレームワーク非依存 (middleware が AuthRequest を組み立てて呼ぶ)
 */
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::error::{AuthError, TokenType};
use crate::services::auth::{
    access_jwt::{AccessTokenError, AccessTokenVerifier},
    dpop::{DpopError, DpopVerifier, ProofRequest},
    identity::AuthCtx,
    jwks::{KeySetProvider, RemoteJwks},
    nonce::NonceCodec,
    options::{AuthOptions, AuthSetupError},
    replay::JtiStore,
};

pub const TOKEN_EXPIRED: &str = "The access token is expired";
pub const TOKEN_INVALID: &str = "The access token is invalid";
pub const TOKEN_NOT_BOUND: &str = "The access token needs to be DPoP-bound";
pub const BOUND_TOKEN_AS_BEARER: &str =
    "DPoP-bound access tokens must be used with a DPoP authorization header";
pub const PROOF_MISSING: &str = "DPoP header is required when using DPoP token type";

/// The parts of an inbound request authentication looks at.
#[derive(Debug, Clone, Copy)]
pub struct AuthRequest<'a> {
    pub method: &'a str,
    /// Effective request URL (scheme + host + path).
    pub url: &'a str,
    pub authorization: Option<&'a str>,
    pub dpop: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct Authenticated {
    pub ctx: AuthCtx,
    /// Replacement nonce to return as `DPoP-Nonce`.
    pub dpop_nonce: Option<String>,
}

pub struct Authenticator {
    options: AuthOptions,
    access: AccessTokenVerifier,
    dpop: DpopVerifier,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("options", &self.options)
            .field("access", &self.access)
            .finish_non_exhaustive()
    }
}

/// `<scheme> <token>`; the scheme is case-sensitive.
pub fn parse_authorization(value: &str) -> Option<(TokenType, &str)> {
    let mut parts = value.split(' ');
    let scheme = match parts.next()? {
        "Bearer" => TokenType::Bearer,
        "DPoP" => TokenType::DPoP,
        _ => return None,
    };
    let token = parts.next().filter(|t| !t.is_empty())?;
    Some((scheme, token))
}

impl Authenticator {
    /// Build with the remote key set derived from `options`.
    pub fn from_options(
        options: AuthOptions,
        jti_store: Arc<dyn JtiStore>,
    ) -> Result<Self, AuthSetupError> {
        let jwks_uri = options.jwks_uri()?;
        let keys = RemoteJwks::new(jwks_uri.as_str())?;
        Self::new(options, Arc::new(keys), jti_store)
    }

    pub fn new(
        options: AuthOptions,
        keys: Arc<dyn KeySetProvider>,
        jti_store: Arc<dyn JtiStore>,
    ) -> Result<Self, AuthSetupError> {
        options.validate()?;

        let access = AccessTokenVerifier::new(
            keys,
            options.issuer.clone(),
            options.audience.clone(),
            options.access_token_leeway_seconds,
        );
        let dpop = DpopVerifier::new(NonceCodec::new(&options.nonce_secret), jti_store);

        Ok(Self {
            options,
            access,
            dpop,
        })
    }

    pub fn options(&self) -> &AuthOptions {
        &self.options
    }

    fn realm(&self) -> &str {
        &self.options.audience
    }

    /// Authenticate one request.
    ///
    /// Returns:
    /// - Ok(Some(_)) => authenticated
    /// - Ok(None)    => anonymous pass-through (`protect_routes = false`, no `Authorization`)
    /// - Err(_)      => rejected; render as-is
    pub async fn authenticate(
        &self,
        req: AuthRequest<'_>,
    ) -> Result<Option<Authenticated>, AuthError> {
        let Some(authorization) = req.authorization else {
            if !self.options.protect_routes {
                return Ok(None);
            }
            debug!("missing authorization header");
            return Err(AuthError::unauthorized(self.realm()));
        };

        let (token_type, token) = parse_authorization(authorization).ok_or_else(|| {
            debug!("unparseable authorization header");
            AuthError::unauthorized(self.realm())
        })?;

        let verified = self.access.verify(token).await.map_err(|err| {
            self.log_token_failure(&err);
            let description = if err.is_expired() {
                TOKEN_EXPIRED
            } else {
                TOKEN_INVALID
            };
            AuthError::invalid_token(TokenType::Bearer, self.realm(), description)
        })?;

        let jkt = verified.claims.jkt().map(str::to_string);
        let proof_required =
            self.options.enforce_dpop || jkt.is_some() || token_type == TokenType::DPoP;

        let mut dpop_nonce = None;
        if proof_required {
            let Some(jkt) = jkt.as_deref() else {
                warn!("DPoP required but access token is not bound");
                return Err(AuthError::invalid_token(
                    TokenType::DPoP,
                    self.realm(),
                    TOKEN_NOT_BOUND,
                ));
            };

            if token_type != TokenType::DPoP {
                warn!("DPoP-bound access token presented as Bearer");
                return Err(AuthError::invalid_request(
                    TokenType::Bearer,
                    self.realm(),
                    BOUND_TOKEN_AS_BEARER,
                ));
            }

            let Some(proof) = req.dpop else {
                warn!("missing DPoP proof");
                return Err(AuthError::invalid_request(
                    TokenType::DPoP,
                    self.realm(),
                    PROOF_MISSING,
                ));
            };

            let proof = self
                .dpop
                .verify(ProofRequest {
                    method: req.method,
                    url: req.url,
                    proof,
                    access_token: token,
                    expected_jkt: jkt,
                })
                .await
                .map_err(|err| self.proof_error(err))?;

            dpop_nonce = proof.fresh_nonce;
        }

        debug!(
            sub = ?verified.claims.sub,
            token_type = token_type.as_str(),
            "request authenticated"
        );

        Ok(Some(Authenticated {
            ctx: AuthCtx::new(verified, token_type),
            dpop_nonce,
        }))
    }

    fn log_token_failure(&self, err: &AccessTokenError) {
        match err {
            AccessTokenError::KeySet(e) => error!(error = ?e, "key set unavailable"),
            _ => warn!(error = ?err, "access token verification failed"),
        }
    }

    fn proof_error(&self, err: DpopError) -> AuthError {
        match err {
            DpopError::Claim(claim) => {
                warn!(error = %claim, "dpop verification failed");
                AuthError::invalid_dpop_proof(self.realm(), claim.into_message())
            }
            DpopError::UseNonce { nonce, description } => {
                debug!(reason = description, "asking client for a DPoP nonce");
                AuthError::use_dpop_nonce(nonce, description)
            }
            DpopError::Nonce(e) => {
                error!(error = ?e, "nonce issuance failed");
                AuthError::ServerError
            }
            DpopError::Replay(e) => {
                error!(error = ?e, "replay store unavailable");
                AuthError::ServerError
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_schemes() {
        assert_eq!(
            parse_authorization("Bearer abc"),
            Some((TokenType::Bearer, "abc"))
        );
        assert_eq!(
            parse_authorization("DPoP abc"),
            Some((TokenType::DPoP, "abc"))
        );
    }

    #[test]
    fn rejects_unknown_or_incomplete_headers() {
        assert_eq!(parse_authorization("Basic abc"), None);
        assert_eq!(parse_authorization("bearer abc"), None);
        assert_eq!(parse_authorization("Bearer"), None);
        assert_eq!(parse_authorization("Bearer "), None);
        assert_eq!(parse_authorization(""), None);
    }
}
