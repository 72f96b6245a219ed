/*
 * Responsibility
 * - 認証済みリクエストのコンテキスト (AuthCtx) の型
 * - middleware が検証して request extensions に格納し、route gate と handler はこの型だけを受け取る
 */
use jsonwebtoken::Header;

use crate::error::TokenType;
use crate::services::auth::access_jwt::{AccessTokenClaims, VerifiedAccessToken};

/// Identity attached to an authenticated request.
///
/// - `header` / `claims` are exactly what the issuer signed
/// - `token` is the raw access token, e.g. for forwarding downstream
/// - `token_type` is the scheme the client presented it with
#[derive(Debug, Clone)]
pub struct AuthCtx {
    pub header: Header,
    pub claims: AccessTokenClaims,
    pub token: String,
    pub token_type: TokenType,
}

impl AuthCtx {
    pub fn new(verified: VerifiedAccessToken, token_type: TokenType) -> Self {
        Self {
            header: verified.header,
            claims: verified.claims,
            token: verified.token,
            token_type,
        }
    }

    pub fn subject(&self) -> Option<&str> {
        self.claims.sub.as_deref()
    }

    pub fn jkt(&self) -> Option<&str> {
        self.claims.jkt()
    }

    pub fn is_dpop_bound(&self) -> bool {
        self.jkt().is_some()
    }

    /// Scopes granted by the space-delimited `scope` claim. A non-string
    /// `scope` grants nothing.
    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.claims
            .scope
            .as_ref()
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .split_whitespace()
    }

    /// True when every scope in `required` was granted.
    pub fn has_scopes<S: AsRef<str>>(&self, required: &[S]) -> bool {
        required
            .iter()
            .all(|r| self.scopes().any(|s| s == r.as_ref()))
    }
}
