/*
 * Responsibility
 * - 認証/認可の失敗をひとつの AuthError に集約する
 * - IntoResponse 実装 (HTTP status / WWW-Authenticate / DPoP-Nonce / JSON error body)
 * - 下位レイヤのエラー (AccessTokenError, NonceError, ReplayError ...) はここへ変換してから返す
 */
use axum::{
    Json,
    http::{HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Response header carrying a server-issued DPoP nonce.
pub const DPOP_NONCE_HEADER: HeaderName = HeaderName::from_static("dpop-nonce");

/// Authorization scheme named in a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    Bearer,
    DPoP,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Bearer => "Bearer",
            TokenType::DPoP => "DPoP",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub error_description: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// No usable credential. `realm` is `None` for the route gate's bare challenge.
    #[error("unauthorized")]
    Unauthorized { realm: Option<String> },

    #[error("invalid_token: {description}")]
    InvalidToken {
        scheme: TokenType,
        realm: Option<String>,
        description: String,
    },

    #[error("invalid_request: {description}")]
    InvalidRequest {
        scheme: TokenType,
        realm: String,
        description: String,
    },

    #[error("invalid_dpop_proof: {description}")]
    InvalidDpopProof { realm: String, description: String },

    /// Not a hard failure: the client should retry with `nonce`.
    #[error("use_dpop_nonce: {description}")]
    UseDpopNonce { nonce: String, description: String },

    #[error("insufficient_scope: {description}")]
    InsufficientScope { description: String },

    #[error("server error")]
    ServerError,
}

impl AuthError {
    pub fn unauthorized(realm: impl Into<String>) -> Self {
        Self::Unauthorized {
            realm: Some(realm.into()),
        }
    }

    pub fn invalid_token(
        scheme: TokenType,
        realm: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self::InvalidToken {
            scheme,
            realm: Some(realm.into()),
            description: description.into(),
        }
    }

    pub fn invalid_request(
        scheme: TokenType,
        realm: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self::InvalidRequest {
            scheme,
            realm: realm.into(),
            description: description.into(),
        }
    }

    pub fn invalid_dpop_proof(realm: impl Into<String>, description: impl Into<String>) -> Self {
        Self::InvalidDpopProof {
            realm: realm.into(),
            description: description.into(),
        }
    }

    pub fn use_dpop_nonce(nonce: impl Into<String>, description: impl Into<String>) -> Self {
        Self::UseDpopNonce {
            nonce: nonce.into(),
            description: description.into(),
        }
    }

    pub fn insufficient_scope(description: impl Into<String>) -> Self {
        Self::InsufficientScope {
            description: description.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Unauthorized { .. }
            | AuthError::InvalidToken { .. }
            | AuthError::UseDpopNonce { .. } => StatusCode::UNAUTHORIZED,
            AuthError::InvalidRequest { .. } | AuthError::InvalidDpopProof { .. } => {
                StatusCode::BAD_REQUEST
            }
            AuthError::InsufficientScope { .. } => StatusCode::FORBIDDEN,
            AuthError::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code, `None` for a bare challenge.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            AuthError::Unauthorized { .. } => None,
            AuthError::InvalidToken { .. } => Some("invalid_token"),
            AuthError::InvalidRequest { .. } => Some("invalid_request"),
            AuthError::InvalidDpopProof { .. } => Some("invalid_dpop_proof"),
            AuthError::UseDpopNonce { .. } => Some("use_dpop_nonce"),
            AuthError::InsufficientScope { .. } => Some("insufficient_scope"),
            AuthError::ServerError => Some("server_error"),
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            AuthError::Unauthorized { .. } => None,
            AuthError::InvalidToken { description, .. }
            | AuthError::InvalidRequest { description, .. }
            | AuthError::InvalidDpopProof { description, .. }
            | AuthError::UseDpopNonce { description, .. }
            | AuthError::InsufficientScope { description } => Some(description),
            AuthError::ServerError => Some("There was an unknown error"),
        }
    }

    /// Renders the `WWW-Authenticate` challenge, if this failure carries one.
    pub fn www_authenticate(&self) -> Option<String> {
        let (scheme, realm) = match self {
            AuthError::Unauthorized { realm } => (TokenType::Bearer, realm.as_deref()),
            AuthError::InvalidToken { scheme, realm, .. } => (*scheme, realm.as_deref()),
            AuthError::InvalidRequest { scheme, realm, .. } => (*scheme, Some(realm.as_str())),
            AuthError::InvalidDpopProof { realm, .. } => (TokenType::DPoP, Some(realm.as_str())),
            AuthError::UseDpopNonce { .. } => (TokenType::DPoP, None),
            AuthError::InsufficientScope { .. } | AuthError::ServerError => return None,
        };

        let mut params = Vec::with_capacity(2);
        if let Some(realm) = realm {
            params.push(format!("realm=\"{}\"", quote(realm)));
        }
        if let (Some(code), Some(description)) = (self.code(), self.description()) {
            params.push(format!(
                "error=\"{}\", error_description=\"{}\"",
                code,
                quote(description)
            ));
        }

        if params.is_empty() {
            Some(scheme.as_str().to_string())
        } else {
            Some(format!("{} {}", scheme.as_str(), params.join(" ")))
        }
    }
}

// quoted-string escaping; anything a header value cannot carry becomes '?'.
fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            ' '..='~' => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let challenge = self.www_authenticate();

        let mut response = match (self.code(), self.description()) {
            (Some(code), Some(description)) if !matches!(self, AuthError::Unauthorized { .. }) => {
                let body = ErrorResponse {
                    error: code,
                    error_description: description.to_string(),
                };
                (status, Json(body)).into_response()
            }
            _ => status.into_response(),
        };

        let headers = response.headers_mut();
        if let Some(challenge) = challenge {
            match HeaderValue::from_str(&challenge) {
                Ok(value) => {
                    headers.insert(header::WWW_AUTHENTICATE, value);
                }
                Err(e) => tracing::error!(error = %e, "unrepresentable WWW-Authenticate challenge"),
            }
        }
        if let AuthError::UseDpopNonce { nonce, .. } = &self {
            match HeaderValue::from_str(nonce) {
                Ok(value) => {
                    headers.insert(DPOP_NONCE_HEADER, value);
                }
                Err(e) => tracing::error!(error = %e, "unrepresentable DPoP-Nonce value"),
            }
        }

        response
    }
}
