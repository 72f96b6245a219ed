use serde::Deserialize;

/// DPoP proof JWT claims. Everything is optional at parse time so a missing
/// claim surfaces as a claim error rather than a decode failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DpopClaims {
    pub htm: Option<String>,   // HTTP method
    pub htu: Option<String>,   // HTTP URI (absolute, no query)
    pub iat: Option<f64>,      // issued at (NumericDate, may be fractional)
    pub jti: Option<String>,   // unique proof ID (replay detection)
    pub ath: Option<String>,   // base64url(SHA-256(access_token))
    pub nonce: Option<String>, // server-issued nonce
}

/// What the verifier needs to know about the request being proven.
#[derive(Debug, Clone, Copy)]
pub struct ProofRequest<'a> {
    pub method: &'a str,
    /// Effective request URL, see `htu::effective_url`.
    pub url: &'a str,
    /// Raw `DPoP` header value.
    pub proof: &'a str,
    pub access_token: &'a str,
    /// `cnf.jkt` of the already verified access token.
    pub expected_jkt: &'a str,
}

/// Result of successful DPoP verification
#[derive(Debug, Clone)]
pub struct VerifiedDpop {
    pub jti: String,
    pub iat: i64,
    pub htm: String,
    pub htu: String,
    pub jkt: String,
    /// Replacement nonce to hand back when the presented one is about to expire.
    pub fresh_nonce: Option<String>,
}
