//! DPoP proof claim validators.
//!
//! Each validator is a pure function returning `Ok(())` or a `ClaimError`
//! whose message goes to the client verbatim as the `invalid_dpop_proof`
//! description, so the wording is part of the contract.
use std::fmt;

use jsonwebtoken::Algorithm;

use crate::services::auth::dpop::thumbprint::access_token_hash;

/// Allowed `iat` drift in either direction, seconds.
pub const IAT_LEEWAY_SECONDS: i64 = 30;

pub const DPOP_TYP: &str = "dpop+jwt";

/// Asymmetric algorithms accepted for proof signatures.
pub const SUPPORTED_ALGORITHMS: &[Algorithm] = &[
    Algorithm::ES256,
    Algorithm::ES384,
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
    Algorithm::EdDSA,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimError(String);

impl ClaimError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }

    pub fn into_message(self) -> String {
        self.0
    }
}

impl fmt::Display for ClaimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ClaimError {}

pub type ClaimResult<T = ()> = Result<T, ClaimError>;

fn required<'a>(value: Option<&'a str>, claim: &str) -> ClaimResult<&'a str> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ClaimError::new(format!("DPoP '{claim}' claim is required"))),
    }
}

pub fn validate_typ(typ: Option<&str>) -> ClaimResult {
    if typ != Some(DPOP_TYP) {
        return Err(ClaimError::new("DPoP 'typ' header must be 'dpop+jwt'"));
    }
    Ok(())
}

pub fn validate_alg(alg: Algorithm) -> ClaimResult {
    if !SUPPORTED_ALGORITHMS.contains(&alg) {
        return Err(ClaimError::new(format!(
            "DPoP 'alg' header '{alg:?}' is not supported"
        )));
    }
    Ok(())
}

/// `proof_jkt` is the thumbprint of the proof's embedded key, `token_jkt`
/// the access token's `cnf.jkt`.
pub fn validate_jkt(proof_jkt: &str, token_jkt: &str) -> ClaimResult {
    if proof_jkt != token_jkt {
        return Err(ClaimError::new(format!(
            "DPoP 'jkt' mismatch: expected '{proof_jkt}', got '{token_jkt}'"
        )));
    }
    Ok(())
}

/// `iat` is a NumericDate and may carry a fractional part.
pub fn validate_iat(iat: Option<f64>, now: i64) -> ClaimResult {
    let iat = iat.ok_or_else(|| ClaimError::new("DPoP 'iat' claim is required"))?;

    let lower = now - IAT_LEEWAY_SECONDS;
    let upper = now + IAT_LEEWAY_SECONDS;

    if iat < lower as f64 || iat > upper as f64 {
        return Err(ClaimError::new(format!(
            "DPoP 'iat' is not within acceptable time range: expected between {lower} and {upper}, got {iat}"
        )));
    }
    Ok(())
}

pub fn validate_htm(htm: Option<&str>, method: &str) -> ClaimResult {
    let htm = required(htm, "htm")?;
    let expected = method.to_ascii_uppercase();

    if !htm.eq_ignore_ascii_case(&expected) {
        return Err(ClaimError::new(format!(
            "DPoP 'htm' mismatch: expected '{expected}', got '{htm}'"
        )));
    }
    Ok(())
}

pub fn validate_htu(htu: Option<&str>, expected_url: &str) -> ClaimResult {
    let htu = required(htu, "htu")?;

    if htu != expected_url {
        return Err(ClaimError::new(format!(
            "DPoP 'htu' mismatch: expected \"{expected_url}\", got \"{htu}\""
        )));
    }
    Ok(())
}

pub fn validate_ath(ath: Option<&str>, access_token: &str) -> ClaimResult {
    let ath = required(ath, "ath")?;
    let expected = access_token_hash(access_token);

    if ath != expected {
        return Err(ClaimError::new(format!(
            "DPoP 'ath' mismatch: expected '{expected}', got '{ath}'"
        )));
    }
    Ok(())
}

pub fn require_jti(jti: Option<&str>) -> ClaimResult<&str> {
    required(jti, "jti")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typ_must_be_dpop_jwt() {
        assert!(validate_typ(Some("dpop+jwt")).is_ok());
        for typ in [None, Some("JWT"), Some("DPOP+JWT")] {
            assert_eq!(
                validate_typ(typ).unwrap_err().message(),
                "DPoP 'typ' header must be 'dpop+jwt'"
            );
        }
    }

    #[test]
    fn symmetric_alg_is_rejected() {
        assert!(validate_alg(Algorithm::ES256).is_ok());
        assert!(validate_alg(Algorithm::EdDSA).is_ok());
        assert_eq!(
            validate_alg(Algorithm::HS256).unwrap_err().message(),
            "DPoP 'alg' header 'HS256' is not supported"
        );
    }

    #[test]
    fn jkt_mismatch_names_both_thumbprints() {
        assert!(validate_jkt("abc", "abc").is_ok());
        assert_eq!(
            validate_jkt("proof-jkt", "invalid-jkt").unwrap_err().message(),
            "DPoP 'jkt' mismatch: expected 'proof-jkt', got 'invalid-jkt'"
        );
    }

    #[test]
    fn iat_window_is_symmetric() {
        let now = 1_000_000;
        assert!(validate_iat(Some(1_000_000.0), now).is_ok());
        assert!(validate_iat(Some(999_970.0), now).is_ok());
        assert!(validate_iat(Some(1_000_030.0), now).is_ok());

        assert_eq!(
            validate_iat(Some(999_969.0), now).unwrap_err().message(),
            "DPoP 'iat' is not within acceptable time range: expected between 999970 and 1000030, got 999969"
        );
        assert!(validate_iat(Some(1_000_031.0), now).is_err());
        assert_eq!(
            validate_iat(None, now).unwrap_err().message(),
            "DPoP 'iat' claim is required"
        );
    }

    #[test]
    fn fractional_iat_is_a_plain_number() {
        let now = 1_000_000;
        assert!(validate_iat(Some(1_000_000.5), now).is_ok());
        assert!(validate_iat(Some(1_000_029.9), now).is_ok());
        assert!(validate_iat(Some(999_970.0), now).is_ok());

        assert_eq!(
            validate_iat(Some(1_000_030.5), now).unwrap_err().message(),
            "DPoP 'iat' is not within acceptable time range: expected between 999970 and 1000030, got 1000030.5"
        );
        assert!(validate_iat(Some(999_969.5), now).is_err());
    }

    #[test]
    fn htm_is_case_insensitive() {
        assert!(validate_htm(Some("GET"), "GET").is_ok());
        assert!(validate_htm(Some("get"), "GET").is_ok());
        assert_eq!(
            validate_htm(Some("POST"), "get").unwrap_err().message(),
            "DPoP 'htm' mismatch: expected 'GET', got 'POST'"
        );
        assert_eq!(
            validate_htm(None, "GET").unwrap_err().message(),
            "DPoP 'htm' claim is required"
        );
    }

    #[test]
    fn htu_must_match_exactly() {
        let url = "http://api.localhost/private/dpop";
        assert!(validate_htu(Some(url), url).is_ok());
        assert_eq!(
            validate_htu(Some("http://api.localhost/private/dpop?x=1"), url)
                .unwrap_err()
                .message(),
            "DPoP 'htu' mismatch: expected \"http://api.localhost/private/dpop\", got \"http://api.localhost/private/dpop?x=1\""
        );
        assert_eq!(
            validate_htu(Some(""), url).unwrap_err().message(),
            "DPoP 'htu' claim is required"
        );
    }

    #[test]
    fn ath_binds_access_token() {
        let token = "eyJ.token.sig";
        let ath = access_token_hash(token);
        assert!(validate_ath(Some(&ath), token).is_ok());

        let err = validate_ath(Some("nope"), token).unwrap_err();
        assert_eq!(
            err.message(),
            format!("DPoP 'ath' mismatch: expected '{ath}', got 'nope'")
        );
        assert_eq!(
            validate_ath(None, token).unwrap_err().message(),
            "DPoP 'ath' claim is required"
        );
    }

    #[test]
    fn jti_is_required() {
        assert_eq!(require_jti(Some("id-1")).unwrap(), "id-1");
        assert_eq!(
            require_jti(None).unwrap_err().message(),
            "DPoP 'jti' claim is required"
        );
    }
}
