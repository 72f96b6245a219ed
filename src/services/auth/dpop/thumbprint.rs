//! RFC 7638 JWK thumbprints and RFC 9449 access-token hashes.
use std::collections::BTreeMap;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::jwk::{AlgorithmParameters, EllipticCurve, Jwk};
use sha2::{Digest, Sha256};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ThumbprintError {
    #[error("unsupported jwk for DPoP")]
    UnsupportedJwk,
}

fn sha256_b64url(input: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(input))
}

/// `base64url(SHA-256(access_token))`, the value a proof's `ath` must carry.
pub fn access_token_hash(access_token: &str) -> String {
    sha256_b64url(access_token.as_bytes())
}

/// SHA-256 thumbprint of a public JWK.
///
/// Only the required members take part, serialized with lexicographically
/// ordered keys and no whitespace.
pub fn jwk_thumbprint(jwk: &Jwk) -> Result<String, ThumbprintError> {
    let mut members: BTreeMap<&str, &str> = BTreeMap::new();

    match &jwk.algorithm {
        AlgorithmParameters::EllipticCurve(params) => {
            // `EllipticCurve` does not implement Display/ToString, so match explicitly.
            let crv = match params.curve {
                EllipticCurve::P256 => "P-256",
                EllipticCurve::P384 => "P-384",
                EllipticCurve::P521 => "P-521",
                _ => return Err(ThumbprintError::UnsupportedJwk),
            };
            members.insert("crv", crv);
            members.insert("kty", "EC");
            members.insert("x", &params.x);
            members.insert("y", &params.y);
        }
        AlgorithmParameters::RSA(params) => {
            members.insert("e", &params.e);
            members.insert("kty", "RSA");
            members.insert("n", &params.n);
        }
        AlgorithmParameters::OctetKeyPair(params) => {
            let crv = match params.curve {
                EllipticCurve::Ed25519 => "Ed25519",
                _ => return Err(ThumbprintError::UnsupportedJwk),
            };
            members.insert("crv", crv);
            members.insert("kty", "OKP");
            members.insert("x", &params.x);
        }
        // Symmetric keys never identify a DPoP key holder.
        _ => return Err(ThumbprintError::UnsupportedJwk),
    }

    let canonical =
        serde_json::to_string(&members).map_err(|_| ThumbprintError::UnsupportedJwk)?;
    Ok(sha256_b64url(canonical.as_bytes()))
}
