//! Stateless DPoP-Nonce issuance & decoding.
//!
//! A nonce is a compact JWE (`alg=dir`, `enc=A256GCM`) over a small JWT payload:
//!
//! ```text
//! { "ath": <base64url(SHA-256(access token))>, "iat": <unix>, "exp": <iat + 300> }
//! ```
//!
//! The content key is `SHA-256(secret)`, so every instance configured with the
//! same secret issues and accepts the same nonces. Nothing is stored server-side.
use std::{
    fmt,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use josekit::{
    JoseError,
    jwe::{Dir, JweHeader},
    jwt::{self, JwtPayload},
};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Nonce lifetime, seconds.
pub const NONCE_LIFETIME_SECONDS: i64 = 60 * 5;

/// A nonce with less remaining lifetime than this is proactively replaced.
pub const NONCE_ROTATE_BEFORE_SECONDS: i64 = 60;

const SECRET_LEN: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NonceSecretError {
    #[error("nonce secret is empty")]
    Empty,
    #[error("nonce secret must be 32 bytes (or 64 hex characters), got {0} bytes")]
    Length(usize),
}

/// The 32-byte secret nonces are derived from.
///
/// Accepted textual forms: 64 hex characters (e.g. `openssl rand -hex 32`) or
/// exactly 32 raw bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct NonceSecret([u8; SECRET_LEN]);

impl NonceSecret {
    pub fn from_bytes(bytes: [u8; SECRET_LEN]) -> Self {
        Self(bytes)
    }

    pub fn parse(value: &str) -> Result<Self, NonceSecretError> {
        if value.is_empty() {
            return Err(NonceSecretError::Empty);
        }

        if value.len() == SECRET_LEN * 2
            && let Ok(decoded) = hex::decode(value)
            && let Ok(bytes) = <[u8; SECRET_LEN]>::try_from(decoded.as_slice())
        {
            return Ok(Self(bytes));
        }

        <[u8; SECRET_LEN]>::try_from(value.as_bytes())
            .map(Self)
            .map_err(|_| NonceSecretError::Length(value.len()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for NonceSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print key material
        f.write_str("NonceSecret(..)")
    }
}

#[derive(Debug, Error)]
pub enum NonceError {
    #[error("failed to issue nonce: {0}")]
    Issue(#[source] JoseError),

    // Bad ciphertext, foreign secret and expiry all land here on purpose.
    #[error("failed to decode nonce: {0}")]
    Decode(&'static str),
}

/// Decoded nonce contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonceData {
    pub ath: String,
    pub iat: i64,
    pub exp: i64,
}

impl NonceData {
    pub fn remaining_seconds(&self, now: i64) -> i64 {
        self.exp - now
    }
}

#[derive(Clone)]
pub struct NonceCodec {
    key: [u8; 32],
}

impl fmt::Debug for NonceCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NonceCodec").finish_non_exhaustive()
    }
}

fn to_system_time(unix: i64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(unix.max(0) as u64)
}

fn to_unix(time: SystemTime) -> Option<i64> {
    time.duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_secs() as i64)
}

impl NonceCodec {
    pub fn new(secret: &NonceSecret) -> Self {
        let key: [u8; 32] = Sha256::digest(secret.as_bytes()).into();
        Self { key }
    }

    /// Issue a nonce bound to `ath`, valid for five minutes from now.
    pub fn issue(&self, ath: &str) -> Result<String, NonceError> {
        self.issue_at(ath, chrono::Utc::now().timestamp())
    }

    pub fn issue_at(&self, ath: &str, now: i64) -> Result<String, NonceError> {
        let mut header = JweHeader::new();
        header.set_token_type("JWT");
        header.set_content_encryption("A256GCM");

        let mut payload = JwtPayload::new();
        payload
            .set_claim("ath", Some(Value::String(ath.to_string())))
            .map_err(NonceError::Issue)?;
        payload.set_issued_at(&to_system_time(now));
        payload.set_expires_at(&to_system_time(now + NONCE_LIFETIME_SECONDS));

        let encrypter = Dir
            .encrypter_from_bytes(&self.key)
            .map_err(NonceError::Issue)?;
        jwt::encode_with_encrypter(&payload, &header, &encrypter).map_err(NonceError::Issue)
    }

    /// Decrypt and check a nonce. Fails when the nonce is malformed, was
    /// sealed under another secret, or has expired.
    pub fn open(&self, nonce: &str) -> Result<NonceData, NonceError> {
        self.open_at(nonce, chrono::Utc::now().timestamp())
    }

    pub fn open_at(&self, nonce: &str, now: i64) -> Result<NonceData, NonceError> {
        let decrypter = Dir
            .decrypter_from_bytes(&self.key)
            .map_err(|_| NonceError::Decode("unusable key"))?;

        let (payload, _header) = jwt::decode_with_decrypter(nonce, &decrypter)
            .map_err(|_| NonceError::Decode("decryption failed"))?;

        let exp = payload
            .expires_at()
            .and_then(to_unix)
            .ok_or(NonceError::Decode("missing exp"))?;
        let iat = payload
            .issued_at()
            .and_then(to_unix)
            .ok_or(NonceError::Decode("missing iat"))?;
        let ath = payload
            .claim("ath")
            .and_then(Value::as_str)
            .ok_or(NonceError::Decode("missing ath"))?
            .to_string();

        if exp <= now {
            return Err(NonceError::Decode("expired"));
        }

        Ok(NonceData { ath, iat, exp })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ATH: &str = "cqdoXmRreKgQeXXpRtg4QAi0Ik46wkpVdGMyTr_HmpM";

    fn codec(fill: u8) -> NonceCodec {
        NonceCodec::new(&NonceSecret::from_bytes([fill; 32]))
    }

    #[test]
    fn secret_accepts_hex_and_raw_32_bytes() {
        let hex = "a1b2c3d4e5f6789012345678901234567890abcdef1234567890abcdef123456";
        assert!(NonceSecret::parse(hex).is_ok());
        assert!(NonceSecret::parse("0123456789abcdef0123456789abcdef").is_ok());
    }

    #[test]
    fn secret_rejects_wrong_length() {
        assert_eq!(NonceSecret::parse(""), Err(NonceSecretError::Empty));
        assert_eq!(
            NonceSecret::parse("too-short"),
            Err(NonceSecretError::Length(9))
        );
        // 64 chars but not hex
        let not_hex = "z".repeat(64);
        assert_eq!(
            NonceSecret::parse(&not_hex),
            Err(NonceSecretError::Length(64))
        );
    }

    #[test]
    fn secret_debug_hides_material() {
        let secret = NonceSecret::from_bytes([7; 32]);
        assert_eq!(format!("{secret:?}"), "NonceSecret(..)");
    }

    #[test]
    fn issued_nonce_is_compact_jwe_and_opens() {
        let codec = codec(1);
        let now = chrono::Utc::now().timestamp();

        let nonce = codec.issue_at(ATH, now).unwrap();
        assert_eq!(nonce.split('.').count(), 5);

        let data = codec.open_at(&nonce, now).unwrap();
        assert_eq!(data.ath, ATH);
        assert_eq!(data.iat, now);
        assert_eq!(data.exp, now + NONCE_LIFETIME_SECONDS);
    }

    #[test]
    fn same_secret_derives_interchangeable_codecs() {
        let nonce = codec(3).issue(ATH).unwrap();
        assert_eq!(codec(3).open(&nonce).unwrap().ath, ATH);
    }

    #[test]
    fn nonce_from_another_secret_fails() {
        let nonce = codec(1).issue(ATH).unwrap();
        assert!(matches!(codec(2).open(&nonce), Err(NonceError::Decode(_))));
    }

    #[test]
    fn malformed_nonce_fails() {
        assert!(matches!(
            codec(1).open("this.is.not.a.valid.nonce"),
            Err(NonceError::Decode(_))
        ));
        assert!(matches!(codec(1).open("invalid-nonce"), Err(NonceError::Decode(_))));
    }

    #[test]
    fn expired_nonce_fails() {
        let codec = codec(1);
        let now = chrono::Utc::now().timestamp();
        let nonce = codec
            .issue_at(ATH, now - NONCE_LIFETIME_SECONDS - 10)
            .unwrap();
        assert!(matches!(
            codec.open_at(&nonce, now),
            Err(NonceError::Decode("expired"))
        ));
    }

    #[test]
    fn remaining_lifetime() {
        let data = NonceData {
            ath: ATH.to_string(),
            iat: 100,
            exp: 400,
        };
        assert_eq!(data.remaining_seconds(350), 50);
    }
}
