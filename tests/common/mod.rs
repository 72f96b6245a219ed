#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderMap, Request, StatusCode},
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use ed25519_dalek::{Signer, SigningKey};
use jsonwebtoken::jwk::{Jwk, JwkSet};
use serde_json::{Value, json};
use tower::ServiceExt;

use oauth2_dpop::{
    app::build_router,
    services::auth::{
        AuthOptions, Authenticator, NonceSecret, StaticKeySet, dpop::access_token_hash,
        dpop::jwk_thumbprint, replay::InMemoryJtiStore,
    },
    state::AppState,
};

pub const ISSUER: &str = "https://auth.localhost";
pub const AUDIENCE: &str = "https://api.localhost";
pub const HOST: &str = "api.localhost";
pub const KID: &str = "issuer-key";
pub const NONCE_SECRET: [u8; 32] = [0x5a; 32];

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

pub fn issuer_key() -> SigningKey {
    SigningKey::from_bytes(&[1; 32])
}

pub fn client_key() -> SigningKey {
    SigningKey::from_bytes(&[2; 32])
}

pub fn public_jwk(key: &SigningKey) -> Value {
    json!({
        "kty": "OKP",
        "crv": "Ed25519",
        "x": URL_SAFE_NO_PAD.encode(key.verifying_key().to_bytes()),
    })
}

/// The issuer's JWKS document.
pub fn issuer_jwks_json() -> Value {
    let mut jwk = public_jwk(&issuer_key());
    jwk["kid"] = json!(KID);
    jwk["alg"] = json!("EdDSA");
    jwk["use"] = json!("sig");
    json!({ "keys": [jwk] })
}

pub fn issuer_jwks() -> JwkSet {
    serde_json::from_value(issuer_jwks_json()).unwrap()
}

pub fn jkt(key: &SigningKey) -> String {
    let jwk: Jwk = serde_json::from_value(public_jwk(key)).unwrap();
    jwk_thumbprint(&jwk).unwrap()
}

/// Compact JWS signed with Ed25519.
pub fn sign(key: &SigningKey, header: Value, claims: Value) -> String {
    let h = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header).unwrap());
    let p = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
    let input = format!("{h}.{p}");
    let sig = key.sign(input.as_bytes());
    format!("{input}.{}", URL_SAFE_NO_PAD.encode(sig.to_bytes()))
}

/// Access token from the test issuer; `extra` is merged over the defaults.
pub fn access_token(extra: Value) -> String {
    let mut claims = json!({
        "iss": ISSUER,
        "aud": AUDIENCE,
        "sub": "user-123",
        "iat": now(),
        "exp": now() + 300,
    });
    if let (Some(base), Some(extra)) = (claims.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            base.insert(k.clone(), v.clone());
        }
    }
    sign(
        &issuer_key(),
        json!({ "typ": "at+jwt", "alg": "EdDSA", "kid": KID }),
        claims,
    )
}

/// Access token bound to the client key.
pub fn bound_access_token(extra: Value) -> String {
    let mut extra = extra;
    if !extra.is_object() {
        extra = json!({});
    }
    extra["cnf"] = json!({ "jkt": jkt(&client_key()) });
    access_token(extra)
}

pub fn url(path: &str) -> String {
    format!("http://{HOST}{path}")
}

pub fn dpop_proof(method: &str, path: &str, token: &str, nonce: Option<&str>) -> String {
    let key = client_key();
    let mut claims = json!({
        "htm": method,
        "htu": url(path),
        "iat": now(),
        "jti": uuid::Uuid::new_v4().to_string(),
        "ath": access_token_hash(token),
    });
    if let Some(nonce) = nonce {
        claims["nonce"] = json!(nonce);
    }
    sign(
        &key,
        json!({ "typ": "dpop+jwt", "alg": "EdDSA", "jwk": public_jwk(&key) }),
        claims,
    )
}

pub fn options() -> AuthOptions {
    AuthOptions::new(ISSUER, AUDIENCE, NonceSecret::from_bytes(NONCE_SECRET))
}

pub fn app_with(options: AuthOptions) -> Router {
    let auth = Authenticator::new(
        options,
        Arc::new(StaticKeySet::new(issuer_jwks())),
        Arc::new(InMemoryJtiStore::new()),
    )
    .unwrap();
    build_router(AppState::new(Arc::new(auth)))
}

pub fn app() -> Router {
    app_with(options())
}

pub fn get(path: &str) -> axum::http::request::Builder {
    Request::builder()
        .method("GET")
        .uri(path)
        .header("host", HOST)
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

pub async fn send(app: &Router, req: axum::http::request::Builder) -> TestResponse {
    let res = app
        .clone()
        .oneshot(req.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = res.status();
    let headers = res.headers().clone();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    TestResponse {
        status,
        headers,
        body,
    }
}
