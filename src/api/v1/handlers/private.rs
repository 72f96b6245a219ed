/*
 * Responsibility
 * - /private 配下 (認証 middleware の内側)
 * - 要件 (DPoP 必須 / scope) は routes 側の RouteGuard が担い、handler は結果を返すだけ
 */
use axum::Json;
use serde::Serialize;

use crate::api::v1::extractors::AuthCtxExtractor;

#[derive(Debug, Serialize)]
pub struct HelloResponse {
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<&'static str>,
}

impl HelloResponse {
    fn new(message: &'static str) -> Self {
        Self {
            message,
            sub: None,
            token_type: None,
        }
    }
}

/// Answers anonymous callers too when route protection is off.
pub async fn hello(auth: Option<AuthCtxExtractor>) -> Json<HelloResponse> {
    let mut body = HelloResponse::new("Hello from a private endpoint!");
    if let Some(AuthCtxExtractor(ctx)) = auth {
        body.sub = ctx.subject().map(str::to_string);
        body.token_type = Some(ctx.token_type.as_str());
    }
    Json(body)
}

pub async fn bearer(AuthCtxExtractor(ctx): AuthCtxExtractor) -> Json<HelloResponse> {
    let mut body = HelloResponse::new("Hello from a Bearer-protected endpoint!");
    body.sub = ctx.subject().map(str::to_string);
    Json(body)
}

pub async fn dpop(AuthCtxExtractor(ctx): AuthCtxExtractor) -> Json<HelloResponse> {
    let mut body = HelloResponse::new("Hello from a DPoP-protected endpoint!");
    body.sub = ctx.subject().map(str::to_string);
    Json(body)
}

pub async fn scope(AuthCtxExtractor(ctx): AuthCtxExtractor) -> Json<HelloResponse> {
    let mut body = HelloResponse::new("Hello from a scope-protected endpoint!");
    body.sub = ctx.subject().map(str::to_string);
    Json(body)
}
