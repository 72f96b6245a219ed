mod common;

use axum::http::{StatusCode, header};
use serde_json::json;

use common::*;

fn open_app() -> axum::Router {
    let mut options = options();
    options.protect_routes = false;
    app_with(options)
}

#[tokio::test]
async fn anonymous_request_passes_through_when_routes_are_open() {
    let res = send(&open_app(), get("/api/v1/private/hello")).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, json!({ "message": "Hello from a private endpoint!" }));
}

#[tokio::test]
async fn gated_route_still_needs_an_identity() {
    let res = send(&open_app(), get("/api/v1/private/bearer")).await;

    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.header("www-authenticate"), Some("Bearer"));
    assert!(res.body.is_null());
}

#[tokio::test]
async fn malformed_authorization_is_rejected_even_when_open() {
    let res = send(
        &open_app(),
        get("/api/v1/private/hello").header(header::AUTHORIZATION, "Token abc"),
    )
    .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn authenticated_hello_reports_the_subject() {
    let token = access_token(json!({}));
    let res = send(
        &open_app(),
        get("/api/v1/private/hello").header(header::AUTHORIZATION, format!("Bearer {token}")),
    )
    .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["sub"], "user-123");
    assert_eq!(res.body["token_type"], "Bearer");
}

#[tokio::test]
async fn dpop_route_refuses_unbound_tokens() {
    let token = access_token(json!({}));
    let res = send(
        &open_app(),
        get("/api/v1/private/dpop").header(header::AUTHORIZATION, format!("Bearer {token}")),
    )
    .await;

    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        res.body,
        json!({
            "error": "invalid_token",
            "error_description": "The access token needs to be DPoP-bound"
        })
    );
    assert!(res.header("www-authenticate").unwrap().starts_with("DPoP"));
}

#[tokio::test]
async fn scope_route_without_scope_claim() {
    let token = access_token(json!({}));
    let res = send(
        &open_app(),
        get("/api/v1/private/scope").header(header::AUTHORIZATION, format!("Bearer {token}")),
    )
    .await;

    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(
        res.body,
        json!({
            "error": "insufficient_scope",
            "error_description": "The access token has no scopes"
        })
    );
    assert!(res.header("www-authenticate").is_none());
}

#[tokio::test]
async fn scope_claim_that_is_not_a_string_grants_nothing() {
    let token = access_token(json!({ "scope": ["read:profile", "write:profile"] }));
    let res = send(
        &open_app(),
        get("/api/v1/private/scope").header(header::AUTHORIZATION, format!("Bearer {token}")),
    )
    .await;

    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(
        res.body,
        json!({
            "error": "insufficient_scope",
            "error_description": "The access token has no scopes"
        })
    );
}

#[tokio::test]
async fn scope_route_with_partial_scopes() {
    let token = access_token(json!({ "scope": "openid read:profile" }));
    let res = send(
        &open_app(),
        get("/api/v1/private/scope").header(header::AUTHORIZATION, format!("Bearer {token}")),
    )
    .await;

    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(
        res.body["error_description"],
        "Required scopes are: 'read:profile write:profile'"
    );
}

#[tokio::test]
async fn scope_route_with_superset() {
    let token = access_token(json!({ "scope": "write:profile openid read:profile" }));
    let res = send(
        &open_app(),
        get("/api/v1/private/scope").header(header::AUTHORIZATION, format!("Bearer {token}")),
    )
    .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["message"], "Hello from a scope-protected endpoint!");
}

#[tokio::test]
async fn dpop_bound_request_passes_the_dpop_gate() {
    let app = open_app();
    let token = bound_access_token(json!({}));
    let path = "/api/v1/private/dpop";

    let first = send(
        &app,
        get(path)
            .header(header::AUTHORIZATION, format!("DPoP {token}"))
            .header("dpop", dpop_proof("GET", path, &token, None)),
    )
    .await;
    let nonce = first.header("dpop-nonce").unwrap().to_string();

    let res = send(
        &app,
        get(path)
            .header(header::AUTHORIZATION, format!("DPoP {token}"))
            .header("dpop", dpop_proof("GET", path, &token, Some(&nonce))),
    )
    .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["message"], "Hello from a DPoP-protected endpoint!");
}
