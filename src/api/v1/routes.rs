/*
 * Responsibility
 * - v1 の URL 構造を定義
 * - /health, /public, /private を nest
 * - 認証 (access) は /private 全体、要件 (protected) は route ごとに route_layer で掛ける
 */
use axum::{Router, routing::get};

use crate::api::v1::handlers::{health::health, private, public};
use crate::middleware::auth::{access, protected};
use crate::services::auth::RouteGuard;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let public = Router::new().route("/hello", get(public::hello));

    let private = Router::new()
        .route("/hello", get(private::hello))
        .merge(protected(
            Router::new().route("/bearer", get(private::bearer)),
            RouteGuard::new(),
        ))
        .merge(protected(
            Router::new().route("/dpop", get(private::dpop)),
            RouteGuard::new().enforce_dpop(),
        ))
        .merge(protected(
            Router::new().route("/scope", get(private::scope)),
            RouteGuard::new().require_scopes(["read:profile", "write:profile"]),
        ));
    let private = access::apply(private, state);

    Router::new()
        .route("/health", get(health))
        .nest("/public", public)
        .nest("/private", private)
}
