//! access token (JWT + DPoP) 検証 → AuthCtx を extensions に入れる
//!
//! - `Authorization` / `DPoP` ヘッダと実効 URL から `AuthRequest` を組み立てて `Authenticator` に渡す
//! - 成功時に nonce がローテーションされた場合は `DPoP-Nonce` を response に付ける

use axum::{
    Router,
    extract::{OriginalUri, Request, State},
    http::{HeaderValue, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
};

use crate::error::DPOP_NONCE_HEADER;
use crate::services::auth::{AuthRequest, dpop::effective_url};
use crate::state::AppState;

const DPOP_HEADER: &str = "dpop";

/// Apply authentication to every route of `router`.
///
/// 例：
/// ```ignore
/// let private = middleware::auth::access::apply(private, state.clone());
/// ```
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    // axum 0.8 の from_fn は State extractor を受け取れないため、`from_fn_with_state` で明示的に state を渡す
    router.layer(middleware::from_fn_with_state(state, access_middleware))
}

async fn access_middleware(
    State(state): State<AppState>,
    OriginalUri(original_uri): OriginalUri,
    req: Request,
    next: Next,
) -> Response {
    // Work on the parts so nothing borrowed from the (non-Sync) body is held across `.await`.
    let (mut parts, body) = req.into_parts();

    let result = {
        let headers = &parts.headers;

        // A non-UTF-8 value is treated as unparseable, not as absent.
        let authorization = headers
            .get(header::AUTHORIZATION)
            .map(|v| v.to_str().unwrap_or_default());
        let dpop = headers
            .get(DPOP_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty());

        let url = effective_url(
            headers,
            &original_uri,
            state.auth.options().public_base_url.as_deref(),
        );

        state
            .auth
            .authenticate(AuthRequest {
                method: parts.method.as_str(),
                url: &url,
                authorization,
                dpop,
            })
            .await
    };

    let authenticated = match result {
        Ok(authenticated) => authenticated,
        Err(err) => return err.into_response(),
    };

    let Some(authenticated) = authenticated else {
        // anonymous pass-through; route gates decide
        return next.run(Request::from_parts(parts, body)).await;
    };

    // middleware → extractor / route gate への受け渡し
    parts.extensions.insert(authenticated.ctx);

    let mut response = next.run(Request::from_parts(parts, body)).await;

    if let Some(nonce) = authenticated.dpop_nonce {
        match HeaderValue::from_str(&nonce) {
            Ok(value) => {
                response.headers_mut().insert(DPOP_NONCE_HEADER, value);
            }
            Err(e) => tracing::error!(error = %e, "unrepresentable DPoP-Nonce value"),
        }
    }

    response
}
