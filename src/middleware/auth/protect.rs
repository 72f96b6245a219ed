//! Route gate middleware.
//!
//! Must sit inside `access::apply`, which leaves the `AuthCtx` in extensions.
use std::sync::Arc;

use axum::{
    Router,
    extract::{Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
};

use crate::services::auth::{AuthCtx, RouteGuard};

/// Gate every route of `router` with `guard`.
pub fn protected<S>(router: Router<S>, guard: RouteGuard) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    // route_layer: unmatched paths still fall through to the 404 fallback
    router.route_layer(middleware::from_fn_with_state(
        Arc::new(guard),
        protect_middleware,
    ))
}

async fn protect_middleware(
    State(guard): State<Arc<RouteGuard>>,
    req: Request,
    next: Next,
) -> Response {
    if let Err(err) = guard.check(req.extensions().get::<AuthCtx>()) {
        tracing::debug!(error = %err, "route gate rejected request");
        return err.into_response();
    }

    next.run(req).await
}
