use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header::AUTHORIZATION},
    middleware as ax_middleware,
    routing::{self, any},
};
use tower::ServiceBuilder;
use tower_http::{ServiceBuilderExt as _, request_id::MakeRequestUuid, trace::TraceLayer};

use crate::{
    app::AppState,
    http::{
        api,
        server::middleware::{LevelAdjustingOnFailure, secure_headers_middleware},
        websocket,
    },
};

/// Creates the application router: the JSON API under `/api` and the status push at `/ws`.
pub(crate) fn create_app_router() -> Router<AppState> {
    Router::new()
        .nest("/api", api::routes())
        .route("/ws", any(websocket::ws_handler))
}

pub(crate) fn create_app(app_state: AppState) -> Router {
    let middleware_stack = ServiceBuilder::new()
        .sensitive_headers([AUTHORIZATION])
        .set_x_request_id(MakeRequestUuid)
        .propagate_x_request_id()
        .layer(TraceLayer::new_for_http().on_failure(LevelAdjustingOnFailure))
        .layer(ax_middleware::from_fn(secure_headers_middleware));

    create_app_router()
        .with_state(app_state)
        .fallback(routing::any(|req: Request<Body>| async move {
            tracing::warn!(method = %req.method(), uri = %req.uri(), "Unhandled request");
            StatusCode::NOT_FOUND
        }))
        .layer(middleware_stack)
}
