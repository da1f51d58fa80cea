use axum::{
    body::Body,
    http::{
        HeaderName, HeaderValue, Request, StatusCode,
        header::{CACHE_CONTROL, X_CONTENT_TYPE_OPTIONS},
    },
    middleware::Next,
    response::Response,
};
use tower_http::classify::ServerErrorsFailureClass;

/// Custom failure handling for the trace layer. 503 responses are logged
/// at `INFO` instead of `ERROR`, an absent container runtime is not a server fault.
#[derive(Clone, Copy)]
pub(crate) struct LevelAdjustingOnFailure;

impl tower_http::trace::OnFailure<ServerErrorsFailureClass> for LevelAdjustingOnFailure {
    fn on_failure(
        &mut self,
        failure_classification: ServerErrorsFailureClass,
        latency: core::time::Duration,
        span: &tracing::Span,
    ) {
        use ServerErrorsFailureClass as S;

        match failure_classification {
            S::StatusCode(StatusCode::SERVICE_UNAVAILABLE) => {
                tracing::info!(classification = %S::StatusCode(StatusCode::SERVICE_UNAVAILABLE), latency = %format!("{} ms", latency.as_millis()), "response failed (downgraded)");
            }
            value => {
                tower_http::trace::DefaultOnFailure::default().on_failure(value, latency, span);
            }
        }
    }
}

/// Middleware to set security headers on all responses.
///
/// Responses carry live database state, so nothing is cached.
pub(crate) async fn secure_headers_middleware(req: Request<Body>, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert(
        HeaderName::from_static("cross-origin-opener-policy"),
        HeaderValue::from_static("same-origin"),
    );
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}
