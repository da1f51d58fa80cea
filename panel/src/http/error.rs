//! Mapping of panel failures onto HTTP responses.
//!
//! The response body is the structured error value, `{ "kind": ..., "detail": ... }`,
//! leaving the wording to the client.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use tracing::error;

use crate::{
    app::ControlError, container::LifecycleError, query::QueryError, session::AuthError,
};

/// Wrapper turning a [`ControlError`] into a response.
#[derive(Debug)]
pub(crate) struct ApiError(pub ControlError);

impl<E: Into<ControlError>> From<E> for ApiError {
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl ApiError {
    pub(crate) const fn status(&self) -> StatusCode {
        use ControlError as C;
        match self.0 {
            C::Lifecycle(ref e) => match *e {
                LifecycleError::NoSuchContainer => StatusCode::NOT_FOUND,
                LifecycleError::NameCollision => StatusCode::CONFLICT,
                LifecycleError::RuntimeUnavailable => StatusCode::SERVICE_UNAVAILABLE,
                LifecycleError::CommandFailed(_) => StatusCode::BAD_GATEWAY,
            },
            C::Auth(ref e) => match *e {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::EndpointUnreachable | AuthError::MalformedResponse => {
                    StatusCode::BAD_GATEWAY
                }
            },
            C::Query(ref e) => match *e {
                QueryError::NotConnected => StatusCode::CONFLICT,
                QueryError::ServerRejected(..)
                | QueryError::Unreachable
                | QueryError::MalformedPayload => StatusCode::BAD_GATEWAY,
            },
            C::Settings(_) => StatusCode::INTERNAL_SERVER_ERROR,
            C::EmptyQuery => StatusCode::BAD_REQUEST,
        }
    }

    fn body(&self) -> Value {
        let structured = match self.0 {
            ControlError::Lifecycle(ref e) => serde_json::to_value(e),
            ControlError::Auth(ref e) => serde_json::to_value(e),
            ControlError::Query(ref e) => serde_json::to_value(e),
            ControlError::Settings(ref report) => {
                return json!({ "kind": "settings", "detail": format!("{report:#}") });
            }
            ControlError::EmptyQuery => return json!({ "kind": "empty_query" }),
        };
        structured.unwrap_or_else(|e| json!({ "kind": "internal", "detail": e.to_string() }))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self.0, "Request failed");
        }
        (status, Json(self.body())).into_response()
    }
}
