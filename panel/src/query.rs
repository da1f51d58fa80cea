//! Query execution under an authenticated session.
//!
//! The query text and the response are opaque: the text is sent verbatim as
//! the body of `POST /sql`, and the response is only parsed to check that it is
//! well-formed JSON before it is handed back untouched.

use core::time::Duration;

use reqwest::{Client, header::ACCEPT};
use secrecy::ExposeSecret as _;
use serde::Serialize;
use thiserror::Error as ThisError;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::session::{Session, SessionStatus};

/// Namespace header understood by the database endpoint.
pub const NAMESPACE_HEADER: &str = "NS";
/// Database header understood by the database endpoint.
pub const DATABASE_HEADER: &str = "DB";

/// Successful query outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    /// The response body, unchanged.
    pub payload: serde_json::Value,
    /// Wall-clock time around the request, including reading the body.
    pub elapsed: Duration,
}

/// Failures of a single query.
#[derive(Debug, Clone, PartialEq, Eq, ThisError, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum QueryError {
    #[error("No connected session")]
    NotConnected,
    #[error("The database rejected the query with status {0}: {1}")]
    ServerRejected(u16, String),
    #[error("The database endpoint is unreachable")]
    Unreachable,
    #[error("The database returned a malformed payload")]
    MalformedPayload,
}

/// Sends queries. Holds no state besides the HTTP client, so calls may run concurrently.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    client: Client,
}

impl QueryExecutor {
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self { client }
    }

    /// Executes `query` under `session`.
    ///
    /// The session is not updated on failure; a `401` from an expired token is
    /// reported as [`QueryError::ServerRejected`] and left for the caller to act on.
    ///
    /// # Errors
    ///
    /// [`QueryError::NotConnected`] without any network I/O when the session is
    /// not connected, otherwise the classified transport or server failure.
    #[tracing::instrument(skip_all, fields(ns = %session.config().namespace, db = %session.config().database), err(Debug))]
    pub async fn execute(&self, session: &Session, query: &str) -> Result<QueryResult, QueryError> {
        if session.status() != SessionStatus::Connected {
            return Err(QueryError::NotConnected);
        }
        let config = session.config();

        let started = Instant::now();
        let response = self
            .client
            .post(config.endpoint("sql"))
            .bearer_auth(session.token().expose_secret())
            .header(NAMESPACE_HEADER, &config.namespace)
            .header(DATABASE_HEADER, &config.database)
            .header(ACCEPT, "application/json")
            .body(query.to_owned())
            .send()
            .await
            .map_err(|e| {
                debug!(error = %e, "Query request failed");
                QueryError::Unreachable
            })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            debug!(error = %e, "Failed to read query response");
            QueryError::Unreachable
        })?;
        let elapsed = started.elapsed();

        if !status.is_success() {
            let message = String::from_utf8_lossy(&body).trim().to_string();
            let message = if message.is_empty() {
                status.canonical_reason().unwrap_or_default().to_string()
            } else {
                message
            };
            warn!(%status, "Query rejected");
            return Err(QueryError::ServerRejected(status.as_u16(), message));
        }

        let payload = serde_json::from_slice(&body).map_err(|_| QueryError::MalformedPayload)?;
        debug!(elapsed_ms = elapsed.as_secs_f64() * 1000.0, "Query finished");
        Ok(QueryResult { payload, elapsed })
    }
}
