//! Authenticated sessions against the database HTTP endpoint.
//!
//! A session is created by a single credential exchange (`POST /signin`) and
//! lives until it is explicitly disconnected, replaced by a new connect, or
//! invalidated by a configuration change. Token validity is never checked in
//! the background; an expired token is only noticed by the next query.
//!
//! Transitions are serialized through one async mutex so a disconnect cannot
//! interleave with an in-flight connect and leave an orphaned token behind.
//! The current state is published through a [`watch`] channel, which keeps
//! reads lock-free and lets the presentation layer subscribe to changes.

use alloc::sync::Arc;
use core::fmt;

use reqwest::{Client, header::ACCEPT};
use secrecy::{ExposeSecret as _, SecretString};
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error as ThisError;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

/// Connection settings for the database endpoint.
///
/// A snapshot of this is owned by every [`Session`]; changing the settings
/// never mutates a live session.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    #[serde(serialize_with = "serialize_secret")]
    pub password: Arc<SecretString>,
    pub namespace: String,
    pub database: String,
    /// Connect on panel startup and after the container was started.
    pub auto_connect: bool,
    /// Start the database with `--strict`.
    pub strict_mode: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8001,
            username: "root".to_string(),
            password: Arc::new(SecretString::from("root")),
            namespace: "test".to_string(),
            database: "test".to_string(),
            auto_connect: true,
            strict_mode: false,
        }
    }
}

impl PartialEq for ConnectionConfig {
    fn eq(&self, other: &Self) -> bool {
        self.host == other.host
            && self.port == other.port
            && self.username == other.username
            && self.password.expose_secret() == other.password.expose_secret()
            && self.namespace == other.namespace
            && self.database == other.database
            && self.auto_connect == other.auto_connect
            && self.strict_mode == other.strict_mode
    }
}

impl Eq for ConnectionConfig {}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("namespace", &self.namespace)
            .field("database", &self.database)
            .field("auto_connect", &self.auto_connect)
            .field("strict_mode", &self.strict_mode)
            .finish_non_exhaustive()
    }
}

impl ConnectionConfig {
    /// Base URL of the database HTTP endpoint.
    #[must_use]
    pub fn base_url(&self) -> String {
        if self.host.starts_with("http://") || self.host.starts_with("https://") {
            format!("{}:{}", self.host.trim_end_matches('/'), self.port)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }

    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url(), path.trim_start_matches('/'))
    }
}

fn serialize_secret<S: Serializer>(
    secret: &Arc<SecretString>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

/// Lifecycle status of a session, also the connection status shown to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Disconnected,
    Connecting,
    Connected,
}

/// An authenticated handle permitting query execution.
#[derive(Debug, Clone)]
pub struct Session {
    token: Arc<SecretString>,
    config: Arc<ConnectionConfig>,
    status: SessionStatus,
}

impl Session {
    /// A connected session holding `token`, issued for `config`.
    #[must_use]
    pub fn new(token: SecretString, config: Arc<ConnectionConfig>) -> Self {
        Self {
            token: Arc::new(token),
            config,
            status: SessionStatus::Connected,
        }
    }

    /// A session that holds no token. Queries under it are refused locally.
    #[must_use]
    pub fn disconnected(config: Arc<ConnectionConfig>) -> Self {
        Self {
            token: Arc::new(SecretString::from("")),
            config,
            status: SessionStatus::Disconnected,
        }
    }

    #[must_use]
    pub fn token(&self) -> &SecretString {
        &self.token
    }

    #[must_use]
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    #[must_use]
    pub const fn status(&self) -> SessionStatus {
        self.status
    }
}

/// Published state of the [`SessionManager`].
#[derive(Debug, Clone)]
pub enum SessionState {
    Disconnected,
    Connecting(Arc<ConnectionConfig>),
    Connected(Session),
}

impl SessionState {
    #[must_use]
    pub const fn status(&self) -> SessionStatus {
        match *self {
            Self::Disconnected => SessionStatus::Disconnected,
            Self::Connecting(_) => SessionStatus::Connecting,
            Self::Connected(_) => SessionStatus::Connected,
        }
    }
}

/// Failures of the credential exchange.
#[derive(Debug, Clone, PartialEq, Eq, ThisError, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum AuthError {
    #[error("The database rejected the credentials")]
    InvalidCredentials,
    #[error("The database endpoint is unreachable")]
    EndpointUnreachable,
    #[error("The sign-in response was malformed")]
    MalformedResponse,
}

#[derive(Serialize)]
struct SignInRequest<'req> {
    user: &'req str,
    pass: &'req str,
}

#[derive(Deserialize)]
struct SignInResponse {
    token: String,
}

/// Performs the credential exchange and returns the issued token.
async fn sign_in(client: &Client, config: &ConnectionConfig) -> Result<SecretString, AuthError> {
    let url = config.endpoint("signin");
    debug!(%url, user = %config.username, "Signing in");

    let response = client
        .post(&url)
        .header(ACCEPT, "application/json")
        .json(&SignInRequest {
            user: &config.username,
            pass: config.password.expose_secret(),
        })
        .send()
        .await
        .map_err(|e| {
            debug!(error = %e, "Sign-in request failed");
            AuthError::EndpointUnreachable
        })?;

    let status = response.status();
    if !status.is_success() {
        warn!(%status, "Sign-in rejected");
        return Err(AuthError::InvalidCredentials);
    }

    let body = response.bytes().await.map_err(|e| {
        debug!(error = %e, "Failed to read sign-in response");
        AuthError::EndpointUnreachable
    })?;
    let SignInResponse { token } =
        serde_json::from_slice(&body).map_err(|_| AuthError::MalformedResponse)?;
    if token.is_empty() {
        return Err(AuthError::MalformedResponse);
    }
    Ok(SecretString::from(token))
}

/// Resets the published state to `Disconnected` if a connect is abandoned mid-flight.
struct PendingConnect<'state> {
    state_tx: &'state watch::Sender<SessionState>,
    armed: bool,
}

impl Drop for PendingConnect<'_> {
    fn drop(&mut self) {
        if self.armed {
            debug!("Connect abandoned before completion");
            self.state_tx.send_replace(SessionState::Disconnected);
        }
    }
}

/// Owns the single live session and its transitions.
pub struct SessionManager {
    client: Client,
    transitions: Mutex<()>,
    state_tx: watch::Sender<SessionState>,
}

impl SessionManager {
    #[must_use]
    pub fn new(client: Client) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Disconnected);
        Self {
            client,
            transitions: Mutex::new(()),
            state_tx,
        }
    }

    /// Performs a fresh credential exchange with `config`.
    ///
    /// Any previous session is discarded first. There is no retry; calling
    /// `connect` again starts a new exchange.
    ///
    /// # Errors
    ///
    /// Returns the classified [`AuthError`]; the manager is `Disconnected` afterwards.
    #[tracing::instrument(skip_all, fields(host = %config.host, port = config.port), err(Debug))]
    pub async fn connect(&self, config: ConnectionConfig) -> Result<Session, AuthError> {
        let _transition = self.transitions.lock().await;
        let config = Arc::new(config);

        self.state_tx
            .send_replace(SessionState::Connecting(config.clone()));
        let mut pending = PendingConnect {
            state_tx: &self.state_tx,
            armed: true,
        };

        let outcome = sign_in(&self.client, &config).await;
        pending.armed = false;

        match outcome {
            Ok(token) => {
                let session = Session::new(token, config);
                self.state_tx
                    .send_replace(SessionState::Connected(session.clone()));
                info!("Connected");
                Ok(session)
            }
            Err(e) => {
                self.state_tx.send_replace(SessionState::Disconnected);
                Err(e)
            }
        }
    }

    /// Discards the token. Safe to call when already disconnected.
    pub async fn disconnect(&self) {
        let _transition = self.transitions.lock().await;
        let previous = self.state_tx.send_replace(SessionState::Disconnected);
        if matches!(previous, SessionState::Connected(_)) {
            info!("Disconnected");
        }
    }

    /// Disconnects the live session unless it was created from `config`.
    ///
    /// Returns `true` when a session was discarded.
    pub async fn invalidate_unless(&self, config: &ConnectionConfig) -> bool {
        let _transition = self.transitions.lock().await;
        let stale = match *self.state_tx.borrow() {
            SessionState::Connected(ref session) => session.config() != config,
            SessionState::Connecting(_) | SessionState::Disconnected => false,
        };
        if stale {
            self.state_tx.send_replace(SessionState::Disconnected);
            info!("Connection settings changed, session discarded");
        }
        stale
    }

    /// The live session, if any. The token is not verified server-side.
    #[must_use]
    pub fn current_session(&self) -> Option<Session> {
        match *self.state_tx.borrow() {
            SessionState::Connected(ref session) => Some(session.clone()),
            SessionState::Connecting(_) | SessionState::Disconnected => None,
        }
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.state_tx.borrow().status()
    }

    /// Subscribe to future state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }
}
