//! The command surface offered to the presentation layer.
//!
//! [`ControlPanel`] composes the container controller, the session manager,
//! the query executor and the settings store. Connection settings are read from
//! the store whenever a session or container is started and passed down
//! explicitly; nothing below this layer looks them up on its own.

use alloc::sync::Arc;
use core::time::Duration;
use std::path::Path;

use reqwest::Client;
use serde::Serialize;
use thiserror::Error as ThisError;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    config::{ContainerConfig, PanelConfig, resolve_config_relative_paths},
    container::{Ack, ContainerController, ContainerHandle, ContainerState, LifecycleError},
    process::{CliInvoker, ProcessInvoker},
    query::{QueryError, QueryExecutor, QueryResult},
    session::{AuthError, ConnectionConfig, Session, SessionManager, SessionState},
    settings::SettingsStore,
    status::Overview,
};

/// Any failure of a panel command.
#[derive(Debug, ThisError)]
pub enum ControlError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error("Connection settings are unavailable: {0:#}")]
    Settings(eyre::Report),
    #[error("Query text is empty")]
    EmptyQuery,
}

/// Result of the connect attempt that follows a start or a panel startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum AutoConnect {
    /// `auto_connect` is off in the persisted settings.
    Disabled,
    Connected,
    Failed(AuthError),
}

/// Acknowledgement of a start, together with the auto-connect outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartOutcome {
    #[serde(flatten)]
    pub ack: Ack,
    pub auto_connect: AutoConnect,
}

pub struct ControlPanel {
    container: ContainerConfig,
    connect_delay: Duration,
    controller: ContainerController,
    sessions: SessionManager,
    executor: QueryExecutor,
    settings: SettingsStore,
}

impl ControlPanel {
    /// Builds a panel driving the runtime CLI named in `config`.
    ///
    /// `config_path` anchors the relative settings path.
    #[must_use]
    pub fn new(config: &PanelConfig, config_path: &Path) -> Self {
        let invoker = Arc::new(CliInvoker::new(config.container.runtime.clone()));
        info!(runtime = invoker.program(), "Driving container runtime CLI");
        Self::with_invoker(config, config_path, invoker)
    }

    #[must_use]
    pub fn with_invoker(
        config: &PanelConfig,
        config_path: &Path,
        invoker: Arc<dyn ProcessInvoker>,
    ) -> Self {
        let client = Client::new();
        let settings_path = resolve_config_relative_paths(config_path, &config.settings.path);
        Self {
            container: config.container.clone(),
            connect_delay: Duration::from_millis(config.container.connect_delay_ms),
            controller: ContainerController::new(invoker),
            sessions: SessionManager::new(client.clone()),
            executor: QueryExecutor::new(client),
            settings: SettingsStore::new(settings_path),
        }
    }

    /// Name of the managed container.
    #[must_use]
    pub fn container_name(&self) -> &str {
        &self.container.name
    }

    /// Recreates the container, then auto-connects if the settings ask for it.
    ///
    /// The auto-connect waits once for the configured delay and makes a single
    /// attempt; its failure is reported in the outcome, not as an error.
    ///
    /// # Errors
    ///
    /// Fails when the settings cannot be read or the container cannot be created.
    pub async fn start(&self) -> Result<StartOutcome, ControlError> {
        let connection = self.load_settings().await?;
        let handle = ContainerHandle::new(&self.container, &connection);
        let ack = self.controller.start(&handle).await?;

        let auto_connect = if connection.auto_connect {
            debug!(delay_ms = self.connect_delay.as_millis(), "Waiting before auto-connect");
            tokio::time::sleep(self.connect_delay).await;
            self.connect_with(connection).await
        } else {
            AutoConnect::Disabled
        };
        Ok(StartOutcome { ack, auto_connect })
    }

    /// # Errors
    ///
    /// See [`ContainerController::stop`].
    pub async fn stop(&self) -> Result<Ack, ControlError> {
        Ok(self.controller.stop(&self.container.name).await?)
    }

    /// # Errors
    ///
    /// See [`ContainerController::restart`].
    pub async fn restart(&self) -> Result<Ack, ControlError> {
        Ok(self.controller.restart(&self.container.name).await?)
    }

    pub async fn inspect(&self) -> ContainerState {
        self.controller.inspect(&self.container.name).await
    }

    /// Connects with the persisted settings.
    ///
    /// # Errors
    ///
    /// Fails when the settings cannot be read or the credential exchange fails.
    pub async fn connect(&self) -> Result<Session, ControlError> {
        let connection = self.load_settings().await?;
        Ok(self.sessions.connect(connection).await?)
    }

    pub async fn disconnect(&self) {
        self.sessions.disconnect().await;
    }

    /// Runs `text` under the live session.
    ///
    /// # Errors
    ///
    /// [`ControlError::EmptyQuery`] for blank text, otherwise the [`QueryError`].
    pub async fn execute_query(&self, text: &str) -> Result<QueryResult, ControlError> {
        if text.trim().is_empty() {
            return Err(ControlError::EmptyQuery);
        }
        let session = self
            .sessions
            .current_session()
            .ok_or(QueryError::NotConnected)?;
        Ok(self.executor.execute(&session, text).await?)
    }

    /// Connection status together with a fresh container inspection.
    pub async fn status(&self) -> Overview {
        let overview = Overview::new(self.sessions.status(), self.inspect().await);
        if overview.stale() {
            debug!(container = ?overview.container, "Connected, but the container is not running");
        }
        overview
    }

    /// # Errors
    ///
    /// Fails when the settings file exists but cannot be read.
    pub async fn settings(&self) -> Result<ConnectionConfig, ControlError> {
        self.load_settings().await
    }

    /// Persists `config` and drops the live session if it was made with different settings.
    ///
    /// Returns whether a session was dropped.
    ///
    /// # Errors
    ///
    /// Fails when the settings cannot be written; the session is left untouched then.
    pub async fn save_settings(&self, config: &ConnectionConfig) -> Result<bool, ControlError> {
        self.settings
            .save(config)
            .await
            .map_err(ControlError::Settings)?;
        info!("Connection settings saved");
        Ok(self.sessions.invalidate_unless(config).await)
    }

    /// Makes the startup connect attempt when the persisted settings enable it.
    pub async fn auto_connect_on_startup(&self) -> AutoConnect {
        match self.load_settings().await {
            Ok(connection) if connection.auto_connect => self.connect_with(connection).await,
            Ok(_) => AutoConnect::Disabled,
            Err(e) => {
                warn!(error = %e, "Skipping auto-connect");
                AutoConnect::Disabled
            }
        }
    }

    /// Subscribe to session state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.sessions.subscribe()
    }

    async fn connect_with(&self, connection: ConnectionConfig) -> AutoConnect {
        match self.sessions.connect(connection).await {
            Ok(_) => AutoConnect::Connected,
            Err(e) => {
                warn!(error = %e, "Auto-connect failed");
                AutoConnect::Failed(e)
            }
        }
    }

    async fn load_settings(&self) -> Result<ConnectionConfig, ControlError> {
        self.settings.load().await.map_err(ControlError::Settings)
    }
}
