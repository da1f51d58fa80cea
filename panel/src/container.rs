//! Lifecycle control of the single managed database container.
//!
//! Operations are issued through a [`ProcessInvoker`] and are not transactional:
//! if `start` removes the old container but fails to create the new one, the
//! container is simply absent afterwards and a follow-up [`ContainerController::inspect`]
//! will say so. State is never cached; every operation that depends on it asks
//! the runtime again.

use alloc::sync::Arc;
use std::{
    collections::HashMap,
    io,
    sync::{Mutex as StdMutex, PoisonError},
};

use secrecy::{ExposeSecret as _, SecretString};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error as ThisError;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    config::ContainerConfig,
    process::{ProcessInvoker, ProcessOutput},
    session::ConnectionConfig,
};

/// Everything needed to create the managed container. Built fresh for each start.
#[derive(Debug, Clone)]
pub struct ContainerHandle {
    pub name: String,
    pub image: String,
    pub host_port: u16,
    pub container_port: u16,
    pub volume: String,
    pub mount_point: String,
    pub log_level: String,
    pub user: String,
    pub pass: Arc<SecretString>,
    pub strict: bool,
    pub datastore: Option<String>,
}

impl ContainerHandle {
    #[must_use]
    pub fn new(config: &ContainerConfig, connection: &ConnectionConfig) -> Self {
        Self {
            name: config.name.clone(),
            image: config.image.clone(),
            host_port: config.host_port,
            container_port: config.container_port,
            volume: config.volume.clone(),
            mount_point: config.mount_point.clone(),
            log_level: config.log_level.clone(),
            user: config.user.clone(),
            pass: config.pass.clone(),
            strict: connection.strict_mode,
            datastore: config.datastore.clone(),
        }
    }

    /// Arguments for the runtime's `run` subcommand.
    fn run_args(&self) -> Vec<String> {
        let mut args = vec![
            "-d".to_string(),
            "--name".to_string(),
            self.name.clone(),
            "-p".to_string(),
            format!("{}:{}", self.host_port, self.container_port),
            "-v".to_string(),
            format!("{}:{}", self.volume, self.mount_point),
            self.image.clone(),
            "start".to_string(),
            "--log".to_string(),
            self.log_level.clone(),
            "--user".to_string(),
            self.user.clone(),
            "--pass".to_string(),
            self.pass.expose_secret().to_string(),
        ];
        if self.strict {
            args.push("--strict".to_string());
        }
        if let Some(ref datastore) = self.datastore {
            args.push(datastore.clone());
        }
        args
    }
}

/// Runtime-reported state of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Absent,
    Running,
    Stopped,
    Unknown,
}

impl ContainerState {
    fn from_runtime(state: &str) -> Self {
        match state.to_ascii_lowercase().as_str() {
            "running" => Self::Running,
            "exited" | "created" | "dead" => Self::Stopped,
            _ => Self::Unknown,
        }
    }
}

/// Acknowledgement of a completed lifecycle operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ack {
    pub container: String,
    /// Container ID reported by the runtime, when it reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Failures of lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq, ThisError, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum LifecycleError {
    #[error("The container runtime is unavailable")]
    RuntimeUnavailable,
    #[error("A container with that name already exists")]
    NameCollision,
    #[error("No such container")]
    NoSuchContainer,
    #[error("Runtime command failed: {0}")]
    CommandFailed(String),
}

impl LifecycleError {
    fn from_spawn(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => Self::RuntimeUnavailable,
            _ => Self::CommandFailed(err.to_string()),
        }
    }

    fn from_output(output: &ProcessOutput) -> Self {
        let stderr = output.stderr.trim();
        let lower = stderr.to_ascii_lowercase();
        if lower.contains("no such container") {
            Self::NoSuchContainer
        } else if is_name_collision(&lower) {
            Self::NameCollision
        } else if lower.contains("cannot connect to the docker daemon")
            || lower.contains("is the docker daemon running")
            || lower.contains("unable to connect to podman")
        {
            Self::RuntimeUnavailable
        } else if stderr.is_empty() {
            Self::CommandFailed(format!("exit status {:?}", output.code))
        } else {
            Self::CommandFailed(stderr.to_string())
        }
    }
}

/// Name clashes only. A host port that is already in use is a plain command failure.
fn is_name_collision(lower_stderr: &str) -> bool {
    lower_stderr.contains("conflict. the container name")
        || (lower_stderr.contains("container name")
            && (lower_stderr.contains("already in use") || lower_stderr.contains("is in use")))
}

/// One async mutex per container name, so lifecycle operations on the same
/// container never interleave.
#[derive(Default)]
struct LifecycleLocks(StdMutex<HashMap<String, Arc<Mutex<()>>>>);

impl LifecycleLocks {
    fn for_name(&self, name: &str) -> Arc<Mutex<()>> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_string())
            .or_default()
            .clone()
    }
}

/// Sequences start/stop/restart against named containers.
pub struct ContainerController {
    invoker: Arc<dyn ProcessInvoker>,
    locks: LifecycleLocks,
}

impl ContainerController {
    #[must_use]
    pub fn new(invoker: Arc<dyn ProcessInvoker>) -> Self {
        Self {
            invoker,
            locks: LifecycleLocks::default(),
        }
    }

    /// Runs a subcommand and maps spawn failures and non-zero exits to [`LifecycleError`].
    async fn run_checked(
        &self,
        subcommand: &str,
        args: &[String],
    ) -> Result<ProcessOutput, LifecycleError> {
        let output = self
            .invoker
            .exec(subcommand, args)
            .await
            .map_err(|e| {
                warn!(%subcommand, error = %e, "Failed to invoke container runtime");
                LifecycleError::from_spawn(&e)
            })?;
        if output.success() {
            Ok(output)
        } else {
            debug!(%subcommand, code = ?output.code, stderr = %output.stderr.trim(), "Runtime command failed");
            Err(LifecycleError::from_output(&output))
        }
    }

    /// Replaces any container named like `handle` with a freshly created one.
    ///
    /// A failed removal because the container does not exist is expected and
    /// ignored. Other removal failures are logged and the create still runs;
    /// a leftover container then surfaces as [`LifecycleError::NameCollision`].
    ///
    /// # Errors
    ///
    /// Returns the classified failure of the create step.
    #[tracing::instrument(skip_all, fields(container = %handle.name), err(Debug))]
    pub async fn start(&self, handle: &ContainerHandle) -> Result<Ack, LifecycleError> {
        let lock = self.locks.for_name(&handle.name);
        let _guard = lock.lock().await;

        let rm_args = vec!["-f".to_string(), handle.name.clone()];
        match self.run_checked("rm", &rm_args).await {
            Ok(_) => debug!("Removed existing container"),
            Err(LifecycleError::NoSuchContainer) => debug!("No existing container to remove"),
            Err(e) => warn!(error = %e, "Removing the existing container failed, creating anyway"),
        }

        let output = self.run_checked("run", &handle.run_args()).await?;
        let id = output.stdout.trim();
        info!(image = %handle.image, port = handle.host_port, "Container started");
        Ok(Ack {
            container: handle.name.clone(),
            id: (!id.is_empty()).then(|| id.to_string()),
        })
    }

    /// Stops the named container.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::NoSuchContainer`] without issuing a stop when the
    /// container is absent or not running, otherwise the classified runtime failure.
    #[tracing::instrument(skip(self), err(Debug))]
    pub async fn stop(&self, name: &str) -> Result<Ack, LifecycleError> {
        let lock = self.locks.for_name(name);
        let _guard = lock.lock().await;

        match self.inspect(name).await {
            ContainerState::Absent | ContainerState::Stopped => {
                return Err(LifecycleError::NoSuchContainer);
            }
            ContainerState::Running | ContainerState::Unknown => {}
        }

        self.run_checked("stop", &[name.to_string()]).await?;
        info!("Container stopped");
        Ok(Ack {
            container: name.to_string(),
            id: None,
        })
    }

    /// Restarts the named container through the runtime's own restart primitive.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::NoSuchContainer`] when the container is absent,
    /// otherwise the classified runtime failure.
    #[tracing::instrument(skip(self), err(Debug))]
    pub async fn restart(&self, name: &str) -> Result<Ack, LifecycleError> {
        let lock = self.locks.for_name(name);
        let _guard = lock.lock().await;

        if self.inspect(name).await == ContainerState::Absent {
            return Err(LifecycleError::NoSuchContainer);
        }

        self.run_checked("restart", &[name.to_string()]).await?;
        info!("Container restarted");
        Ok(Ack {
            container: name.to_string(),
            id: None,
        })
    }

    /// Asks the runtime for the current state of the container named exactly `name`.
    ///
    /// Runtime failures yield [`ContainerState::Unknown`].
    pub async fn inspect(&self, name: &str) -> ContainerState {
        let args = vec![
            "-a".to_string(),
            "--filter".to_string(),
            format!("name={name}"),
            "--format".to_string(),
            "json".to_string(),
        ];
        match self.run_checked("ps", &args).await {
            Ok(output) => parse_ps_output(&output.stdout, name),
            Err(e) => {
                warn!(container = %name, error = %e, "Could not inspect container");
                ContainerState::Unknown
            }
        }
    }
}

/// Reads `ps --format json` output, either one object per line (docker) or a
/// single array (podman).
fn parse_ps_output(stdout: &str, name: &str) -> ContainerState {
    let trimmed = stdout.trim();
    let entries: Vec<Value> = if trimmed.starts_with('[') {
        match serde_json::from_str(trimmed) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Unparseable runtime output");
                return ContainerState::Unknown;
            }
        }
    } else {
        match trimmed
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(serde_json::from_str)
            .collect::<Result<_, _>>()
        {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Unparseable runtime output");
                return ContainerState::Unknown;
            }
        }
    };

    entries
        .iter()
        .find(|entry| entry_names(entry).any(|n| n == name))
        .map_or(ContainerState::Absent, |entry| {
            entry
                .get("State")
                .and_then(Value::as_str)
                .map_or(ContainerState::Unknown, ContainerState::from_runtime)
        })
}

/// Container names of one `ps` entry. The filter is a substring match, so callers compare exactly.
fn entry_names(entry: &Value) -> impl Iterator<Item = &str> {
    let names: Vec<&str> = match entry.get("Names") {
        Some(&Value::String(ref joined)) => joined.split(',').collect(),
        Some(&Value::Array(ref list)) => list.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    };
    names.into_iter().map(|n| n.trim().trim_start_matches('/'))
}
