//! Configuration data types for the panel.
//!
//! This module contains the data structures of the panel config file: the HTTP
//! server binding, the managed container and the location of the persisted
//! connection settings.

use alloc::sync::Arc;
use std::path::{Component, Path, PathBuf};

use secrecy::{ExposeSecret as _, SecretString};
use serde::Deserialize;

/// HTTP server binding configuration section.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// TCP port for the panel API.
    #[serde(default = "default_server_port")]
    pub port: u16,
    /// Bind address for the HTTP listener.
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_server_port(),
            bind: default_bind(),
        }
    }
}

/// The managed database container.
///
/// A [`crate::container::ContainerHandle`] is built from this section on every start.
#[derive(Debug, Deserialize, Clone)]
pub struct ContainerConfig {
    /// Runtime CLI program, e.g. `docker` or `podman`.
    #[serde(default = "default_runtime")]
    pub runtime: String,
    #[serde(default = "default_container_name")]
    pub name: String,
    #[serde(default = "default_image")]
    pub image: String,
    /// Port published on the host.
    #[serde(default = "default_host_port")]
    pub host_port: u16,
    /// Port the database listens on inside the container.
    #[serde(default = "default_container_port")]
    pub container_port: u16,
    /// Named volume (or host path) mounted into the container.
    #[serde(default = "default_volume")]
    pub volume: String,
    #[serde(default = "default_mount_point")]
    pub mount_point: String,
    /// Database log level passed as `--log`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Root user the database is bootstrapped with.
    #[serde(default = "default_root_user")]
    pub user: String,
    #[serde(default = "default_root_pass")]
    pub pass: Arc<SecretString>,
    /// Optional datastore path argument, e.g. `rocksdb:/mydata/srdb`. In-memory when omitted.
    #[serde(default)]
    pub datastore: Option<String>,
    /// How long to wait after a successful start before auto-connecting.
    #[serde(default = "default_connect_delay_ms")]
    pub connect_delay_ms: u64,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            runtime: default_runtime(),
            name: default_container_name(),
            image: default_image(),
            host_port: default_host_port(),
            container_port: default_container_port(),
            volume: default_volume(),
            mount_point: default_mount_point(),
            log_level: default_log_level(),
            user: default_root_user(),
            pass: default_root_pass(),
            datastore: None,
            connect_delay_ms: default_connect_delay_ms(),
        }
    }
}

impl PartialEq for ContainerConfig {
    fn eq(&self, other: &Self) -> bool {
        self.runtime == other.runtime
            && self.name == other.name
            && self.image == other.image
            && self.host_port == other.host_port
            && self.container_port == other.container_port
            && self.volume == other.volume
            && self.mount_point == other.mount_point
            && self.log_level == other.log_level
            && self.user == other.user
            && self.pass.expose_secret() == other.pass.expose_secret()
            && self.datastore == other.datastore
            && self.connect_delay_ms == other.connect_delay_ms
    }
}

/// Location of the persisted connection settings record.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct SettingsConfig {
    /// Path of the settings file. Relative paths are resolved relative to the config file.
    #[serde(default = "default_settings_path")]
    pub path: String,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            path: default_settings_path(),
        }
    }
}

const fn default_server_port() -> u16 {
    8090
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_runtime() -> String {
    "docker".to_string()
}

fn default_container_name() -> String {
    "surrealdb-ext".to_string()
}

fn default_image() -> String {
    "surrealdb/surrealdb:latest".to_string()
}

const fn default_host_port() -> u16 {
    8001
}

const fn default_container_port() -> u16 {
    8000
}

fn default_volume() -> String {
    "surrealdb_data".to_string()
}

fn default_mount_point() -> String {
    "/mydata".to_string()
}

fn default_log_level() -> String {
    "trace".to_string()
}

fn default_root_user() -> String {
    "root".to_string()
}

fn default_root_pass() -> Arc<SecretString> {
    Arc::new(SecretString::from("root"))
}

const fn default_connect_delay_ms() -> u64 {
    2000
}

fn default_settings_path() -> String {
    "./surrealdb-settings.toml".to_string()
}

/// Resolves a path to an absolute one.
///
/// If the path is absolute, returns it as-is. If relative, joins it with the
/// config file's parent directory and normalizes the result to remove redundant
/// components like `./`.
pub fn resolve_config_relative_paths(config_path: &Path, relative_path: &str) -> PathBuf {
    let path = Path::new(relative_path);
    let resolved = if path.is_absolute() {
        path.to_path_buf()
    } else {
        config_path
            .parent()
            .map_or_else(|| path.to_path_buf(), |d| d.join(path))
    };

    // We can't use canonicalize() because the file might not exist yet
    normalize_path(&resolved)
}

fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        use Component as C;
        match component {
            C::Normal(c) => {
                result.push(c);
            }
            C::ParentDir => {
                result.pop();
            }
            C::CurDir => {}
            C::RootDir | C::Prefix(_) => {
                result.push(component);
            }
        }
    }
    result
}

/// Root config structure for the panel.
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
pub struct PanelConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub container: ContainerConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
}
