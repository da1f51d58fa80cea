//! Persistence of the connection settings record.
//!
//! The record lives in a small TOML file under the single table
//! `[surrealdb-settings]`. It is read whenever a session is started and only
//! written on an explicit save. There is no schema versioning; unknown keys are
//! ignored and missing keys take their defaults.

use std::{
    collections::BTreeMap,
    io,
    path::{Path, PathBuf},
};

use eyre::WrapErr as _;
use tokio::fs;
use tracing::debug;

use crate::session::ConnectionConfig;

/// Name of the single persisted record.
pub const SETTINGS_KEY: &str = "surrealdb-settings";

/// File-backed key-value store holding the [`ConnectionConfig`] record.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the record, falling back to defaults when the file or the record does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load(&self) -> eyre::Result<ConnectionConfig> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No settings saved yet, using defaults");
                return Ok(ConnectionConfig::default());
            }
            Err(e) => {
                return Err(e).wrap_err(format!(
                    "Failed to read settings at: {}",
                    self.path.display()
                ));
            }
        };
        let mut records: BTreeMap<String, ConnectionConfig> = toml::from_str(&content)
            .wrap_err(format!(
                "Failed to parse settings as TOML at: {}",
                self.path.display()
            ))?;
        Ok(records.remove(SETTINGS_KEY).unwrap_or_default())
    }

    /// Writes the record, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or its parent directory cannot be written.
    pub async fn save(&self, config: &ConnectionConfig) -> eyre::Result<()> {
        let records = BTreeMap::from([(SETTINGS_KEY, config)]);
        let content = toml::to_string(&records).wrap_err("Failed to serialize settings")?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.wrap_err(format!(
                "Failed to create settings directory: {}",
                parent.display()
            ))?;
        }
        fs::write(&self.path, content).await.wrap_err(format!(
            "Failed to write settings at: {}",
            self.path.display()
        ))?;

        #[cfg(unix)]
        {
            use std::{fs::Permissions, os::unix::fs::PermissionsExt as _};
            // the record holds a password
            fs::set_permissions(&self.path, Permissions::from_mode(0o600))
                .await
                .wrap_err("Failed to restrict settings file permissions")?;
        }

        debug!(path = %self.path.display(), "Settings saved");
        Ok(())
    }
}
