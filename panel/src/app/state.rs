use alloc::sync::Arc;
use std::path::Path;

use tracing::{Instrument as _, info};

use crate::{
    app::{AutoConnect, ControlPanel},
    config::{ServerConfig, load},
};

/// Application state shared across request handlers.
#[derive(Clone)]
pub(crate) struct AppState {
    pub panel: Arc<ControlPanel>,
}

/// Loads the config, builds the panel and kicks off the startup auto-connect.
#[tracing::instrument(skip_all)]
pub(crate) async fn initialize_state(config_path: &Path) -> eyre::Result<(AppState, ServerConfig)> {
    let config = load(config_path).await?;
    let panel = Arc::new(ControlPanel::new(&config, config_path));
    info!(
        container = %panel.container_name(),
        runtime = %config.container.runtime,
        "Panel initialized"
    );

    let startup_panel = panel.clone();
    tokio::spawn(
        async move {
            match startup_panel.auto_connect_on_startup().await {
                AutoConnect::Connected => info!("Auto-connected on startup"),
                AutoConnect::Disabled | AutoConnect::Failed(_) => {}
            }
        }
        .in_current_span(),
    );

    Ok((AppState { panel }, config.server))
}
