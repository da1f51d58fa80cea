//! Library entry for the panel.
//!
//! Exposes `inner_main` so a workspace-level shim binary can call into the panel logic.
//!
//! Provides commands to serve the control API or to run single container and
//! query operations from the command line.

extern crate alloc;
extern crate core;

pub mod app;
pub mod cli;
pub mod config;
pub mod container;
pub mod http;
pub mod process;
pub mod query;
mod run;
pub mod session;
pub mod settings;
pub mod status;

#[cfg(test)]
mod test_support;

// for use in integration tests
pub use http::WsMessage;

use std::{env, fs, io, process as std_process, sync::Once};

use eyre::{Result, WrapErr as _};
use tracing::{Instrument as _, info};
use tracing_subscriber::{EnvFilter, fmt::time::ChronoLocal};

use cli::{Cli, Command, LogFormat};

use crate::run::{container_command, query_command, start};

static INIT_TRACING: Once = Once::new();

fn init_tracing(log_format: LogFormat) {
    INIT_TRACING.call_once(move || {
        let default_level = if env::var("SURREALPANEL_INTEGRATION_TEST").is_ok() {
            "error"
        } else {
            "info"
        };

        let builder = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
            )
            .with_timer(ChronoLocal::rfc_3339())
            .with_writer(io::stderr);

        match log_format {
            LogFormat::Compact => builder.compact().init(),
            LogFormat::Json => builder.json().init(),
            LogFormat::Pretty => builder.pretty().init(),
        }
    });
}

/// The panel's main function; can be called from a shim binary.
///
/// Parses CLI and dispatches server startup or a one-shot command.
///
/// # Errors
///
/// Returns an error if the config file is missing or invalid, the server fails
/// to start, or a one-shot command fails.
pub async fn inner_main(invocation: Cli) -> Result<()> {
    init_tracing(invocation.log_format);

    let config = &invocation.config;
    let config_path =
        fs::canonicalize(config).wrap_err(format!("Config file not found at: {config}"))?;

    let startup_span = tracing::info_span!("panel", ?config_path, pid = ?std_process::id(), version = env!("CARGO_PKG_VERSION"));

    match invocation.command {
        Command::Serve(args) => {
            info!(parent: &startup_span, "Starting panel");
            start(&config_path, args.port, args.bind.as_deref())
                .instrument(startup_span)
                .await
        }
        Command::Container { action } => {
            container_command(&config_path, action)
                .instrument(startup_span)
                .await
        }
        Command::Query { text } => query_command(&config_path, &text).instrument(startup_span).await,
    }
}
