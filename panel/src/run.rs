use alloc::string;
use core::net::{IpAddr, SocketAddr};
use std::path::Path;

use eyre::WrapErr as _;
use serde::Serialize;
use serde_json::json;
use tokio::{net, signal};
use tracing::{info, warn};

use crate::{
    app::{AppState, ControlPanel, initialize_state},
    cli::ContainerCommand,
    config::load,
    http::server::router,
};

/// Creates a future that resolves when a shutdown signal is received.
pub(crate) async fn shutdown_signal() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = signal::ctrl_c() => {}
                }
            }
            Err(e) => {
                warn!("Failed to create SIGTERM handler, only listening for Ctrl-C: {}", e);
                drop(signal::ctrl_c().await);
            }
        }
    }
    #[cfg(not(unix))]
    {
        drop(signal::ctrl_c().await);
    }
}

/// Start the HTTP server on `listen_ip:listen_port`.
pub(crate) async fn start_server(
    app_state: AppState,
    listen_ip: IpAddr,
    listen_port: u16,
) -> eyre::Result<()> {
    let app = router::create_app(app_state);

    let addr = SocketAddr::from((listen_ip, listen_port));

    let listener = net::TcpListener::bind(addr)
        .await
        .wrap_err(format!("Failed to bind to {addr}"))?;
    info!("Listening on http://{}", addr);
    let server = axum::serve(listener, app);
    tokio::select! {
        res = server => res?,
        () = shutdown_signal() => {
            info!("Received shutdown, shutting down");
        }
    }

    Ok(())
}

/// # Errors
///
/// Returns an error if the configuration cannot be loaded, the bind address is invalid, or the server cannot bind.
pub(crate) async fn start(
    config_path: &Path,
    port_override: Option<u16>,
    bind_override: Option<&str>,
) -> eyre::Result<()> {
    info!("Starting HTTP server...");

    let (app_state, server) = initialize_state(config_path).await?;

    // Apply optional overrides from the CLI
    let listen_port = port_override.unwrap_or(server.port);
    let bind_str = bind_override.map_or_else(|| server.bind.clone(), string::ToString::to_string);

    let listen_ip: IpAddr = bind_str
        .parse()
        .wrap_err(format!("Invalid bind address: {bind_str}"))?;

    start_server(app_state, listen_ip, listen_port).await
}

fn print_json<T: Serialize>(value: &T) -> eyre::Result<()> {
    let rendered = serde_json::to_string_pretty(value).wrap_err("Failed to render output")?;
    println!("{rendered}");
    Ok(())
}

/// Runs one lifecycle operation and prints its outcome.
///
/// # Errors
///
/// Returns an error if the config cannot be loaded or the operation fails.
pub(crate) async fn container_command(
    config_path: &Path,
    action: ContainerCommand,
) -> eyre::Result<()> {
    let config = load(config_path).await?;
    let panel = ControlPanel::new(&config, config_path);

    match action {
        ContainerCommand::Start => print_json(&panel.start().await?),
        ContainerCommand::Stop => print_json(&panel.stop().await?),
        ContainerCommand::Restart => print_json(&panel.restart().await?),
        ContainerCommand::Inspect => print_json(&json!({
            "container": panel.container_name(),
            "state": panel.inspect().await,
        })),
    }
}

/// Connects with the saved settings, runs `text` and prints the result.
///
/// # Errors
///
/// Returns an error if the config cannot be loaded, the connect fails or the query fails.
pub(crate) async fn query_command(config_path: &Path, text: &str) -> eyre::Result<()> {
    let config = load(config_path).await?;
    let panel = ControlPanel::new(&config, config_path);

    panel.connect().await.wrap_err("Failed to connect")?;
    let outcome = panel.execute_query(text).await;
    panel.disconnect().await;
    let result = outcome?;

    print_json(&json!({
        "elapsed_ms": result.elapsed.as_secs_f64() * 1000.0,
        "result": result.payload,
    }))
}
