//! Command-line interface definitions for the panel.

use std::env;

use clap::{Parser, Subcommand, ValueEnum};

/// Top-level command-line interface definition.
#[derive(Debug, Parser)]
#[command(name = "panel")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = env!("CARGO_PKG_DESCRIPTION"))]
pub struct Cli {
    /// Path to the configuration file
    #[arg(
        short,
        long,
        global = true,
        env = "SURREALPANEL_CONFIG",
        default_value = "surrealpanel.toml"
    )]
    pub config: String,

    /// Output format of the log lines (written to stderr)
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Compact,
    Json,
    Pretty,
}

/// Available subcommands for the panel.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the HTTP API and status websocket.
    Serve(ServeArgs),

    /// Run a single lifecycle operation against the managed container.
    Container {
        #[arg(value_enum)]
        action: ContainerCommand,
    },

    /// Connect with the saved settings and run one query.
    Query {
        /// Query text, sent verbatim
        text: String,
    },
}

#[derive(Debug, Parser)]
pub struct ServeArgs {
    /// Optional override for the listen port (overrides port in config)
    #[arg(long)]
    pub port: Option<u16>,

    /// Optional override for the bind address (overrides bind in config)
    #[arg(long)]
    pub bind: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ContainerCommand {
    Start,
    Stop,
    Restart,
    Inspect,
}
