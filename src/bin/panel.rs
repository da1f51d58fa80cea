//! Shim binary that calls into the `surrealpanel_panel` library's `inner_main`.
use clap::Parser as _;
use eyre::Result;
use surrealpanel_panel::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Delegate to library entrypoint
    surrealpanel_panel::inner_main(Cli::parse()).await
}
