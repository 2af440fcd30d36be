//! Arcane updater — dependency-aware container image update orchestration.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use arcane_updater::cli::Cli;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    if let Err(e) = cli.run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
