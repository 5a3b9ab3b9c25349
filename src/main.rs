//! questctl - on-chain quest verification CLI
//!
//! Checks whether wallet addresses completed the configured quests and
//! prints the result as JSON. Logs go to stderr, filtered by `RUST_LOG`.

use clap::Parser;
use questcheck::cli::{self, Cli};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();

    // Batch checks over long address lists can be interrupted
    let result = tokio::select! {
        result = cli::run(args) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
