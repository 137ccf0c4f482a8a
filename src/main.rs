//! Statkeeper - serve cached player statistics to the stats widget
//!
//! Starts the HTTP server and the background refresher, and stops both on
//! Ctrl-C.

use clap::Parser;
use tracing::{info, warn};

use statkeeper::cli::Cli;
use statkeeper::config::AppConfig;
use statkeeper::{logging, App};

/// Resolves when the process receives Ctrl-C
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        Err(err) => {
            // Without a signal handler, run until killed.
            warn!(error = %err, "could not listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = AppConfig::from_cli(&cli)?;

    logging::init(config.logging.format);

    let app = App::new(config)?;
    app.run(shutdown_signal()).await?;

    Ok(())
}
