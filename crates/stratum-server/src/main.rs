//! Stratum server binary.

use anyhow::Context;
use clap::Parser;
use stratum_server::{ServerConfig, StratumService};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Template parameter resolution and deployment dispatch service.
#[derive(Parser, Debug)]
#[command(name = "stratum")]
#[command(about = "Serve template parameters and dispatch deployments")]
#[command(version)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialise tracing
    let filter = if cli.verbose {
        "debug,hyper=info,hyper_util=info,tower=info"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    info!("stratum starting");

    let config = ServerConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    if let Err(e) = config.validate() {
        error!(error = %e, "refusing to start");
        return Err(e.into());
    }

    info!(
        listen = %config.server.listen,
        backend = config.backend.as_ref().map_or("none", |b| b.kind()),
        timeout_secs = config.http.timeout_secs,
        "configuration loaded"
    );

    StratumService::new(config).run().await?;
    Ok(())
}
