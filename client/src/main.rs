//! HidGuard Client
//!
//! Answers gatekeeper access requests for one process until interrupted.

use anyhow::Result;
use clap::Parser;
use hidguard_client::config::ClientConfig;
use hidguard_client::{ClientOptions, HidGuardClient};
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// HidGuard Client - whitelist-based device access decisions
#[derive(Parser, Debug)]
#[command(name = "hidguard")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Gatekeeper endpoint (overrides configuration)
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Process to decide for (defaults to this process)
    #[arg(short, long)]
    pid: Option<u32>,

    /// Hardware id to whitelist (repeatable)
    #[arg(short, long = "allow")]
    allow: Vec<String>,

    /// Run in verbose mode
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("HidGuard Client v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = match &args.config {
        Some(path) => {
            let config = ClientConfig::load(path).await?;
            info!("Loaded configuration from {}", path);
            config
        }
        None => ClientConfig::default(),
    };

    if let Some(endpoint) = args.endpoint {
        config.server.endpoint = endpoint;
    }
    if let Some(pid) = args.pid {
        config.client.process_id = Some(pid);
    }
    config.client.hardware_ids.extend(args.allow);

    let client = HidGuardClient::connect(ClientOptions::from(&config)).await?;
    info!(
        "Deciding for pid {} with {} whitelisted hardware id(s)",
        client.process_id(),
        config.client.hardware_ids.len()
    );

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
        _ = client.disconnected() => info!("Gatekeeper closed the connection"),
    }

    let summary = client.summary();
    info!(
        "Requests seen: {} (processing: {}, processed: {}, error: {})",
        summary.total(),
        summary.processing,
        summary.processed,
        summary.error
    );

    // Cleanup
    client.shutdown().await;

    Ok(())
}
