//! Duet Signal Server
//!
//! WebSocket signaling server for two-peer WebRTC rendezvous.
//!
//! # Usage
//!
//! ```bash
//! # Defaults (port 3000, config from the user config dir)
//! duet-signal
//!
//! # Serve the web client too
//! duet-signal --port 8080 --public-dir ./public
//!
//! # TURN credentials come from the environment
//! METERED_USERNAME=... METERED_CREDENTIAL=... duet-signal
//! ```

use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use duet_core::Config;
use duet_signal::SignalServer;

#[derive(Parser, Debug)]
#[command(name = "duet-signal")]
#[command(about = "Duet signaling server for two-peer rendezvous")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides config and PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Bind address
    #[arg(short, long)]
    bind: Option<IpAddr>,

    /// Configuration file (defaults to the user config directory)
    #[arg(short, long, env = "DUET_CONFIG")]
    config: Option<PathBuf>,

    /// Directory of static files to serve
    #[arg(long, env = "DUET_PUBLIC_DIR")]
    public_dir: Option<PathBuf>,

    /// Print a sample configuration file and exit
    #[arg(long)]
    sample_config: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let args = Args::parse();

    if args.sample_config {
        print!("{}", Config::sample());
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };
    config.apply_env()?;

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(dir) = args.public_dir {
        config.server.public_dir = Some(dir);
    }

    info!("Starting Duet Signal Server");
    info!(
        "Open http://localhost:{} in your browser",
        config.server.port
    );
    match &config.server.public_dir {
        Some(dir) => info!("Serving static files from {:?}", dir),
        None => info!("No public directory configured, static files disabled"),
    }
    config.ice.log_summary();

    let server = SignalServer::new(config);
    server
        .serve(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for ctrl-c: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    info!("Signal server stopped");
    Ok(())
}
