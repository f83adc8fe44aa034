//! palaverd - chat relay server
//!
//! Accepts TCP connections, registers each client under a unique
//! display name, and relays broadcast and private messages between
//! them.
//!
//! # Usage
//!
//! ```bash
//! # Start with defaults (port 8888, 50 concurrent sessions)
//! palaverd
//!
//! # Custom port and session limit
//! palaverd --port 7000 --max-connections 200
//!
//! # From a config file, port overridden by the environment
//! PALAVERD_PORT=9000 palaverd --config /etc/palaverd.toml
//!
//! # Enable debug logging
//! RUST_LOG=palaverd=debug palaverd
//! ```
//!
//! # Signal Handling
//!
//! SIGTERM/SIGINT trigger a graceful shutdown: the listener stops
//! accepting, every session receives a farewell and is closed, and the
//! process exits 0 once in-flight workers finish (bounded by the grace
//! period).

use std::net::IpAddr;
use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use palaverd::config::{self, ConfigFile, Overrides, ServerConfig};
use palaverd::registry::spawn_registry;
use palaverd::server::RelayServer;

/// palaver daemon - chat relay server
#[derive(Parser, Debug)]
#[command(name = "palaverd", version, about)]
struct Args {
    /// Path to a TOML config file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to bind
    #[arg(long)]
    bind: Option<IpAddr>,

    /// Maximum number of concurrent sessions
    #[arg(long)]
    max_connections: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("palaverd=info".parse()?)
                .add_directive("palaver_core=info".parse()?)
                .add_directive("palaver_protocol=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let file = match &args.config {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::default(),
    };
    let config = ServerConfig::resolve(
        file,
        Overrides {
            bind: args.bind,
            port: args.port,
            max_connections: args.max_connections,
        },
        config::port_from_env()?,
    )?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        port = config.port,
        max_connections = config.max_connections,
        "palaverd starting"
    );

    // Create cancellation token for graceful shutdown
    let cancel_token = CancellationToken::new();

    // Setup signal handlers
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    // Spawn the member registry
    let registry = spawn_registry();
    info!("Member registry started");

    // Bind and run the server
    let server = RelayServer::bind(config, registry, cancel_token).await?;
    server.run().await?;

    info!("palaverd stopped");
    Ok(())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
