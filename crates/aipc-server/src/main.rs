//! Anonymous IPC server host.
//!
//! Binds an anonymous endpoint, publishes one descriptor for it, then hands
//! the process over to the server until Ctrl+C.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()            -- server.toml (or --config)
//!  └─ AnonymousServer::bind()  -- listener bound, connections buffered
//!  └─ publish descriptor       -- JSON on stdout or --descriptor-out
//!  └─ start_and_block()        -- drains the buffer, never returns Ok
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use aipc_server::application::activate::SpawningActivator;
use aipc_server::application::anonymous_server::AnonymousServer;
use aipc_server::application::server::Server;
use aipc_server::infrastructure::listener::TransportKind;
use aipc_server::infrastructure::session::EchoSession;
use aipc_server::infrastructure::storage::config::{load_config, load_config_from};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Listener transport selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TransportArg {
    Unix,
    Tcp,
}

impl From<TransportArg> for TransportKind {
    fn from(arg: TransportArg) -> Self {
        match arg {
            TransportArg::Unix => TransportKind::Unix,
            TransportArg::Tcp => TransportKind::Tcp,
        }
    }
}

/// Anonymous IPC endpoint server.
///
/// Prints a descriptor that peers use to connect; nothing else can find the
/// endpoint.
#[derive(Debug, Parser)]
#[command(name = "aipc-server", about = "Anonymous IPC endpoint server", version)]
struct Cli {
    /// Path to the TOML config file.  Defaults to the platform config dir.
    #[arg(long, env = "AIPC_CONFIG")]
    config: Option<PathBuf>,

    /// Write the descriptor JSON to this file instead of stdout.
    #[arg(long)]
    descriptor_out: Option<PathBuf>,

    /// Override the configured listener transport.
    #[arg(long, value_enum)]
    transport: Option<TransportArg>,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config_from(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => load_config().context("failed to load config")?,
    };

    // `RUST_LOG` wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level)),
        )
        .init();

    let mut options = config.listener_options()?;
    if let Some(transport) = cli.transport {
        options.transport = transport.into();
    }

    info!(
        transport = ?options.transport,
        requirement = %config.server.client_requirement,
        "aipc-server starting"
    );

    let activator = Arc::new(SpawningActivator::new(EchoSession));
    let server = AnonymousServer::bind(
        &options,
        config.server.client_requirement.clone(),
        activator,
    )
    .context("failed to bind anonymous endpoint")?;

    // ── Publish descriptor ────────────────────────────────────────────────────
    let descriptor = server.endpoint().to_json()?;
    match &cli.descriptor_out {
        Some(path) => {
            std::fs::write(path, &descriptor)
                .with_context(|| format!("failed to write descriptor to {}", path.display()))?;
            info!(path = %path.display(), "descriptor written");
        }
        None => println!("{descriptor}"),
    }

    // ── Serve until Ctrl+C ────────────────────────────────────────────────────
    tokio::select! {
        result = server.start_and_block() => {
            let never = result.context("server failed to start")?;
            match never {}
        }
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                error!("failed to listen for Ctrl+C signal: {e}");
            }
            info!("received Ctrl+C; shutting down");
        }
    }

    server.invalidate().await?;
    info!("aipc-server stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
