//! Anonymous IPC peer.
//!
//! Connects to the endpoint referenced by a descriptor, sends every stdin
//! line as a request, and prints each reply to stdout.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use aipc_client::infrastructure::peer::{load_descriptor, PeerSession};

/// Anonymous IPC peer.
#[derive(Debug, Parser)]
#[command(name = "aipc-client", about = "Talk to an anonymous IPC endpoint", version)]
struct Cli {
    /// Descriptor JSON as printed by the server.
    #[arg(long, env = "AIPC_DESCRIPTOR")]
    descriptor: Option<String>,

    /// File holding the descriptor JSON.
    #[arg(long, conflicts_with = "descriptor")]
    descriptor_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so replies on stdout stay clean.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let descriptor = load_descriptor(cli.descriptor.as_deref(), cli.descriptor_file.as_deref())?;
    info!(%descriptor, "connecting");

    let mut session = PeerSession::connect(&descriptor)
        .await
        .context("failed to reach endpoint")?;

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = stdin.next_line().await? {
        let reply = session.request(&line).await?;
        println!("{reply}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_accepts_descriptor_file() {
        let cli = Cli::parse_from(["aipc-client", "--descriptor-file", "/tmp/endpoint.json"]);
        assert_eq!(cli.descriptor_file, Some(PathBuf::from("/tmp/endpoint.json")));
    }

    #[test]
    fn test_cli_rejects_both_descriptor_sources() {
        let result = Cli::try_parse_from([
            "aipc-client",
            "--descriptor",
            "{}",
            "--descriptor-file",
            "/tmp/endpoint.json",
        ]);
        assert!(result.is_err());
    }
}
