//! Default session handler used by the host binary.
//!
//! [`EchoSession`] reads newline-terminated lines from the peer and writes
//! each one straight back.  It does not evaluate the client requirement; it
//! logs it so the hand-off from the acceptance core can be observed.

use aipc_core::ClientRequirement;
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::application::activate::SessionHandler;
use crate::infrastructure::listener::IncomingConnection;

/// Echoes every line it receives.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoSession;

#[async_trait]
impl SessionHandler for EchoSession {
    async fn serve(&self, connection: IncomingConnection, requirement: ClientRequirement) {
        let connection_id = connection.id();
        let queued_for = connection.accepted_at().elapsed();
        info!(
            connection_id,
            transport = connection.transport(),
            %requirement,
            queued_ms = queued_for.as_millis() as u64,
            "session started"
        );

        match echo_lines(connection.into_stream()).await {
            Ok(lines) => debug!(connection_id, lines, "peer closed session"),
            Err(e) => warn!(connection_id, error = %e, "session ended with I/O error"),
        }
    }
}

/// Copies lines from `stream` back to it until end of input.
///
/// Returns the number of lines echoed.
pub async fn echo_lines<S>(stream: S) -> std::io::Result<u64>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut lines = BufReader::new(reader).lines();
    let mut count = 0;
    while let Some(line) = lines.next_line().await? {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        count += 1;
    }
    Ok(count)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
