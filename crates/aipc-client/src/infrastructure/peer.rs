//! Line-oriented session with an anonymous endpoint.
//!
//! A [`PeerSession`] owns one connection opened from an
//! [`EndpointDescriptor`].  Requests and replies are UTF-8 lines terminated by
//! `\n`; the line terminator is stripped from everything returned.

use std::path::{Path, PathBuf};

use aipc_core::{connect, ConnectError, DescriptorError, EndpointDescriptor, PeerStream};
use thiserror::Error;
use tokio::io::{
    AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, ReadHalf, WriteHalf,
};
use tracing::debug;

/// Error type for peer-side operations.
#[derive(Debug, Error)]
pub enum PeerError {
    /// Neither an inline descriptor nor a descriptor file was supplied.
    #[error("no descriptor given; pass --descriptor or --descriptor-file")]
    MissingDescriptor,

    /// The descriptor file could not be read.
    #[error("failed to read descriptor file {path}: {source}")]
    DescriptorFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The descriptor text could not be decoded.
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    /// The listener could not be reached.
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// Reading or writing the connection failed.
    #[error("session I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The server closed the connection before replying.
    #[error("server closed the connection")]
    Closed,
}

/// Decodes a descriptor from inline JSON or, failing that, from a file.
///
/// The inline form wins when both are given.
///
/// # Errors
///
/// Returns [`PeerError::MissingDescriptor`] if neither source is given,
/// [`PeerError::DescriptorFile`] if the file cannot be read, and
/// [`PeerError::Descriptor`] if the JSON is invalid.
pub fn load_descriptor(
    inline: Option<&str>,
    file: Option<&Path>,
) -> Result<EndpointDescriptor, PeerError> {
    let text = match (inline, file) {
        (Some(text), _) => text.to_string(),
        (None, Some(path)) => {
            std::fs::read_to_string(path).map_err(|source| PeerError::DescriptorFile {
                path: path.to_path_buf(),
                source,
            })?
        }
        (None, None) => return Err(PeerError::MissingDescriptor),
    };
    Ok(EndpointDescriptor::from_json(&text)?)
}

/// An open connection to an anonymous endpoint.
#[derive(Debug)]
pub struct PeerSession {
    lines: Lines<BufReader<ReadHalf<PeerStream>>>,
    writer: WriteHalf<PeerStream>,
}

impl PeerSession {
    /// Connects to the listener referenced by `descriptor`.
    ///
    /// # Errors
    ///
    /// Returns [`PeerError::Connect`] if the listener is unreachable, for
    /// example because the server has been invalidated.
    pub async fn connect(descriptor: &EndpointDescriptor) -> Result<Self, PeerError> {
        let stream = connect(descriptor).await?;
        debug!(
            listener_id = %descriptor.listener_id(),
            transport = stream.transport(),
            "connected to anonymous endpoint"
        );
        Ok(Self::from_stream(stream))
    }

    /// Wraps an already connected stream.
    pub fn from_stream(stream: PeerStream) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            lines: BufReader::new(reader).lines(),
            writer,
        }
    }

    /// Sends one line; a trailing `\n` is appended.
    ///
    /// # Errors
    ///
    /// Returns [`PeerError::Io`] if the write fails.
    pub async fn send_line(&mut self, line: &str) -> Result<(), PeerError> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Waits for the next line from the server.
    ///
    /// Cancel safe: dropping the future loses no data.
    ///
    /// # Errors
    ///
    /// Returns [`PeerError::Closed`] on end of stream and [`PeerError::Io`]
    /// if the read fails.
    pub async fn read_line(&mut self) -> Result<String, PeerError> {
        self.lines.next_line().await?.ok_or(PeerError::Closed)
    }

    /// Sends `line` and waits for one line in reply.
    ///
    /// # Errors
    ///
    /// Same as [`send_line`](Self::send_line) and
    /// [`read_line`](Self::read_line).
    pub async fn request(&mut self, line: &str) -> Result<String, PeerError> {
        self.send_line(line).await?;
        self.read_line().await
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use aipc_core::{ConnectionDescriptor, TransportAddress};
    use tokio::io::AsyncReadExt;
    use uuid::Uuid;

    fn tcp_descriptor() -> EndpointDescriptor {
        EndpointDescriptor::new(
            ConnectionDescriptor::Anonymous,
            Uuid::new_v4(),
            TransportAddress::Tcp("127.0.0.1:9".parse().unwrap()),
        )
    }

    // ── load_descriptor ───────────────────────────────────────────────────────

    #[test]
    fn test_load_descriptor_requires_a_source() {
        let result = load_descriptor(None, None);
        assert!(matches!(result, Err(PeerError::MissingDescriptor)));
    }

    #[test]
    fn test_load_descriptor_parses_inline_json() {
        // Arrange
        let descriptor = tcp_descriptor();
        let json = descriptor.to_json().unwrap();

        // Act
        let loaded = load_descriptor(Some(&json), None).expect("inline JSON");

        // Assert
        assert_eq!(loaded, descriptor);
    }

    #[test]
    fn test_load_descriptor_reads_file() {
        // Arrange
        let descriptor = tcp_descriptor();
        let path = std::env::temp_dir().join(format!("aipc_descriptor_{}.json", Uuid::new_v4()));
        std::fs::write(&path, descriptor.to_json().unwrap()).unwrap();

        // Act
        let loaded = load_descriptor(None, Some(&path));

        // Assert
        assert_eq!(loaded.unwrap(), descriptor);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_descriptor_reports_missing_file() {
        let path = std::env::temp_dir().join(format!("aipc_missing_{}.json", Uuid::new_v4()));
        let result = load_descriptor(None, Some(&path));
        assert!(matches!(result, Err(PeerError::DescriptorFile { .. })));
    }

    #[test]
    fn test_load_descriptor_rejects_garbage() {
        let result = load_descriptor(Some("not json"), None);
        assert!(matches!(result, Err(PeerError::Descriptor(_))));
    }

    // ── PeerSession ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_send_line_appends_newline() {
        // Arrange
        let (ours, mut theirs) = tokio::io::duplex(256);
        let mut session = PeerSession::from_stream(PeerStream::Memory(ours));

        // Act
        session.send_line("hello").await.unwrap();
        let mut buf = [0u8; 6];
        theirs.read_exact(&mut buf).await.unwrap();

        // Assert
        assert_eq!(&buf, b"hello\n");
    }

    #[tokio::test]
    async fn test_request_returns_reply_without_terminator() {
        let (ours, mut theirs) = tokio::io::duplex(256);
        let mut session = PeerSession::from_stream(PeerStream::Memory(ours));
        theirs.write_all(b"pong\n").await.unwrap();

        let reply = session.request("ping").await.unwrap();

        assert_eq!(reply, "pong");
    }

    #[tokio::test]
    async fn test_read_line_reports_closed_on_eof() {
        let (ours, theirs) = tokio::io::duplex(256);
        let mut session = PeerSession::from_stream(PeerStream::Memory(ours));
        drop(theirs);

        let result = session.read_line().await;

        assert!(matches!(result, Err(PeerError::Closed)));
    }

    #[tokio::test]
    async fn test_connect_to_memory_descriptor_is_refused() {
        let descriptor = EndpointDescriptor::new(
            ConnectionDescriptor::Anonymous,
            Uuid::new_v4(),
            TransportAddress::Memory(Uuid::new_v4()),
        );
        let result = PeerSession::connect(&descriptor).await;
        assert!(matches!(result, Err(PeerError::Connect(_))));
    }
}
