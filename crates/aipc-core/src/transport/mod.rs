//! Byte streams between a server and its peers.
//!
//! [`PeerStream`] is the one stream type both sides see, whatever transport
//! the listener happens to use.  It implements tokio's `AsyncRead` and
//! `AsyncWrite`, so callers can use `AsyncReadExt`, `BufReader`, `split`, and
//! friends without knowing which socket family is underneath.
//!
//! [`connect`] is the peer half of the rendezvous: it resolves an
//! [`EndpointDescriptor`] into a fresh connection to the listener the
//! descriptor references.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;
use tracing::debug;

use crate::domain::descriptor::{EndpointDescriptor, TransportAddress};

/// Errors that can occur while connecting to a descriptor.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The listener could not be reached (cancelled, or never existed).
    #[error("failed to connect to {address}: {source}")]
    Io {
        address: TransportAddress,
        #[source]
        source: io::Error,
    },

    /// The descriptor references an in-process listener.
    #[error("descriptor at {0} is only reachable inside the process that created it")]
    NotTransmissible(TransportAddress),

    /// The descriptor uses a transport this platform does not provide.
    #[error("transport {0} is not supported on this platform")]
    Unsupported(TransportAddress),
}

/// A connected, bidirectional byte stream.
#[derive(Debug)]
pub enum PeerStream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
    /// One half of an in-process pipe.
    Memory(DuplexStream),
}

impl PeerStream {
    /// Short transport name, used in log fields.
    pub fn transport(&self) -> &'static str {
        match self {
            PeerStream::Tcp(_) => "tcp",
            #[cfg(unix)]
            PeerStream::Unix(_) => "unix",
            PeerStream::Memory(_) => "memory",
        }
    }
}

impl AsyncRead for PeerStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            PeerStream::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            #[cfg(unix)]
            PeerStream::Unix(s) => Pin::new(s).poll_read(cx, buf),
            PeerStream::Memory(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for PeerStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            PeerStream::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            #[cfg(unix)]
            PeerStream::Unix(s) => Pin::new(s).poll_write(cx, buf),
            PeerStream::Memory(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            PeerStream::Tcp(s) => Pin::new(s).poll_flush(cx),
            #[cfg(unix)]
            PeerStream::Unix(s) => Pin::new(s).poll_flush(cx),
            PeerStream::Memory(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            PeerStream::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            #[cfg(unix)]
            PeerStream::Unix(s) => Pin::new(s).poll_shutdown(cx),
            PeerStream::Memory(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

/// Opens a new connection to the listener referenced by `descriptor`.
///
/// # Errors
///
/// - [`ConnectError::Io`] if the listener is gone or refuses the connection.
/// - [`ConnectError::NotTransmissible`] for in-process descriptors.
/// - [`ConnectError::Unsupported`] for Unix descriptors on non-Unix targets.
pub async fn connect(descriptor: &EndpointDescriptor) -> Result<PeerStream, ConnectError> {
    let address = descriptor.address();
    debug!(listener_id = %descriptor.listener_id(), %address, "connecting to endpoint");

    match address {
        TransportAddress::Tcp(addr) => TcpStream::connect(addr)
            .await
            .map(PeerStream::Tcp)
            .map_err(|source| ConnectError::Io {
                address: address.clone(),
                source,
            }),
        #[cfg(unix)]
        TransportAddress::Unix(path) => UnixStream::connect(path)
            .await
            .map(PeerStream::Unix)
            .map_err(|source| ConnectError::Io {
                address: address.clone(),
                source,
            }),
        #[cfg(not(unix))]
        TransportAddress::Unix(_) => Err(ConnectError::Unsupported(address.clone())),
        TransportAddress::Memory(_) => Err(ConnectError::NotTransmissible(address.clone())),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
