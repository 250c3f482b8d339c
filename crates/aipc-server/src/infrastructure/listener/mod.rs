//! Listening resources: the OS-facing producers of incoming connections.
//!
//! A listening resource is bound at construction and accepts from that moment
//! on; there is no separate "arm" step.  It is driven by exactly one accept
//! loop task owned by the server, and it is released by dropping it: the
//! server cancels the accept loop, the loop drops the resource, and the
//! resource closes its socket (and removes its socket file, for Unix).
//!
//! # Backends
//!
//! - **`unix`** – A Unix domain socket inside a freshly created `0700`
//!   directory with a random name.  Nothing registers the path anywhere; a
//!   peer learns it only from a descriptor.
//! - **`tcp`** – An ephemeral port on a loopback address.
//! - **`memory`** – An in-process listener for tests and embedding, fed by a
//!   [`memory::MemoryConnector`].
//!
//! # Testability
//!
//! The [`ListeningResource`] trait lets the server be exercised against the
//! memory backend, where the test decides exactly when each connection
//! arrives.

use std::io;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Instant;

use aipc_core::{PeerStream, TransportAddress};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod memory;
pub mod tcp;
#[cfg(unix)]
pub mod unix;

/// Sequence number assigned to each accepted connection, in arrival order.
pub type ConnectionId = u64;

/// Error type for creating a listening resource.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The private socket directory could not be created.
    #[error("failed to prepare socket directory {path}: {source}")]
    SocketDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The Unix socket path would not fit in `sun_path`.
    #[error("socket path {path} is {len} bytes; the platform limit is {max}")]
    SocketPathTooLong { path: PathBuf, len: usize, max: usize },

    /// The socket could not be bound.
    #[error("bind failed on {address}: {source}")]
    BindFailed {
        address: String,
        #[source]
        source: io::Error,
    },

    /// TCP listeners only bind loopback addresses.
    #[error("refusing to bind non-loopback address {0}")]
    NonLoopback(IpAddr),

    /// The requested transport does not exist on this platform.
    #[error("transport {0:?} is not supported on this platform")]
    Unsupported(TransportKind),
}

/// Which backend to bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Unix,
    Tcp,
}

impl Default for TransportKind {
    fn default() -> Self {
        if cfg!(unix) {
            TransportKind::Unix
        } else {
            TransportKind::Tcp
        }
    }
}

/// Everything needed to bind a listening resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerOptions {
    pub transport: TransportKind,
    /// Parent directory for the private Unix socket directory.
    pub socket_dir: PathBuf,
    /// Loopback address for TCP listeners.
    pub bind_address: IpAddr,
}

impl Default for ListenerOptions {
    fn default() -> Self {
        Self {
            transport: TransportKind::default(),
            socket_dir: std::env::temp_dir(),
            bind_address: IpAddr::from([127, 0, 0, 1]),
        }
    }
}

/// One not-yet-validated peer connection.
///
/// Moves from the accept loop into either the pending queue or the
/// activator; it is never in both.
#[derive(Debug)]
pub struct IncomingConnection {
    id: ConnectionId,
    accepted_at: Instant,
    stream: PeerStream,
}

impl IncomingConnection {
    pub fn new(id: ConnectionId, stream: PeerStream) -> Self {
        Self {
            id,
            accepted_at: Instant::now(),
            stream,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// When the accept loop took the connection off the listener.
    pub fn accepted_at(&self) -> Instant {
        self.accepted_at
    }

    pub fn transport(&self) -> &'static str {
        self.stream.transport()
    }

    pub fn into_stream(self) -> PeerStream {
        self.stream
    }
}

/// An anonymous acceptance handle.
///
/// Implementations are owned by a single accept loop, so `accept` takes
/// `&mut self`.  Dropping the resource must stop further connections from
/// being established through its address.
#[async_trait]
pub trait ListeningResource: Send + 'static {
    /// The address peers connect to; published inside every descriptor.
    fn address(&self) -> &TransportAddress;

    /// Waits for the next incoming connection.
    async fn accept(&mut self) -> io::Result<PeerStream>;
}

/// Binds the backend selected by `options`.
///
/// # Errors
///
/// Returns [`ListenerError`] if the socket cannot be created.
///
/// # Panics
///
/// Must be called from inside a Tokio runtime with I/O enabled.
pub fn bind_listener(options: &ListenerOptions) -> Result<Box<dyn ListeningResource>, ListenerError> {
    match options.transport {
        #[cfg(unix)]
        TransportKind::Unix => Ok(Box::new(unix::UnixSocketListener::bind(&options.socket_dir)?)),
        #[cfg(not(unix))]
        TransportKind::Unix => Err(ListenerError::Unsupported(TransportKind::Unix)),
        TransportKind::Tcp => Ok(Box::new(tcp::LoopbackTcpListener::bind(options.bind_address)?)),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
