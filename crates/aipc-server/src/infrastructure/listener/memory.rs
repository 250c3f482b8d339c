//! In-process listening resource.
//!
//! Allows tests (and hosts that embed both ends in one process) to open
//! connections without any OS socket.  Each [`MemoryConnector::connect`] call
//! creates an in-memory duplex pipe, queues the server half on the listener,
//! and returns the peer half.  Connections arrive in the order `connect` was
//! called.
//!
//! The published address is [`TransportAddress::Memory`], which
//! [`aipc_core::connect`] refuses: in-process descriptors do not cross process
//! boundaries.

use std::io;

use aipc_core::{ConnectError, PeerStream, TransportAddress};
use async_trait::async_trait;
use tokio::io::DuplexStream;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::ListeningResource;

/// Per-direction buffer size of each in-memory pipe.
const PIPE_CAPACITY: usize = 64 * 1024;

/// The listener half: handed to the server.
#[derive(Debug)]
pub struct MemoryListener {
    address: TransportAddress,
    incoming: mpsc::UnboundedReceiver<DuplexStream>,
}

/// The connector half: kept by whoever plays the peer.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    address: TransportAddress,
    outgoing: mpsc::UnboundedSender<DuplexStream>,
}

/// Creates a connected listener/connector pair.
pub fn memory_listener() -> (MemoryListener, MemoryConnector) {
    let address = TransportAddress::Memory(Uuid::new_v4());
    let (tx, rx) = mpsc::unbounded_channel();
    (
        MemoryListener {
            address: address.clone(),
            incoming: rx,
        },
        MemoryConnector {
            address,
            outgoing: tx,
        },
    )
}

impl MemoryConnector {
    /// Opens a new connection to the listener.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError::Io`] with `ConnectionRefused` once the listener
    /// has been dropped.
    pub fn connect(&self) -> Result<PeerStream, ConnectError> {
        let (server_half, peer_half) = tokio::io::duplex(PIPE_CAPACITY);
        self.outgoing
            .send(server_half)
            .map_err(|_| ConnectError::Io {
                address: self.address.clone(),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "listener cancelled"),
            })?;
        Ok(PeerStream::Memory(peer_half))
    }

    pub fn address(&self) -> &TransportAddress {
        &self.address
    }

    /// Returns `true` once the listener half has been dropped.
    pub fn is_listener_closed(&self) -> bool {
        self.outgoing.is_closed()
    }
}

#[async_trait]
impl ListeningResource for MemoryListener {
    fn address(&self) -> &TransportAddress {
        &self.address
    }

    async fn accept(&mut self) -> io::Result<PeerStream> {
        match self.incoming.recv().await {
            Some(stream) => Ok(PeerStream::Memory(stream)),
            // Every connector is gone, so no connection can ever arrive.
            None => std::future::pending().await,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
