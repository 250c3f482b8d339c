//! Loopback TCP listening resource.
//!
//! Binds port 0 on a loopback address so the OS picks an unused ephemeral
//! port.  Nothing announces the port; peers learn it from a descriptor.

use std::io;
use std::net::{IpAddr, SocketAddr};

use aipc_core::{PeerStream, TransportAddress};
use async_trait::async_trait;
use tokio::net::TcpListener;
use tracing::{debug, info};

use super::{ListenerError, ListeningResource};

/// A TCP listener on an ephemeral loopback port.
#[derive(Debug)]
pub struct LoopbackTcpListener {
    listener: TcpListener,
    address: TransportAddress,
}

impl LoopbackTcpListener {
    /// Binds an ephemeral port on `ip`.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::NonLoopback`] for non-loopback addresses and
    /// [`ListenerError::BindFailed`] if the socket cannot be bound.
    ///
    /// # Panics
    ///
    /// Must be called from inside a Tokio runtime with I/O enabled.
    pub fn bind(ip: IpAddr) -> Result<Self, ListenerError> {
        if !ip.is_loopback() {
            return Err(ListenerError::NonLoopback(ip));
        }
        let requested = SocketAddr::new(ip, 0);
        let bind_failed = |source| ListenerError::BindFailed {
            address: requested.to_string(),
            source,
        };

        // Bind synchronously so failures surface at server construction.
        let std_listener = std::net::TcpListener::bind(requested).map_err(bind_failed)?;
        std_listener.set_nonblocking(true).map_err(bind_failed)?;
        let local = std_listener.local_addr().map_err(bind_failed)?;
        let listener = TcpListener::from_std(std_listener).map_err(bind_failed)?;

        info!("anonymous TCP listener bound on {local}");
        Ok(Self {
            listener,
            address: TransportAddress::Tcp(local),
        })
    }
}

#[async_trait]
impl ListeningResource for LoopbackTcpListener {
    fn address(&self) -> &TransportAddress {
        &self.address
    }

    async fn accept(&mut self) -> io::Result<PeerStream> {
        let (stream, peer) = self.listener.accept().await?;
        debug!("accepted TCP connection from {peer}");
        Ok(PeerStream::Tcp(stream))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_picks_ephemeral_port() {
        // Arrange / Act
        let listener = LoopbackTcpListener::bind("127.0.0.1".parse().unwrap()).expect("bind");

        // Assert
        match listener.address() {
            TransportAddress::Tcp(addr) => {
                assert_ne!(addr.port(), 0, "OS must assign a concrete port");
                assert!(addr.ip().is_loopback());
            }
            other => panic!("unexpected address {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_accept_yields_connecting_peer() {
        // Arrange
        let mut listener = LoopbackTcpListener::bind("127.0.0.1".parse().unwrap()).unwrap();
        let TransportAddress::Tcp(addr) = listener.address().clone() else {
            panic!("expected TCP address");
        };

        // Act
        let (accepted, connected) =
            tokio::join!(listener.accept(), tokio::net::TcpStream::connect(addr));

        // Assert
        assert!(connected.is_ok());
        assert_eq!(accepted.expect("accept").transport(), "tcp");
    }

    #[test]
    fn test_bind_rejects_unspecified_address() {
        let result = LoopbackTcpListener::bind("0.0.0.0".parse().unwrap());
        assert!(matches!(result, Err(ListenerError::NonLoopback(_))));
    }
}
