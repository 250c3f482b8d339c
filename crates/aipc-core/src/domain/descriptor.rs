//! Endpoint descriptors: the only artifact a server emits across process
//! boundaries.
//!
//! A descriptor references exactly one listening resource.  It carries:
//!
//! - the [`ConnectionDescriptor`] kind of the server that published it
//!   (always [`ConnectionDescriptor::Anonymous`] here),
//! - the [`ListenerId`] of the listening resource,
//! - a fresh per-call nonce, so two descriptors derived from the same
//!   listener are structurally distinct values,
//! - the [`TransportAddress`] a peer connects to.
//!
//! # Transmission
//!
//! Descriptors are handed to peers out of band.  Two encodings are provided:
//! a compact binary form ([`EndpointDescriptor::to_bytes`], bincode) for
//! passing over an existing channel, and a JSON form
//! ([`EndpointDescriptor::to_json`]) for command lines, environment variables
//! and files.  Both carry [`DESCRIPTOR_VERSION`] and reject any other version
//! on decode.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Format version embedded in every encoded descriptor.
pub const DESCRIPTOR_VERSION: u8 = 1;

/// Unique identifier of one listening resource, derived from UUID v4.
pub type ListenerId = Uuid;

/// Errors that can occur when encoding or decoding a descriptor.
#[derive(Debug, Error)]
pub enum DescriptorError {
    /// The binary form could not be produced or parsed.
    #[error("binary descriptor codec error: {0}")]
    Binary(#[from] bincode::Error),

    /// The JSON form could not be produced or parsed.
    #[error("JSON descriptor codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// The descriptor was produced by an incompatible version.
    #[error("unsupported descriptor version {found} (expected {DESCRIPTOR_VERSION})")]
    UnsupportedVersion { found: u8 },
}

/// How the publishing server is reached.
///
/// Named servers would be looked up through a discovery service; anonymous
/// servers are reachable only through a descriptor someone handed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionDescriptor {
    /// The server has no discoverable name.
    Anonymous,
}

/// Where a peer connects to reach the listening resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportAddress {
    /// A Unix domain socket inside a private, unlisted directory.
    Unix(PathBuf),
    /// An ephemeral loopback TCP port.
    Tcp(SocketAddr),
    /// An in-process listener; valid only inside the process that created it.
    Memory(Uuid),
}

impl fmt::Display for TransportAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportAddress::Unix(path) => write!(f, "unix:{}", path.display()),
            TransportAddress::Tcp(addr) => write!(f, "tcp:{addr}"),
            TransportAddress::Memory(id) => write!(f, "memory:{id}"),
        }
    }
}

/// An immutable, transmissible value referencing one listening resource.
///
/// Validity is governed by the listening resource alone: a descriptor keeps
/// working for as long as the listener it references has not been cancelled,
/// whether or not the owning server has been started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    version: u8,
    connection_descriptor: ConnectionDescriptor,
    listener_id: ListenerId,
    nonce: Uuid,
    address: TransportAddress,
}

impl EndpointDescriptor {
    /// Derives a fresh descriptor for the listener `listener_id` at `address`.
    ///
    /// Every call produces a new nonce.
    pub fn new(
        connection_descriptor: ConnectionDescriptor,
        listener_id: ListenerId,
        address: TransportAddress,
    ) -> Self {
        Self {
            version: DESCRIPTOR_VERSION,
            connection_descriptor,
            listener_id,
            nonce: Uuid::new_v4(),
            address,
        }
    }

    pub fn connection_descriptor(&self) -> ConnectionDescriptor {
        self.connection_descriptor
    }

    pub fn listener_id(&self) -> ListenerId {
        self.listener_id
    }

    pub fn nonce(&self) -> Uuid {
        self.nonce
    }

    pub fn address(&self) -> &TransportAddress {
        &self.address
    }

    /// Returns `true` if both descriptors resolve to the same listening resource.
    pub fn same_listener(&self, other: &EndpointDescriptor) -> bool {
        self.listener_id == other.listener_id && self.address == other.address
    }

    /// Encodes the descriptor into its compact binary form.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::Binary`] if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DescriptorError> {
        Ok(bincode::serialize(self)?)
    }

    /// Decodes a descriptor from its compact binary form.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::Binary`] for malformed input and
    /// [`DescriptorError::UnsupportedVersion`] for a foreign version byte.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DescriptorError> {
        let descriptor: EndpointDescriptor = bincode::deserialize(bytes)?;
        descriptor.check_version()
    }

    /// Encodes the descriptor as a single-line JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String, DescriptorError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decodes a descriptor from its JSON form.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::Json`] for malformed input and
    /// [`DescriptorError::UnsupportedVersion`] for a foreign version number.
    pub fn from_json(text: &str) -> Result<Self, DescriptorError> {
        let descriptor: EndpointDescriptor = serde_json::from_str(text.trim())?;
        descriptor.check_version()
    }

    fn check_version(self) -> Result<Self, DescriptorError> {
        if self.version != DESCRIPTOR_VERSION {
            return Err(DescriptorError::UnsupportedVersion {
                found: self.version,
            });
        }
        Ok(self)
    }
}

impl fmt::Display for EndpointDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} listener {} at {}", self.connection_descriptor, self.listener_id, self.address)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
