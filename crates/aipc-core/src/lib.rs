//! # aipc-core
//!
//! Shared library for anonymous IPC endpoints: the descriptor a server hands
//! to its peers, the connection-acceptance state machine, and the stream type
//! both sides talk over.
//!
//! This crate is used by both the server and the peer (client) crates.
//!
//! # Architecture overview (for beginners)
//!
//! An *anonymous endpoint* is an IPC rendezvous point that is never registered
//! under a discoverable name.  The only way for another process to reach it is
//! to be handed an [`EndpointDescriptor`] out of band (for example through a
//! pipe, a file the parent wrote, or a message on an existing connection).
//!
//! - **`domain`** – Pure logic with no I/O.  The most important piece is the
//!   [`AcceptanceQueue`]: the small state machine that decides whether an
//!   arriving connection is buffered or activated immediately, and that drains
//!   the buffer in arrival order when the server starts.
//!
//! - **`transport`** – The [`PeerStream`] byte stream and [`connect`], which
//!   turns a descriptor back into a live connection.

pub mod domain;
pub mod transport;

pub use domain::descriptor::{
    ConnectionDescriptor, DescriptorError, EndpointDescriptor, ListenerId, TransportAddress,
};
pub use domain::lifecycle::{AcceptanceQueue, Arrival, ServerState};
pub use domain::requirement::ClientRequirement;
pub use transport::{connect, ConnectError, PeerStream};
