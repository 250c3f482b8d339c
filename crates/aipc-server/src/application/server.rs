//! Server abstractions shared by every kind of IPC server.
//!
//! - [`Server`] is what a hosting process needs: a way to hand its process
//!   over to the server forever, plus the descriptors peers use to reach it.
//! - [`NonBlockingServer`] adds [`start`](NonBlockingServer::start) for hosts
//!   that have other work to do after the server is running.

use std::convert::Infallible;

use aipc_core::{ConnectionDescriptor, EndpointDescriptor};
use async_trait::async_trait;

use super::anonymous_server::ServerError;

#[async_trait]
pub trait Server: Send + Sync {
    /// Starts the server and then parks the calling task in the runtime for
    /// good.
    ///
    /// The success type is uninhabited: this only ever returns an error, and
    /// only if the server could not be started at all.  Code placed after a
    /// successful call never runs.
    async fn start_and_block(&self) -> Result<Infallible, ServerError>;

    /// How peers reach this server.
    fn connection_descriptor(&self) -> ConnectionDescriptor;

    /// Derives a fresh descriptor referencing this server's listener.
    fn endpoint(&self) -> EndpointDescriptor;
}

#[async_trait]
pub trait NonBlockingServer: Server {
    /// Begins activating connections and returns once every connection that
    /// arrived earlier has been handed to the activator.
    async fn start(&self) -> Result<(), ServerError>;
}
