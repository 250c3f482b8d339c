//! Connection activation: handing accepted connections to whatever services
//! them.
//!
//! The acceptance core only ever calls [`ConnectionActivator::activate`].  What
//! happens next (checking the peer against the [`ClientRequirement`], decoding
//! requests, dispatching them) is the activator's business.
//!
//! # Contract
//!
//! `activate` is called from the listener's serialized execution context, so
//! it must only *schedule* work and return.  It may be called any number of
//! times, including concurrently from several servers, and during a drain it
//! sees connections in arrival order.
//!
//! [`SpawningActivator`] is the standard implementation: it spawns one Tokio
//! task per connection and runs a [`SessionHandler`] inside it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use aipc_core::ClientRequirement;
use async_trait::async_trait;
use tokio::runtime::Handle;
use tracing::debug;

use crate::infrastructure::listener::{ConnectionId, IncomingConnection};

/// Turns a raw accepted connection into a live session.
#[cfg_attr(test, mockall::automock)]
pub trait ConnectionActivator: Send + Sync {
    /// Takes ownership of `connection` and schedules its servicing.
    ///
    /// `requirement` is the server's peer-identity policy, passed through
    /// untouched.
    fn activate(&self, connection: IncomingConnection, requirement: &ClientRequirement);
}

/// Services one activated connection until it ends.
#[async_trait]
pub trait SessionHandler: Send + Sync + 'static {
    async fn serve(&self, connection: IncomingConnection, requirement: ClientRequirement);
}

/// Runs a [`SessionHandler`] on its own task for every activated connection.
pub struct SpawningActivator<H> {
    handler: Arc<H>,
    runtime: Handle,
    active: Arc<AtomicUsize>,
}

impl<H: SessionHandler> SpawningActivator<H> {
    /// Creates an activator that spawns onto the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn new(handler: H) -> Self {
        Self::with_runtime(handler, Handle::current())
    }

    pub fn with_runtime(handler: H, runtime: Handle) -> Self {
        Self {
            handler: Arc::new(handler),
            runtime,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of sessions currently running.
    pub fn active_sessions(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }
}

impl<H: SessionHandler> ConnectionActivator for SpawningActivator<H> {
    fn activate(&self, connection: IncomingConnection, requirement: &ClientRequirement) {
        let handler = Arc::clone(&self.handler);
        let requirement = requirement.clone();
        let session = ActiveSession::enter(Arc::clone(&self.active), connection.id());

        self.runtime.spawn(async move {
            let _session = session;
            handler.serve(connection, requirement).await;
        });
    }
}

/// Counts one running session.  The count drops with the session task,
/// however that task ends.
struct ActiveSession {
    active: Arc<AtomicUsize>,
    connection_id: ConnectionId,
}

impl ActiveSession {
    fn enter(active: Arc<AtomicUsize>, connection_id: ConnectionId) -> Self {
        active.fetch_add(1, Ordering::Relaxed);
        Self {
            active,
            connection_id,
        }
    }
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        let remaining = self.active.fetch_sub(1, Ordering::Relaxed) - 1;
        debug!(connection_id = self.connection_id, remaining, "session finished");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
