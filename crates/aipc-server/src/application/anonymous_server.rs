//! AnonymousServer: an IPC server reachable only through descriptors it hands
//! out, which buffers connections until its host declares itself started.
//!
//! # Why buffer at all? (for beginners)
//!
//! A host process usually creates its server, publishes a descriptor to some
//! peer, and only *then* finishes wiring up whatever the connections need.
//! A fast peer can connect in between.  Those early connections must not be
//! dropped and must not be serviced yet, so they wait in a FIFO until
//! [`NonBlockingServer::start`] is called, and are then handed over in
//! exactly the order they arrived.
//!
//! # Execution model
//!
//! ```text
//! accept loop task ──Arrived──┐
//! start()       ──Start──────┤      ┌──────────────────────────┐
//! invalidate()  ──Invalidate─┼────► │ listener actor task      │ ──► ConnectionActivator
//! status()      ──Status─────┘      │  AcceptanceQueue (state, │
//!                                   │  pending FIFO)           │
//!                                   └──────────────────────────┘
//! ```
//!
//! All mutable state lives inside one actor task.  Every reader and writer,
//! including the accept loop, talks to it through a single unbounded mailbox,
//! so "check the lifecycle flag, then append or activate" can never interleave
//! with a `start` or `invalidate`.  No lock guards the state.
//!
//! - An arrival is one O(1) message: append, or activate immediately.
//! - `start` sends one message and waits for its acknowledgement, which is
//!   sent only after the whole backlog has been handed to the activator.
//! - `invalidate` cancels the accept loop (releasing the OS listener), closes
//!   anything still pending, and resets the state to `NotStarted`.  It is a
//!   test-support hook that simulates the server dying; sessions already
//!   handed to the activator keep running.
//!
//! Dropping the server handle closes the mailbox; the actor then cancels the
//! accept loop and exits.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use aipc_core::{
    AcceptanceQueue, Arrival, ClientRequirement, ConnectionDescriptor, EndpointDescriptor,
    ListenerId, ServerState, TransportAddress,
};
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::activate::ConnectionActivator;
use super::server::{NonBlockingServer, Server};
use crate::infrastructure::listener::{
    bind_listener, ConnectionId, IncomingConnection, ListenerError, ListenerOptions,
    ListeningResource,
};

/// Pause after a failed `accept` before trying again.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Error type for server operations.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listening resource could not be created.
    #[error("failed to create listening resource: {0}")]
    Listener(#[from] ListenerError),

    /// The listener actor is gone, so the request could not be served.
    #[error("listener execution context has stopped")]
    ContextClosed,
}

/// Snapshot of the acceptance state, taken on the listener's context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerStatus {
    pub state: ServerState,
    /// Connections waiting for `start`.
    pub pending: usize,
    /// `false` after `invalidate`.
    pub listening: bool,
    /// Connections handed to the activator so far.
    pub activated: u64,
}

/// Messages processed, one at a time, by the listener actor.
enum ListenerCommand {
    Arrived(IncomingConnection),
    Start(oneshot::Sender<()>),
    Invalidate(oneshot::Sender<()>),
    Status(oneshot::Sender<ServerStatus>),
}

/// Handle to a running anonymous server.
///
/// Not `Clone`: there is exactly one handle per listening resource.  Wrap it
/// in an `Arc` to share it between tasks.
pub struct AnonymousServer {
    listener_id: ListenerId,
    address: TransportAddress,
    mailbox: mpsc::UnboundedSender<ListenerCommand>,
}

impl AnonymousServer {
    /// Binds a listening resource described by `options` and starts accepting
    /// into the pending queue immediately.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Listener`] if the resource cannot be created.
    ///
    /// # Panics
    ///
    /// Must be called from inside a Tokio runtime.
    pub fn bind(
        options: &ListenerOptions,
        requirement: ClientRequirement,
        activator: Arc<dyn ConnectionActivator>,
    ) -> Result<Self, ServerError> {
        let resource = bind_listener(options)?;
        Ok(Self::with_listener(resource, requirement, activator))
    }

    /// Builds a server around an already bound listening resource.
    ///
    /// # Panics
    ///
    /// Must be called from inside a Tokio runtime.
    pub fn with_listener(
        resource: Box<dyn ListeningResource>,
        requirement: ClientRequirement,
        activator: Arc<dyn ConnectionActivator>,
    ) -> Self {
        let listener_id = Uuid::new_v4();
        let address = resource.address().clone();
        let (mailbox, inbox) = mpsc::unbounded_channel();

        // The accept loop holds only a weak sender so that dropping the
        // server handle is enough to stop the actor.
        let accept_task = tokio::spawn(accept_loop(listener_id, resource, mailbox.downgrade()));

        let actor = ListenerActor {
            listener_id,
            queue: AcceptanceQueue::new(),
            activator,
            requirement,
            accept_task: Some(accept_task),
            inbox,
        };
        tokio::spawn(actor.run());

        info!(%listener_id, %address, "anonymous server listening");
        Self {
            listener_id,
            address,
            mailbox,
        }
    }

    pub fn listener_id(&self) -> ListenerId {
        self.listener_id
    }

    /// Cancels the listening resource and resets the server to `NotStarted`.
    ///
    /// Intended for tests that need to simulate the server going away.  Once
    /// this returns, the OS listener has been released, connections still
    /// pending have been closed, and nothing that arrives later is queued or
    /// activated.  A later [`NonBlockingServer::start`] is accepted but cannot
    /// bring the listener back.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::ContextClosed`] if the listener actor is gone.
    pub async fn invalidate(&self) -> Result<(), ServerError> {
        self.request(ListenerCommand::Invalidate).await
    }

    /// Returns a snapshot of the acceptance state.
    ///
    /// The snapshot is produced on the listener's context, so it reflects
    /// every message submitted before this call.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::ContextClosed`] if the listener actor is gone.
    pub async fn status(&self) -> Result<ServerStatus, ServerError> {
        self.request(ListenerCommand::Status).await
    }

    /// Submits a command to the actor and waits for its reply.
    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> ListenerCommand,
    ) -> Result<T, ServerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.mailbox
            .send(command(reply_tx))
            .map_err(|_| ServerError::ContextClosed)?;
        reply_rx.await.map_err(|_| ServerError::ContextClosed)
    }
}

#[async_trait]
impl Server for AnonymousServer {
    async fn start_and_block(&self) -> Result<Infallible, ServerError> {
        self.start().await?;
        info!(listener_id = %self.listener_id, "server started; parking caller in the runtime");
        Ok(std::future::pending::<Infallible>().await)
    }

    fn connection_descriptor(&self) -> ConnectionDescriptor {
        ConnectionDescriptor::Anonymous
    }

    fn endpoint(&self) -> EndpointDescriptor {
        let descriptor = EndpointDescriptor::new(
            self.connection_descriptor(),
            self.listener_id,
            self.address.clone(),
        );
        debug!(
            listener_id = %self.listener_id,
            nonce = %descriptor.nonce(),
            "endpoint descriptor derived"
        );
        descriptor
    }
}

#[async_trait]
impl NonBlockingServer for AnonymousServer {
    async fn start(&self) -> Result<(), ServerError> {
        self.request(ListenerCommand::Start).await
    }
}

// ── Accept loop ───────────────────────────────────────────────────────────────

/// Takes connections off the resource and forwards them to the actor, tagged
/// with their arrival sequence number.
///
/// Owns the resource: cancelling this task is what releases the listener.
async fn accept_loop(
    listener_id: ListenerId,
    mut resource: Box<dyn ListeningResource>,
    mailbox: mpsc::WeakUnboundedSender<ListenerCommand>,
) {
    let mut next_id: ConnectionId = 0;
    loop {
        match resource.accept().await {
            Ok(stream) => {
                let connection = IncomingConnection::new(next_id, stream);
                next_id += 1;
                let Some(mailbox) = mailbox.upgrade() else {
                    break;
                };
                if mailbox.send(ListenerCommand::Arrived(connection)).is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!(%listener_id, error = %e, "accept failed");
                tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
            }
        }
    }
    debug!(%listener_id, "accept loop stopped");
}

// ── Listener actor ────────────────────────────────────────────────────────────

/// Sole owner of the lifecycle flag and the pending queue.
struct ListenerActor {
    listener_id: ListenerId,
    queue: AcceptanceQueue<IncomingConnection>,
    activator: Arc<dyn ConnectionActivator>,
    requirement: ClientRequirement,
    accept_task: Option<JoinHandle<()>>,
    inbox: mpsc::UnboundedReceiver<ListenerCommand>,
}

impl ListenerActor {
    async fn run(mut self) {
        while let Some(command) = self.inbox.recv().await {
            match command {
                ListenerCommand::Arrived(connection) => self.on_arrival(connection),
                ListenerCommand::Start(done) => {
                    self.start();
                    done.send(()).ok();
                }
                ListenerCommand::Invalidate(done) => {
                    self.invalidate().await;
                    done.send(()).ok();
                }
                ListenerCommand::Status(reply) => {
                    reply.send(self.status()).ok();
                }
            }
        }
        self.cancel_accept_loop().await;
        debug!(listener_id = %self.listener_id, "listener actor stopped");
    }

    fn on_arrival(&mut self, connection: IncomingConnection) {
        let connection_id = connection.id();
        match self.queue.on_arrival(connection) {
            Arrival::Queued { position } => {
                debug!(
                    listener_id = %self.listener_id,
                    connection_id,
                    position,
                    "server not started; connection queued"
                );
            }
            Arrival::Activate(connection) => self.activate(connection),
            Arrival::Rejected(connection) => {
                debug!(
                    listener_id = %self.listener_id,
                    connection_id,
                    "listener invalidated; closing late connection"
                );
                drop(connection);
            }
        }
    }

    fn start(&mut self) {
        if !self.queue.is_listening() {
            warn!(
                listener_id = %self.listener_id,
                "start on an invalidated listener; no further connections will arrive"
            );
        }
        let drained = self.queue.start();
        info!(listener_id = %self.listener_id, drained = drained.len(), "server started");
        for connection in drained {
            self.activate(connection);
        }
    }

    fn activate(&self, connection: IncomingConnection) {
        debug!(
            listener_id = %self.listener_id,
            connection_id = connection.id(),
            transport = connection.transport(),
            "activating connection"
        );
        self.activator.activate(connection, &self.requirement);
    }

    async fn invalidate(&mut self) {
        self.cancel_accept_loop().await;
        let released = self.queue.invalidate();
        info!(
            listener_id = %self.listener_id,
            released = released.len(),
            "listener invalidated"
        );
    }

    fn status(&self) -> ServerStatus {
        ServerStatus {
            state: self.queue.state(),
            pending: self.queue.pending_len(),
            listening: self.queue.is_listening(),
            activated: self.queue.activated_count(),
        }
    }

    /// Aborts the accept loop and waits until it (and the resource it owns)
    /// has been dropped.
    async fn cancel_accept_loop(&mut self) {
        if let Some(task) = self.accept_task.take() {
            task.abort();
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!(listener_id = %self.listener_id, error = %e, "accept loop panicked");
                }
            }
        }
    }
}

impl Drop for ListenerActor {
    /// Releases the listener even when the actor unwinds from a panicking
    /// activator.
    fn drop(&mut self) {
        if let Some(task) = self.accept_task.take() {
            task.abort();
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
