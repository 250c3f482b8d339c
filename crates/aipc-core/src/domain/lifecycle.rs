//! Connection-acceptance state machine.
//!
//! The [`AcceptanceQueue`] owns the two pieces of mutable state an anonymous
//! server has: its lifecycle flag ([`ServerState`]) and the FIFO of
//! connections that arrived before the host declared itself ready.
//!
//! # Lifecycle
//!
//! ```text
//!               start()
//! NotStarted ────────────► Started
//!     ▲                       │
//!     └───── invalidate() ────┘   (listening disabled, terminal in practice)
//! ```
//!
//! - While `NotStarted`, every arrival is appended to the pending queue.
//! - [`AcceptanceQueue::start`] flips the state to `Started` and hands back
//!   every pending connection in arrival order, leaving the queue empty.
//! - While `Started`, every arrival is handed straight back for activation.
//! - [`AcceptanceQueue::invalidate`] stops listening: the state returns to
//!   `NotStarted`, queued connections are released, and later arrivals are
//!   rejected.
//!
//! # Ownership
//!
//! The queue is generic over the connection type `C` and takes connections by
//! value.  Each connection moves into exactly one place: the pending queue, or
//! back out to the caller for activation.  That makes "queued and activated at
//! the same time" unrepresentable.
//!
//! The queue performs no synchronisation.  The server keeps it inside a single
//! actor task so that every call is already serialised.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Whether a server buffers or activates arriving connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ServerState {
    /// Arrivals are buffered until `start`.
    #[default]
    NotStarted,
    /// Arrivals are activated immediately.
    Started,
}

/// What the caller must do with a connection passed to
/// [`AcceptanceQueue::on_arrival`].
#[derive(Debug, PartialEq, Eq)]
pub enum Arrival<C> {
    /// The connection was buffered; `position` is its zero-based place in the queue.
    Queued { position: usize },
    /// The server is started: activate this connection now.
    Activate(C),
    /// The listener has been invalidated: close this connection.
    Rejected(C),
}

/// Lifecycle flag plus pending FIFO.
#[derive(Debug)]
pub struct AcceptanceQueue<C> {
    state: ServerState,
    listening: bool,
    pending: VecDeque<C>,
    activated: u64,
}

impl<C> AcceptanceQueue<C> {
    /// Creates a listening, not-yet-started queue with nothing pending.
    pub fn new() -> Self {
        Self {
            state: ServerState::NotStarted,
            listening: true,
            pending: VecDeque::new(),
            activated: 0,
        }
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Returns `false` once [`invalidate`](Self::invalidate) has been called.
    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Total number of connections handed out for activation so far.
    pub fn activated_count(&self) -> u64 {
        self.activated
    }

    /// Routes one arriving connection.
    pub fn on_arrival(&mut self, connection: C) -> Arrival<C> {
        if !self.listening {
            return Arrival::Rejected(connection);
        }
        match self.state {
            ServerState::NotStarted => {
                self.pending.push_back(connection);
                Arrival::Queued {
                    position: self.pending.len() - 1,
                }
            }
            ServerState::Started => {
                self.activated += 1;
                Arrival::Activate(connection)
            }
        }
    }

    /// Marks the server started and returns every pending connection in
    /// arrival order.
    ///
    /// Calling `start` on an already started queue returns an empty `Vec`.
    pub fn start(&mut self) -> Vec<C> {
        self.state = ServerState::Started;
        let drained: Vec<C> = self.pending.drain(..).collect();
        self.activated += drained.len() as u64;
        drained
    }

    /// Stops listening, resets the state to `NotStarted`, and returns the
    /// connections that were still pending so the caller can close them.
    pub fn invalidate(&mut self) -> Vec<C> {
        self.listening = false;
        self.state = ServerState::NotStarted;
        self.pending.drain(..).collect()
    }
}

impl<C> Default for AcceptanceQueue<C> {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
