//! Application layer for the anonymous IPC server.
//!
//! # What lives here? (for beginners)
//!
//! This layer decides *when* a connection is serviced, not *how* bytes move.
//! It owns the server lifecycle and talks to the outside world only through
//! the [`ListeningResource`](crate::infrastructure::listener::ListeningResource)
//! and [`ConnectionActivator`](activate::ConnectionActivator) traits, so tests
//! can plug in an in-memory listener and a mock activator.
//!
//! # Sub-modules
//!
//! - **`server`** – The `Server` / `NonBlockingServer` traits a hosting
//!   process programs against.
//!
//! - **`anonymous_server`** – The server itself: buffers connections that
//!   arrive before `start`, then activates them in arrival order.  All state
//!   is owned by one actor task.
//!
//! - **`activate`** – The hand-off point from the acceptance core to whatever
//!   services a connection.

pub mod activate;
pub mod anonymous_server;
pub mod server;
