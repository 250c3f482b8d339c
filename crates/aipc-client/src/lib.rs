//! aipc-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does aipc-client do? (for beginners)
//!
//! The *client* is a peer that was handed an endpoint descriptor by some
//! other means (a pipe, a file, a message).  It has no other way to find the
//! server.  The client:
//!
//! 1. Decodes the descriptor (JSON).
//! 2. Opens a connection to the listener the descriptor references.
//! 3. Exchanges newline-terminated lines with whatever session the server
//!    runs on that connection.

/// Infrastructure layer: descriptor loading and the line-oriented session.
pub mod infrastructure;
