//! Infrastructure layer for the anonymous IPC server.
//!
//! Contains OS-facing adapters: listening sockets, the default session
//! handler, and configuration file storage.

pub mod listener;
pub mod session;
pub mod storage;
