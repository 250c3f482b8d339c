//! Domain entities for anonymous IPC endpoints.
//!
//! This module contains pure logic with no infrastructure dependencies.
//!
//! # What lives here? (for beginners)
//!
//! - **`descriptor`** – The opaque, transmissible value that names one live
//!   listening resource without going through any naming service.
//! - **`requirement`** – The peer-identity policy a host attaches to its
//!   server.  The core carries it to the activator and never looks inside.
//! - **`lifecycle`** – The `NotStarted` / `Started` state machine and the FIFO
//!   of connections that arrived before the host was ready.
//!
//! None of these types open sockets or spawn tasks, so they can be tested on
//! any platform without a runtime.

pub mod descriptor;
pub mod lifecycle;
pub mod requirement;
