//! Infrastructure layer for the peer.

pub mod peer;
