//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads and writes the server's TOML configuration
//! in the platform-appropriate directory and falls back to defaults when the
//! file does not exist yet.

pub mod config;
