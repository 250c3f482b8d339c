//! TOML-based configuration persistence for the server host.
//!
//! Reads and writes `AppConfig` to the platform-appropriate config file:
//! - Windows:  `%APPDATA%\AnonIpc\server.toml`
//! - Linux:    `~/.config/anonipc/server.toml`
//! - macOS:    `~/Library/Application Support/AnonIpc/server.toml`
//!
//! Example:
//!
//! ```toml
//! [server]
//! log_level = "info"
//! client_requirement = "same-user"
//!
//! [listener]
//! transport = "unix"
//! socket_dir = "/run/user/1000"
//! bind_address = "127.0.0.1"
//! ```
//!
//! # Serde default values
//!
//! Every field carries a serde default, and so does every section.  A missing
//! file, an empty file, and a file written by an older version all load
//! without error.

use std::net::{AddrParseError, IpAddr};
use std::path::{Path, PathBuf};

use aipc_core::ClientRequirement;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::infrastructure::listener::{ListenerOptions, TransportKind};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// `listener.bind_address` is not an IP address.
    #[error("invalid bind address {value:?}: {source}")]
    InvalidBindAddress {
        value: String,
        #[source]
        source: AddrParseError,
    },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub listener: ListenerConfig,
}

/// Host-level behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// `tracing` log level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Peer-identity requirement handed to the activator with each connection.
    #[serde(default)]
    pub client_requirement: ClientRequirement,
}

/// Which listening resource to bind and where.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListenerConfig {
    #[serde(default)]
    pub transport: TransportKind,
    /// Parent of the private socket directory.  Absent means the OS temp dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket_dir: Option<PathBuf>,
    /// Loopback address for the TCP transport.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            client_requirement: ClientRequirement::default(),
        }
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::default(),
            socket_dir: None,
            bind_address: default_bind_address(),
        }
    }
}

impl AppConfig {
    /// Converts the `[listener]` section into bind options.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBindAddress`] if `bind_address` does not
    /// parse.  Whether it is a loopback address is checked at bind time.
    pub fn listener_options(&self) -> Result<ListenerOptions, ConfigError> {
        let bind_address: IpAddr =
            self.listener
                .bind_address
                .parse()
                .map_err(|source| ConfigError::InvalidBindAddress {
                    value: self.listener.bind_address.clone(),
                    source,
                })?;
        Ok(ListenerOptions {
            transport: self.listener.transport,
            socket_dir: self
                .listener
                .socket_dir
                .clone()
                .unwrap_or_else(std::env::temp_dir),
            bind_address,
        })
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("server.toml"))
}

/// Loads `AppConfig` from the platform config file, returning
/// `AppConfig::default()` if the file does not yet exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads `AppConfig` from an explicit path, with the same defaulting rules as
/// [`load_config`].
///
/// # Errors
///
/// Same as [`load_config`].
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let cfg: AppConfig = toml::from_str(&content)?;
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Persists `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Resolves the platform config directory, including the `AnonIpc` leaf.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("AnonIpc"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("anonipc"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("AnonIpc")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn scratch_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("aipc_config_test_{}", Uuid::new_v4()))
            .join("server.toml")
    }

    // ── Defaults ──────────────────────────────────────────────────────────────

    #[test]
    fn test_app_config_default_values() {
        // Arrange / Act
        let cfg = AppConfig::default();

        // Assert
        assert_eq!(cfg.server.log_level, "info");
        assert_eq!(cfg.server.client_requirement, ClientRequirement::SameUser);
        assert_eq!(cfg.listener.bind_address, "127.0.0.1");
        assert!(cfg.listener.socket_dir.is_none());
    }

    #[test]
    fn test_empty_toml_yields_defaults() {
        let cfg: AppConfig = toml::from_str("").expect("empty TOML is valid");
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_partial_section_fills_missing_fields() {
        // Arrange
        let text = r#"
            [listener]
            transport = "tcp"
        "#;

        // Act
        let cfg: AppConfig = toml::from_str(text).unwrap();

        // Assert
        assert_eq!(cfg.listener.transport, TransportKind::Tcp);
        assert_eq!(cfg.listener.bind_address, "127.0.0.1");
        assert_eq!(cfg.server.log_level, "info");
    }

    #[test]
    fn test_code_signing_requirement_parses_from_inline_table() {
        let text = r#"
            [server]
            client_requirement = { code-signing = "anchor apple" }
        "#;
        let cfg: AppConfig = toml::from_str(text).unwrap();
        assert_eq!(
            cfg.server.client_requirement,
            ClientRequirement::CodeSigning("anchor apple".to_string())
        );
    }

    #[test]
    fn test_unknown_transport_is_a_parse_error() {
        let text = "[listener]\ntransport = \"carrier-pigeon\"\n";
        let result: Result<AppConfig, _> = toml::from_str(text);
        assert!(result.is_err());
    }

    // ── listener_options ──────────────────────────────────────────────────────

    #[test]
    fn test_listener_options_uses_temp_dir_when_socket_dir_absent() {
        let options = AppConfig::default().listener_options().unwrap();
        assert_eq!(options.socket_dir, std::env::temp_dir());
        assert_eq!(options.bind_address, IpAddr::from([127, 0, 0, 1]));
    }

    #[test]
    fn test_listener_options_carries_configured_values() {
        // Arrange
        let mut cfg = AppConfig::default();
        cfg.listener.transport = TransportKind::Tcp;
        cfg.listener.socket_dir = Some(PathBuf::from("/run/aipc"));
        cfg.listener.bind_address = "::1".to_string();

        // Act
        let options = cfg.listener_options().unwrap();

        // Assert
        assert_eq!(options.transport, TransportKind::Tcp);
        assert_eq!(options.socket_dir, PathBuf::from("/run/aipc"));
        assert!(options.bind_address.is_loopback());
    }

    #[test]
    fn test_listener_options_rejects_unparseable_bind_address() {
        let mut cfg = AppConfig::default();
        cfg.listener.bind_address = "localhost".to_string();
        let result = cfg.listener_options();
        assert!(matches!(result, Err(ConfigError::InvalidBindAddress { .. })));
    }

    // ── File I/O ──────────────────────────────────────────────────────────────

    #[test]
    fn test_load_config_from_missing_file_returns_default() {
        let path = scratch_path();
        let cfg = load_config_from(&path).expect("missing file is not an error");
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_save_then_load_preserves_values() {
        // Arrange
        let path = scratch_path();
        let mut cfg = AppConfig::default();
        cfg.server.log_level = "debug".to_string();
        cfg.server.client_requirement = ClientRequirement::SameProcess;
        cfg.listener.transport = TransportKind::Tcp;

        // Act
        save_config(&cfg, &path).expect("save");
        let loaded = load_config_from(&path).expect("load");

        // Assert
        assert_eq!(loaded, cfg);
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_load_config_from_malformed_file_is_parse_error() {
        let path = scratch_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[server\nlog_level = ").unwrap();

        let result = load_config_from(&path);

        assert!(matches!(result, Err(ConfigError::Parse(_))));
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_config_file_name_is_server_toml() {
        if let Ok(path) = config_file_path() {
            assert!(path.ends_with("server.toml"));
        }
    }
}
