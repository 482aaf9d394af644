//! TOML-based configuration persistence for the server.
//!
//! The default file lives in the platform-appropriate directory:
//! - Windows:  `%APPDATA%\LineChat\server.toml`
//! - Linux:    `~/.config/linechat/server.toml`
//! - macOS:    `~/Library/Application Support/LineChat/server.toml`
//!
//! A different file can be passed with `--config`.
//!
//! ```toml
//! [server]
//! log_level = "info"
//!
//! [network]
//! bind_address = "0.0.0.0"
//! port = 9050
//!
//! [connection]
//! max_record_len = 65536
//! outbound_high_water = 1024
//! ```
//!
//! Every field has a serde default, so a missing file, an empty file, or a
//! file written by an older version all load cleanly.

use std::path::{Path, PathBuf};

pub use linechat_core::config::ConfigError;
use linechat_core::config::{config_file_in, load_toml, save_toml};
use linechat_core::{ConnectionConfig, DEFAULT_PORT};
use serde::{Deserialize, Serialize};

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level server configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub connection: ConnectionConfig,
}

/// General server behaviour settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSettings {
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    /// Overridden by `RUST_LOG` when set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Listener settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    /// IP address to bind.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Resolves the default path of the server config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    config_file_in("server.toml")
}

/// Loads `AppConfig` from `path`, or defaults if the file does not exist.
///
/// # Errors
///
/// See [`load_toml`].
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    load_toml(path)
}

/// Persists `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// See [`save_toml`].
pub fn save_config(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    save_toml(config, path)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("linechat_server_test_{}", Uuid::new_v4()))
    }

    #[test]
    fn test_app_config_default_listens_on_all_interfaces_port_9050() {
        // Arrange / Act
        let cfg = AppConfig::default();

        // Assert
        assert_eq!(cfg.network.bind_address, "0.0.0.0");
        assert_eq!(cfg.network.port, 9050);
        assert_eq!(cfg.server.log_level, "info");
        assert_eq!(cfg.connection.max_record_len, 65536);
        assert_eq!(cfg.connection.outbound_high_water, 1024);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let cfg: AppConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_partial_network_section_overrides_only_given_fields() {
        // Arrange
        let toml_str = r#"
[network]
port = 7000
[connection]
outbound_high_water = 16
"#;

        // Act
        let cfg: AppConfig = toml::from_str(toml_str).expect("deserialize partial");

        // Assert
        assert_eq!(cfg.network.port, 7000);
        assert_eq!(cfg.network.bind_address, "0.0.0.0");
        assert_eq!(cfg.connection.outbound_high_water, 16);
        assert_eq!(cfg.connection.max_record_len, 65536);
    }

    #[test]
    fn test_load_config_returns_default_when_file_absent() {
        let path = temp_dir().join("missing.toml");
        let cfg = load_config(&path).expect("absent file is not an error");
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_load_config_with_invalid_toml_is_parse_error() {
        // Arrange
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("server.toml");
        std::fs::write(&path, "[[[ not valid toml").unwrap();

        // Act
        let result = load_config(&path);

        // Assert
        assert!(matches!(result, Err(ConfigError::Parse(_))));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_save_then_load_round_trips_and_creates_directories() {
        // Arrange
        let dir = temp_dir();
        let path = dir.join("nested").join("server.toml");
        let mut cfg = AppConfig::default();
        cfg.network.port = 12345;
        cfg.server.log_level = "debug".to_string();

        // Act
        save_config(&cfg, &path).expect("save");
        let loaded = load_config(&path).expect("load");

        // Assert
        assert_eq!(loaded, cfg);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_config_file_path_ends_with_server_toml() {
        if let Ok(path) = config_file_path() {
            assert!(path.ends_with("server.toml"), "got {path:?}");
        }
    }
}
