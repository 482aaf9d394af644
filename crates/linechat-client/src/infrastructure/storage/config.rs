//! TOML-based configuration persistence for the client.
//!
//! Default location: `client.toml` in the platform config directory
//! (`~/.config/linechat` on Linux, `%APPDATA%\LineChat` on Windows,
//! `~/Library/Application Support/LineChat` on macOS).
//!
//! ```toml
//! [client]
//! name = "alice"
//! log_level = "info"
//!
//! [network]
//! server_address = "127.0.0.1"
//! port = 9050
//! connect_timeout_secs = 5
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

pub use linechat_core::config::ConfigError;
use linechat_core::config::{config_file_in, load_toml, save_toml};
use linechat_core::{ConnectionConfig, DEFAULT_PORT};
use serde::{Deserialize, Serialize};

use crate::infrastructure::network::ClientConfig;

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level client configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub client: ClientSettings,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub connection: ConnectionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientSettings {
    /// Display name attached to every message this client sends.
    #[serde(default = "default_name")]
    pub name: String,
    /// `tracing` log level.  Logs go to stderr so they never mix with chat lines.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    /// Host name or IP literal of the server.
    #[serde(default = "default_server_address")]
    pub server_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_name() -> String {
    "guest".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_server_address() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_connect_timeout_secs() -> u64 {
    5
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            server_address: default_server_address(),
            port: default_port(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl AppConfig {
    /// The `host:port` string dialled when no server is given on the command line.
    pub fn server_target(&self) -> String {
        let host = &self.network.server_address;
        if host.contains(':') && !host.starts_with('[') {
            format!("[{host}]:{}", self.network.port)
        } else {
            format!("{host}:{}", self.network.port)
        }
    }

    /// Runtime network settings derived from this file.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            default_port: self.network.port,
            connect_timeout: Duration::from_secs(self.network.connect_timeout_secs),
            connection: self.connection,
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Resolves the default path of the client config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    config_file_in("client.toml")
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
