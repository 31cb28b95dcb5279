//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::hub::HubConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub hub: HubSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP/WebSocket listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_ws_path")]
    pub ws_path: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_ws_path() -> String {
    "/ws".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            ws_path: default_ws_path(),
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Built-in transform selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    /// Reply every frame to its sender
    Echo,
    /// Route by JSON envelope
    #[default]
    Envelope,
}

/// Hub configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HubSettings {
    #[serde(default = "default_hub_name")]
    pub name: String,

    /// Group used when a connection names none
    #[serde(default = "default_group")]
    pub default_group: String,

    #[serde(default)]
    pub transform: TransformKind,

    /// Most messages per outbound frame, 0 for no cap
    #[serde(default)]
    pub max_coalesce: usize,
}

fn default_hub_name() -> String {
    "lazyhub".to_string()
}

fn default_group() -> String {
    "default".to_string()
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            name: default_hub_name(),
            default_group: default_group(),
            transform: TransformKind::default(),
            max_coalesce: 0,
        }
    }
}

impl HubSettings {
    /// Registry settings derived from this section
    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            name: self.name.clone(),
            max_coalesce: self.max_coalesce,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })
    }

    fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("lazyhub").join("config.toml")),
            Some(PathBuf::from("/etc/lazyhub/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // Server overrides
        if let Some(host) = var("LAZYHUB_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("LAZYHUB_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }

        // Hub overrides
        if let Some(name) = var("LAZYHUB_HUB_NAME") {
            self.hub.name = name;
        }
        if let Some(group) = var("LAZYHUB_DEFAULT_GROUP") {
            self.hub.default_group = group;
        }

        // Logging overrides
        if let Some(level) = var("LAZYHUB_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("LAZYHUB_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Lazyhub Configuration
#
# Environment variables override these settings:
# - LAZYHUB_HOST
# - LAZYHUB_PORT
# - LAZYHUB_HUB_NAME
# - LAZYHUB_DEFAULT_GROUP
# - LAZYHUB_LOG_LEVEL
# - LAZYHUB_LOG_FORMAT

[server]
# Listener host
host = "0.0.0.0"

# Listener port
port = 3000

# Path accepting WebSocket upgrades
ws_path = "/ws"

[hub]
# Hub name, used in logs
name = "lazyhub"

# Group for connections that send neither a Sec-WebSocket-Protocol header
# nor a ?group= query parameter
default_group = "default"

# Routing transform: "envelope" (JSON routing envelope) or "echo"
transform = "envelope"

# Most queued messages folded into one outbound frame (0 = no cap)
max_coalesce = 0

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
