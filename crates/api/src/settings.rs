//! Daemon configuration
//!
//! Layers an optional `baby-monitor.toml` (or `.yaml`/`.json`) under
//! `BABY_MONITOR__*` environment variables, e.g.
//! `BABY_MONITOR__ENGINE__DEBOUNCE_THRESHOLD_MS=3000`.

use alert_engine::EngineConfig;
use cloud_sync::MqttConfig;
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

/// Config file looked up when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "baby-monitor";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "BABY_MONITOR";

/// Top-level daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub engine: EngineConfig,
    pub server: ServerConfig,
    /// MQTT transport; snapshots arrive over HTTP only when absent
    pub mqtt: Option<MqttConfig>,
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Load configuration from file and environment
///
/// A missing file is only an error when `path` was given explicitly.
pub fn load(path: Option<&str>) -> Result<MonitorConfig, ConfigError> {
    Config::builder()
        .add_source(File::with_name(path.unwrap_or(DEFAULT_CONFIG_FILE)).required(path.is_some()))
        .add_source(env_source())
        .build()?
        .try_deserialize()
}

/// Parse a TOML document, without environment overrides
pub fn from_toml(contents: &str) -> Result<MonitorConfig, ConfigError> {
    Config::builder()
        .add_source(File::from_str(contents, FileFormat::Toml))
        .build()?
        .try_deserialize()
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}
