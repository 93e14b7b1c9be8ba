//! TOML-based configuration for the shade server.
//!
//! Reads `ShadeConfig` from the platform-appropriate config file:
//! - Linux:  `$XDG_CONFIG_HOME/shade-server/config.toml`, falling back to
//!   `~/.config/shade-server/config.toml`
//! - macOS:  `~/Library/Application Support/shade-server/config.toml`
//!
//! # Example file
//!
//! ```toml
//! [server]
//! bind_address = "127.0.0.1:8000"
//! log_level = "info"
//! backend = "serial"
//!
//! [serial]
//! path = "/dev/serial0"
//! baud_rate = 4800
//! read_timeout_ms = 5000
//!
//! [motor]
//! address = "0c:85:ae"
//! max_attempts = 3
//! nack_backoff_ms = 1000
//! ```
//!
//! # Serde default values
//!
//! Every field carries `#[serde(default = "some_fn")]`, so an empty file, a
//! file with only one section, or no file at all all produce a working
//! configuration.  Values serde cannot check (address syntax, attempt
//! budget) are verified by [`ShadeConfig::validate`].

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shade_core::{MotorAddress, RetryPolicy};
use thiserror::Error;

use crate::infrastructure::motor::serial::SerialSettings;

/// Error type for configuration loading and validation.
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

    /// A value parsed but is not usable.
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ShadeConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub motor: MotorConfig,
}

/// Which [`ShadeAdapter`](crate::application::control_shade::ShadeAdapter)
/// the server drives.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// The RS-485 motor on the configured serial port.
    #[default]
    Serial,
    /// An in-memory shade with no hardware.
    Memory,
}

impl FromStr for Backend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "serial" => Ok(Backend::Serial),
            "memory" => Ok(Backend::Memory),
            other => Err(ConfigError::Invalid {
                field: "server.backend",
                reason: format!("unknown backend {other:?}, expected \"serial\" or \"memory\""),
            }),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Backend::Serial => "serial",
            Backend::Memory => "memory",
        })
    }
}

/// HTTP listener and process settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// `ip:port` the HTTP transport binds to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub backend: Backend,
}

/// Serial device settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SerialConfig {
    #[serde(default = "default_serial_path")]
    pub path: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// How long one read waits for a response before timing out.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

/// Target motor and retry behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MotorConfig {
    /// Address as printed on the motor label, e.g. `"0c:85:ae"`.
    #[serde(default = "default_motor_address")]
    pub address: String,
    /// Total transmissions of a move command, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u8,
    #[serde(default = "default_nack_backoff_ms")]
    pub nack_backoff_ms: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_bind_address() -> String {
    "127.0.0.1:8000".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_serial_path() -> String {
    "/dev/serial0".to_string()
}
fn default_baud_rate() -> u32 {
    4800
}
fn default_read_timeout_ms() -> u64 {
    5000
}
fn default_motor_address() -> String {
    "0c:85:ae".to_string()
}
fn default_max_attempts() -> u8 {
    3
}
fn default_nack_backoff_ms() -> u64 {
    1000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            log_level: default_log_level(),
            backend: Backend::default(),
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            path: default_serial_path(),
            baud_rate: default_baud_rate(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            address: default_motor_address(),
            max_attempts: default_max_attempts(),
            nack_backoff_ms: default_nack_backoff_ms(),
        }
    }
}

// ── Derived values ────────────────────────────────────────────────────────────

impl ShadeConfig {
    /// Checks every value that the rest of the server will parse.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_address()?;
        self.motor_address()?;
        if self.motor.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "motor.max_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.serial.baud_rate == 0 {
            return Err(ConfigError::Invalid {
                field: "serial.baud_rate",
                reason: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }

    pub fn bind_address(&self) -> Result<SocketAddr, ConfigError> {
        self.server
            .bind_address
            .parse()
            .map_err(|e| ConfigError::Invalid {
                field: "server.bind_address",
                reason: format!("{:?}: {e}", self.server.bind_address),
            })
    }

    pub fn motor_address(&self) -> Result<MotorAddress, ConfigError> {
        self.motor
            .address
            .parse()
            .map_err(|e| ConfigError::Invalid {
                field: "motor.address",
                reason: format!("{e}"),
            })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.motor.max_attempts,
            nack_backoff: Duration::from_millis(self.motor.nack_backoff_ms),
        }
    }

    pub fn serial_settings(&self) -> SerialSettings {
        SerialSettings {
            path: self.serial.path.clone(),
            baud_rate: self.serial.baud_rate,
            read_timeout: Duration::from_millis(self.serial.read_timeout_ms),
        }
    }

    /// Renders the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Serialize`] if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

// ── Config loading ────────────────────────────────────────────────────────────

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    platform_config_dir()
        .map(|dir| dir.join("config.toml"))
        .ok_or(ConfigError::NoPlatformConfigDir)
}

/// Loads the config from the default location; see [`load_config_from`].
///
/// # Errors
///
/// Same as [`load_config_from`], plus [`ConfigError::NoPlatformConfigDir`].
pub fn load_config() -> Result<ShadeConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads `ShadeConfig` from `path`, returning `ShadeConfig::default()` if the
/// file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<ShadeConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ShadeConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Resolves the platform config base directory including the `shade-server` subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("shade-server")
        })
    }

    #[cfg(not(target_os = "macos"))]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("shade-server"))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
