//! Configuration loading
//!
//! Bootstrap configuration comes from a TOML file. Every field has a
//! compiled default, so an absent file (or an absent section) still yields
//! a usable configuration.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments / environment variables (applied by the binary)
//! 2. TOML configuration file
//! 3. Built-in defaults (code constants)

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::{Error, Result};

/// Top-level portal configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Address the HTTP server binds to
    pub bind_addr: String,

    /// HTTP server port
    pub port: u16,

    pub otc: OtcConfig,
    pub storage: StorageConfig,
    pub realtime: RealtimeConfig,
    pub logging: LoggingConfig,
}

/// One-time-code settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OtcConfig {
    /// Lifetime of an issued code in seconds
    pub ttl_secs: u64,
}

/// Session storage settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file; sessions are kept in memory when unset
    pub database_path: Option<PathBuf>,
}

/// Real-time channel settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    /// Frames buffered per connection before pushes to it are dropped
    pub outbound_queue_capacity: usize,

    /// Interval between server pings on idle connections
    pub ping_interval_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: 5780,
            otc: OtcConfig::default(),
            storage: StorageConfig::default(),
            realtime: RealtimeConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for OtcConfig {
    fn default() -> Self {
        Self { ttl_secs: 600 }
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            outbound_queue_capacity: 64,
            ping_interval_secs: 30,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl OtcConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl RealtimeConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }
}

impl PortalConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an explicit file or the platform default
    ///
    /// A missing file is not an error: a warning is logged and defaults are
    /// used. A file that exists but does not parse is a `Config` error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (config, source) = Self::resolve(path)?;
        source.log();
        Ok(config)
    }

    /// Like [`PortalConfig::load`], but hands back where the configuration
    /// came from instead of logging it
    ///
    /// For callers that install their log subscriber only once the
    /// configuration (and its log level) is known.
    pub fn resolve(path: Option<&Path>) -> Result<(Self, ConfigSource)> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match default_config_path() {
                Some(p) => p,
                None => return Ok((Self::default(), ConfigSource::NoConfigDir)),
            },
        };

        if !path.exists() {
            return Ok((Self::default(), ConfigSource::Missing(path)));
        }

        let content = std::fs::read_to_string(&path)?;
        let config = Self::from_toml_str(&content)?;
        Ok((config, ConfigSource::File(path)))
    }

    fn validate(&self) -> Result<()> {
        if self.otc.ttl_secs == 0 {
            return Err(Error::Config("otc.ttl_secs must be greater than 0".to_string()));
        }
        if self.realtime.outbound_queue_capacity == 0 {
            return Err(Error::Config(
                "realtime.outbound_queue_capacity must be greater than 0".to_string(),
            ));
        }
        if self.realtime.ping_interval_secs == 0 {
            return Err(Error::Config(
                "realtime.ping_interval_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Where a resolved configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Parsed from this file
    File(PathBuf),
    /// The file does not exist; defaults are in use
    Missing(PathBuf),
    /// No platform config directory; defaults are in use
    NoConfigDir,
}

impl ConfigSource {
    /// Report the source: info for a loaded file, a warning for a fallback
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Loaded configuration from {}", path.display()),
            ConfigSource::Missing(path) => {
                warn!("Config file {} not found, using defaults", path.display())
            }
            ConfigSource::NoConfigDir => {
                warn!("Could not determine config directory, using defaults")
            }
        }
    }

    pub fn is_fallback(&self) -> bool {
        !matches!(self, ConfigSource::File(_))
    }
}

/// Default configuration file path for the platform
///
/// `~/.config/handoff/config.toml` on Linux, the equivalent config
/// directory elsewhere.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("handoff").join("config.toml"))
}
