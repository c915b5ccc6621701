//! Configuration System using Figment
//!
//! Configuration is loaded from, in order of increasing precedence:
//! 1. Built-in defaults
//! 2. A TOML file (default: `config/hp34401a.toml`, missing file is fine)
//! 3. Environment variables prefixed with `HP34401A_`
//!
//! # Environment Variable Overrides
//!
//! Nested keys are separated by a double underscore so that key names may
//! themselves contain underscores:
//!
//! ```text
//! HP34401A_INSTRUMENT__ADDRESS=22
//! HP34401A_INSTRUMENT__IO_TIMEOUT_MS=5000
//! HP34401A_POLLER__PERIOD_MS=250
//! HP34401A_APPLICATION__LOG_LEVEL=debug
//! ```
//!
//! # Example
//!
//! ```toml
//! [application]
//! log_level = "info"
//!
//! [instrument]
//! address = 2
//! board = 0
//! io_timeout_ms = 2000
//!
//! [poller]
//! period_ms = 500
//! ```

use crate::address::{InstrumentAddress, MAX_GPIB_ADDRESS};
use crate::error::ConfigError;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "config/hp34401a.toml";

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "HP34401A_";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Instrument link settings
    #[serde(default)]
    pub instrument: InstrumentConfig,
    /// Poller settings
    #[serde(default)]
    pub poller: PollerConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Emit log lines as JSON
    #[serde(default)]
    pub json_logs: bool,
}

/// Instrument link configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentConfig {
    /// GPIB primary address (0 = unset)
    #[serde(default)]
    pub address: u8,
    /// GPIB board index in the VISA resource string
    #[serde(default)]
    pub board: u8,
    /// Timeout applied to every open, write and query, in milliseconds
    #[serde(default = "default_io_timeout")]
    pub io_timeout_ms: u64,
    /// Capacity of the instrument actor's command channel
    #[serde(default = "default_command_channel_capacity")]
    pub command_channel_capacity: usize,
    /// Use the in-memory meter instead of VISA
    #[serde(default)]
    pub mock: bool,
}

/// Poller configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Delay between the end of one cycle and the start of the next, in milliseconds
    #[serde(default = "default_period")]
    pub period_ms: u64,
    /// Start polling as soon as the session is up
    #[serde(default = "default_autostart")]
    pub autostart: bool,
}

// ============================================================================
// Default value functions
// ============================================================================

fn default_log_level() -> String {
    "info".to_string()
}

fn default_io_timeout() -> u64 {
    2000
}

fn default_command_channel_capacity() -> usize {
    32
}

fn default_period() -> u64 {
    500
}

fn default_autostart() -> bool {
    true
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            address: 0,
            board: 0,
            io_timeout_ms: default_io_timeout(),
            command_channel_capacity: default_command_channel_capacity(),
            mock: false,
        }
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            period_ms: default_period(),
            autostart: default_autostart(),
        }
    }
}

impl InstrumentConfig {
    /// Configured bus address
    pub fn address(&self) -> InstrumentAddress {
        InstrumentAddress::new(self.address)
    }

    /// Per-call link timeout
    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }
}

impl PollerConfig {
    /// Poll period
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

// ============================================================================
// Configuration Loading and Validation
// ============================================================================

impl Settings {
    /// Load configuration from a specific file path
    ///
    /// # Errors
    ///
    /// Returns a ConfigError if the file is malformed or validation fails.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::from_figment(
            Figment::from(Serialized::defaults(Settings::default()))
                .merge(Toml::file(path.as_ref()))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    /// Extract and validate configuration from an arbitrary figment
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let settings: Self = figment.extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration after loading
    ///
    /// Checks:
    /// - Log level is valid (trace, debug, info, warn, error)
    /// - GPIB address is 0 (unset) or within the bus range
    /// - I/O timeout, channel capacity and poll period are non-zero
    ///
    /// An unset address is accepted here; it is rejected only when the link
    /// is actually used.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.instrument.address > MAX_GPIB_ADDRESS {
            return Err(ConfigError::Validation(format!(
                "Invalid GPIB address {}. Must be 0 (unset) or 1-{}",
                self.instrument.address, MAX_GPIB_ADDRESS
            )));
        }

        if self.instrument.io_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "instrument.io_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.instrument.command_channel_capacity == 0 {
            return Err(ConfigError::Validation(
                "instrument.command_channel_capacity must be greater than 0".to_string(),
            ));
        }

        if self.poller.period_ms == 0 {
            return Err(ConfigError::Validation(
                "poller.period_ms must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Validation(format!("Cannot render configuration: {}", e)))
    }
}
