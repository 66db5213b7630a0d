//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::sensor::FieldSpec;
use crate::serial::PacketFilter;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Sensor name used in log output
    pub name: String,

    /// Optional hex-encoded telegram; when set, the bridge decodes it
    /// once and exits instead of reading from the serial port
    #[serde(default)]
    pub message: Option<String>,

    #[serde(default)]
    pub serial: SerialConfig,

    #[serde(default)]
    pub filter: PacketFilter,

    pub fields: Vec<FieldSpec>,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_scan_interval_s")]
    pub scan_interval_s: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            scan_interval_s: default_scan_interval_s(),
        }
    }
}

// Default value functions
fn default_serial_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud_rate() -> u32 { crate::serial::VBUS_BAUD_RATE }
fn default_scan_interval_s() -> u64 { 60 }

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use vbus_bridge::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Decode the configured debug message into telegram bytes
    ///
    /// # Returns
    ///
    /// * `Result<Option<Vec<u8>>>` - The telegram bytes, or `None` when
    ///   no debug message is configured
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the message is not valid hex
    pub fn debug_message_bytes(&self) -> Result<Option<Vec<u8>>> {
        let message = match &self.message {
            Some(message) => message,
            None => return Ok(None),
        };

        match parse_hex(message) {
            Some(bytes) => Ok(Some(bytes)),
            None => Err(crate::error::VbusBridgeError::Config(
                toml::de::Error::custom("message must be an even-length hex string")
            )),
        }
    }

    /// Validate configuration values
    ///
    /// # Returns
    ///
    /// * `Result<()>` - Ok if valid, Err if invalid
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(crate::error::VbusBridgeError::Config(
                toml::de::Error::custom("name cannot be empty")
            ));
        }

        if self.fields.is_empty() {
            return Err(crate::error::VbusBridgeError::Config(
                toml::de::Error::custom("at least one field must be configured")
            ));
        }

        for field in &self.fields {
            if field.name.is_empty() {
                return Err(crate::error::VbusBridgeError::Config(
                    toml::de::Error::custom("field name cannot be empty")
                ));
            }

            if field.size == 0 || field.size > 8 {
                return Err(crate::error::VbusBridgeError::Config(
                    toml::de::Error::custom(
                        format!("field {} size must be between 1 and 8", field.name)
                    )
                ));
            }

            if let Some(factor) = field.factor {
                if !factor.is_finite() || factor <= 0.0 {
                    return Err(crate::error::VbusBridgeError::Config(
                        toml::de::Error::custom(
                            format!("field {} factor must be finite and positive", field.name)
                        )
                    ));
                }
            }
        }

        if self.serial.baud_rate == 0 {
            return Err(crate::error::VbusBridgeError::Config(
                toml::de::Error::custom("baud_rate must be greater than 0")
            ));
        }

        if self.serial.scan_interval_s == 0 || self.serial.scan_interval_s > 3600 {
            return Err(crate::error::VbusBridgeError::Config(
                toml::de::Error::custom("scan_interval_s must be between 1 and 3600")
            ));
        }

        // Surface malformed hex at load time, not on first use
        self.debug_message_bytes()?;

        Ok(())
    }
}

/// Parse a hex string into bytes, ignoring ASCII whitespace
fn parse_hex(message: &str) -> Option<Vec<u8>> {
    let cleaned: String = message
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    if cleaned.is_empty() || cleaned.len() % 2 != 0 {
        return None;
    }

    (0..cleaned.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&cleaned[i..i + 2], 16).ok())
        .collect()
}
