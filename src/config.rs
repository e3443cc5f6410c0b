//! Bridge configuration.
//!
//! Uses `heapless::String` for names and paths; builders and defaults make
//! the common case a one-liner.
//!
//! # Example
//!
//! ```rust
//! use loconet_bridge::config::{Config, EngineConfig, SerialConfig};
//!
//! // Use defaults
//! let config = Config::default();
//! assert_eq!(config.serial.baud_rate, 16_457);
//!
//! // Or customize
//! let config = Config::default()
//!     .with_serial(SerialConfig::default().with_port("/dev/ttyACM0"))
//!     .with_engine(EngineConfig::default().with_purge_timeout_ms(60_000));
//! assert_eq!(config.engine.purge_timeout_ms, 60_000);
//! ```

use heapless::String as HString;

/// Maximum length for short config strings (names, ids)
pub const MAX_SHORT_STRING: usize = 64;

/// Maximum length for longer config strings (device paths)
pub const MAX_LONG_STRING: usize = 128;

/// Type alias for short config strings
pub type ShortString = HString<MAX_SHORT_STRING>;

/// Type alias for longer config strings
pub type LongString = HString<MAX_LONG_STRING>;

/// Loconet line rate.
pub const LOCONET_BAUD: u32 = 16_457;

// ============================================================================
// Helpers for creating heapless strings
// ============================================================================

fn truncated<const N: usize>(s: &str) -> HString<N> {
    let mut hs = HString::new();
    // Stop at the last char boundary that fits
    let end = s
        .char_indices()
        .map(|(i, c)| i + c.len_utf8())
        .take_while(|end| *end <= N)
        .last()
        .unwrap_or(0);
    let _ = hs.push_str(&s[..end]);
    hs
}

/// Create a ShortString from a &str, truncating if too long
pub fn short_string(s: &str) -> ShortString {
    truncated(s)
}

/// Create a LongString from a &str, truncating if too long
pub fn long_string(s: &str) -> LongString {
    truncated(s)
}

// ============================================================================
// Main Config
// ============================================================================

/// Complete bridge configuration
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// Serial port the host opens for the bus
    pub serial: SerialConfig,
    /// Engine timing
    pub engine: EngineConfig,
    /// Service identification
    pub device: DeviceConfig,
}

impl Config {
    /// Set serial configuration
    pub fn with_serial(mut self, serial: SerialConfig) -> Self {
        self.serial = serial;
        self
    }

    /// Set engine configuration
    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// Set device configuration
    pub fn with_device(mut self, device: DeviceConfig) -> Self {
        self.device = device;
        self
    }

    /// Parse a configuration from JSON; missing fields take defaults.
    ///
    /// # Example
    ///
    /// ```rust
    /// use loconet_bridge::Config;
    ///
    /// let json = br#"{"engine": {"purge_timeout_ms": 5000}}"#;
    /// let config = Config::from_json(json).unwrap();
    /// assert_eq!(config.engine.purge_timeout_ms, 5000);
    /// assert_eq!(config.engine.purge_interval_ms, 1000);
    /// ```
    #[cfg(feature = "serde-json-core")]
    pub fn from_json(json: &[u8]) -> Option<Self> {
        match serde_json_core::from_slice::<Self>(json) {
            Ok((config, _)) => Some(config),
            Err(err) => {
                tracing::warn!(error = ?err, "invalid configuration");
                None
            }
        }
    }
}

// ============================================================================
// Serial Config
// ============================================================================

/// Serial port configuration
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SerialConfig {
    /// Device path (e.g., "/dev/ttyUSB0")
    pub port: LongString,
    /// Line rate in baud
    pub baud_rate: u32,
    /// Whether the bus connection is enabled
    pub enabled: bool,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: long_string("/dev/ttyUSB0"),
            baud_rate: LOCONET_BAUD,
            enabled: true,
        }
    }
}

impl SerialConfig {
    /// Set the device path
    pub fn with_port(mut self, port: &str) -> Self {
        self.port = long_string(port);
        self
    }

    /// Set the baud rate
    pub fn with_baud_rate(mut self, baud: u32) -> Self {
        self.baud_rate = baud;
        self
    }

    /// Enable or disable the bus connection
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

// ============================================================================
// Engine Config
// ============================================================================

/// Protocol engine timing
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// Inactivity before an IN_USE slot is purged (milliseconds)
    pub purge_timeout_ms: u64,
    /// Interval between purge passes (milliseconds)
    pub purge_interval_ms: u64,
    /// Upper bound on bytes read per update
    pub max_read_per_update: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            purge_timeout_ms: 200_000,
            purge_interval_ms: 1_000,
            max_read_per_update: 256,
        }
    }
}

impl EngineConfig {
    /// Set the purge timeout
    pub fn with_purge_timeout_ms(mut self, ms: u64) -> Self {
        self.purge_timeout_ms = ms;
        self
    }

    /// Set the purge interval
    pub fn with_purge_interval_ms(mut self, ms: u64) -> Self {
        self.purge_interval_ms = ms;
        self
    }

    /// Set the per-update read limit (at least one byte)
    pub fn with_max_read_per_update(mut self, bytes: usize) -> Self {
        self.max_read_per_update = bytes.max(1);
        self
    }
}

// ============================================================================
// Device Config
// ============================================================================

/// Service identification, reported to the broker
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DeviceConfig {
    /// Human-readable service name
    pub name: ShortString,
    /// Unique service ID
    pub id: ShortString,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: short_string("Loconet Bridge"),
            id: short_string("loconet-bridge"),
        }
    }
}

impl DeviceConfig {
    /// Set the service name
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = short_string(name);
        self
    }

    /// Set the service ID
    pub fn with_id(mut self, id: &str) -> Self {
        self.id = short_string(id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.serial.port.as_str(), "/dev/ttyUSB0");
        assert_eq!(config.serial.baud_rate, LOCONET_BAUD);
        assert_eq!(config.engine.purge_timeout_ms, 200_000);
        assert_eq!(config.engine.purge_interval_ms, 1_000);
        assert_eq!(config.device.id.as_str(), "loconet-bridge");
    }

    #[test]
    fn short_string_truncation() {
        let long = "x".repeat(100);
        assert_eq!(short_string(&long).len(), MAX_SHORT_STRING);
        assert_eq!(short_string("abc").as_str(), "abc");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        // 63 ASCII bytes then a 2-byte char that does not fit
        let s = format!("{}é", "a".repeat(63));
        assert_eq!(short_string(&s).len(), 63);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::default()
            .with_serial(
                SerialConfig::default()
                    .with_port("/dev/ttyACM1")
                    .with_baud_rate(57_600)
                    .with_enabled(false),
            )
            .with_engine(
                EngineConfig::default()
                    .with_purge_timeout_ms(10)
                    .with_purge_interval_ms(5)
                    .with_max_read_per_update(0),
            )
            .with_device(DeviceConfig::default().with_name("Yard").with_id("yard-1"));

        assert_eq!(config.serial.port.as_str(), "/dev/ttyACM1");
        assert_eq!(config.serial.baud_rate, 57_600);
        assert!(!config.serial.enabled);
        assert_eq!(config.engine.purge_timeout_ms, 10);
        assert_eq!(config.engine.purge_interval_ms, 5);
        assert_eq!(config.engine.max_read_per_update, 1);
        assert_eq!(config.device.name.as_str(), "Yard");
        assert_eq!(config.device.id.as_str(), "yard-1");
    }

    #[cfg(feature = "serde-json-core")]
    #[test]
    fn parse_partial_json() {
        let json = br#"{"serial": {"port": "/dev/ttyS1"}, "device": {"name": "Shed"}}"#;
        let config = Config::from_json(json).unwrap();
        assert_eq!(config.serial.port.as_str(), "/dev/ttyS1");
        assert_eq!(config.serial.baud_rate, LOCONET_BAUD);
        assert_eq!(config.device.name.as_str(), "Shed");
        assert_eq!(config.engine, EngineConfig::default());
    }

    #[cfg(feature = "serde-json-core")]
    #[test]
    fn parse_invalid_json() {
        assert!(Config::from_json(b"{not json").is_none());
    }
}
