use serde::Deserialize;
use std::path::Path;

use crate::error::ConfigError;

/// Size of the store when nothing else is configured
pub const DEFAULT_CAPACITY: usize = 0x1000;

/// Largest store the device agrees to allocate (1 GiB)
pub const MAX_CAPACITY: usize = 1 << 30;

/// Largest per-subscriber readiness backlog
pub const MAX_READINESS_CHANNEL_CAPACITY: usize = 1 << 16;

/// Device settings
///
/// Every field is optional in JSON:
///
/// ```
/// use globalfifo::DeviceConfig;
///
/// let config = DeviceConfig::from_json_slice(br#"{"capacity": 8}"#).unwrap();
/// assert_eq!(config.capacity, 8);
/// assert_eq!(config.name, "globalfifo");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceConfig {
    /// Used in log messages
    pub name: String,
    /// Fixed size of the store in bytes
    pub capacity: usize,
    /// Readiness events buffered per subscriber before it starts lagging
    pub readiness_channel_capacity: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: "globalfifo".to_string(),
            capacity: DEFAULT_CAPACITY,
            readiness_channel_capacity: 16,
        }
    }
}

impl DeviceConfig {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Parse and validate a JSON config
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the values are invalid.
    pub fn from_json_slice(json: &[u8]) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_slice(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file
    ///
    /// # Errors
    ///
    /// Returns an error if the file can not be read or its content is invalid.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read(path)?;
        Self::from_json_slice(&json)
    }

    /// Check the values
    ///
    /// # Errors
    ///
    /// Both capacities must be positive and at most [`MAX_CAPACITY`] and
    /// [`MAX_READINESS_CHANNEL_CAPACITY`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.capacity > MAX_CAPACITY {
            return Err(ConfigError::CapacityTooLarge {
                value: self.capacity,
                max: MAX_CAPACITY,
            });
        }
        if self.readiness_channel_capacity == 0 {
            return Err(ConfigError::ZeroChannelCapacity);
        }
        if self.readiness_channel_capacity > MAX_READINESS_CHANNEL_CAPACITY {
            return Err(ConfigError::ChannelCapacityTooLarge {
                value: self.readiness_channel_capacity,
                max: MAX_READINESS_CHANNEL_CAPACITY,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DeviceConfig::from_json_slice(b"{}").unwrap();
        assert_eq!(config, DeviceConfig::default());
        assert_eq!(config.capacity, 4096);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result = DeviceConfig::from_json_slice(br#"{"capacity": 0}"#);
        assert!(matches!(result, Err(ConfigError::ZeroCapacity)));

        let result = DeviceConfig::from_json_slice(br#"{"readiness_channel_capacity": 0}"#);
        assert!(matches!(result, Err(ConfigError::ZeroChannelCapacity)));
    }

    #[test]
    fn test_oversized_capacities_rejected() {
        let json = br#"{"readiness_channel_capacity": 9223372036854775808}"#;
        let result = DeviceConfig::from_json_slice(json);
        assert!(matches!(
            result,
            Err(ConfigError::ChannelCapacityTooLarge { max: MAX_READINESS_CHANNEL_CAPACITY, .. })
        ));

        let result = DeviceConfig::from_json_slice(br#"{"capacity": 1073741825}"#);
        assert!(matches!(result, Err(ConfigError::CapacityTooLarge { .. })));

        let at_limit = DeviceConfig {
            capacity: MAX_CAPACITY,
            readiness_channel_capacity: MAX_READINESS_CHANNEL_CAPACITY,
            ..DeviceConfig::default()
        };
        assert!(at_limit.validate().is_ok());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = DeviceConfig::from_json_slice(br#"{"major": 230}"#);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = DeviceConfig::from_path("/nonexistent/globalfifo.json");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
