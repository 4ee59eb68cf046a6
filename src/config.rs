//! Link configuration.
//!
//! Every field has a default, so a JSON document only needs the values it
//! changes:
//!
//! ```
//! use std::time::Duration;
//! use zwave_serial::LinkConfig;
//!
//! let config = LinkConfig::from_json(r#"{ "tx_timeout_ms": 1500, "max_retries": 1 }"#).unwrap();
//! assert_eq!(config.tx_timeout(), Duration::from_millis(1500));
//! assert_eq!(config.max_retries, 1);
//! assert_eq!(config.constants.max_frame_size, 256);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::protocol::ProtocolConstants;

/// Default time to wait for the reply set of one attempt.
pub const DEFAULT_TX_TIMEOUT: Duration = Duration::from_millis(5000);

/// Default number of resends after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default capacity of the handle-to-coordinator command channel.
pub const DEFAULT_COMMAND_CAPACITY: usize = 32;

/// Default size of a single transport read.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 1024;

/// Default capacity of the transport-to-coordinator byte channel.
pub const DEFAULT_INBOUND_CAPACITY: usize = 64;

/// Configuration for one serial link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Reply window per attempt, in milliseconds.
    pub tx_timeout_ms: u64,
    /// Resends after the first attempt before giving up.
    pub max_retries: u32,
    /// Command channel capacity.
    pub command_capacity: usize,
    /// Transport read buffer size.
    pub read_chunk_size: usize,
    /// Inbound chunk channel capacity.
    pub inbound_capacity: usize,
    /// Framing constants.
    pub constants: ProtocolConstants,
}

impl LinkConfig {
    /// Parse a configuration from JSON.
    ///
    /// Framing constants are validated before the configuration is returned.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the values a coordinator cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.constants.validate()?;
        Ok(())
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    #[inline]
    pub fn tx_timeout(&self) -> Duration {
        Duration::from_millis(self.tx_timeout_ms)
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            tx_timeout_ms: DEFAULT_TX_TIMEOUT.as_millis() as u64,
            max_retries: DEFAULT_MAX_RETRIES,
            command_capacity: DEFAULT_COMMAND_CAPACITY,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            inbound_capacity: DEFAULT_INBOUND_CAPACITY,
            constants: ProtocolConstants::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConstantsError, LinkError};

    #[test]
    fn test_defaults() {
        let config = LinkConfig::default();
        assert_eq!(config.tx_timeout(), Duration::from_secs(5));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.constants, ProtocolConstants::default());
    }

    #[test]
    fn test_from_empty_json() {
        assert_eq!(LinkConfig::from_json("{}").unwrap(), LinkConfig::default());
    }

    #[test]
    fn test_nested_constants() {
        let config = LinkConfig::from_json(r#"{ "constants": { "start_byte": 165 } }"#).unwrap();
        assert_eq!(config.constants.start_byte, 0xA5);
        assert_eq!(config.constants.min_frame_size, 5);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = LinkConfig {
            tx_timeout_ms: 250,
            max_retries: 0,
            ..LinkConfig::default()
        };
        let json = config.to_json().unwrap();
        assert_eq!(LinkConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_bad_json() {
        let err = LinkConfig::from_json(r#"{ "max_retries": "three" }"#).unwrap_err();
        assert!(matches!(err, LinkError::Json(_)));
    }

    #[test]
    fn test_rejects_unframeable_constants() {
        let err = LinkConfig::from_json(r#"{ "constants": { "max_frame_size": 1000 } }"#).unwrap_err();
        assert!(matches!(err, LinkError::Constants(ConstantsError::MaxTooLarge(1000))));

        let err = LinkConfig::from_json(r#"{ "constants": { "min_frame_size": 0 } }"#).unwrap_err();
        assert!(matches!(err, LinkError::Constants(ConstantsError::MinTooSmall(0))));

        let err = LinkConfig::from_json(r#"{ "constants": { "min_frame_size": 40, "max_frame_size": 20 } }"#)
            .unwrap_err();
        assert!(matches!(err, LinkError::Constants(ConstantsError::Inverted { min: 40, max: 20 })));
    }
}
