//! Push-channel configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use super::logging::Environment;

/// Push-channel configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
    /// WebSocket endpoint (ws:// or wss://)
    pub url: String,

    /// Seconds to wait for the server handshake
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Base delay for linear reconnect backoff, in milliseconds
    #[serde(default = "default_reconnect_base_delay")]
    pub reconnect_base_delay_ms: u64,

    /// Automatic retries before giving up
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Consumer nudge cadence in seconds
    #[serde(default = "default_nudge_interval")]
    pub nudge_interval_secs: u64,

    /// Inbound frames queued before the socket reader waits
    #[serde(default = "default_inbound_buffer")]
    pub inbound_buffer: usize,
}

impl ChannelConfig {
    /// Get connect timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Get reconnect base delay as Duration
    pub fn reconnect_base_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_delay_ms)
    }

    /// Get nudge interval as Duration
    pub fn nudge_interval(&self) -> Duration {
        Duration::from_secs(self.nudge_interval_secs)
    }

    /// Validate channel configuration
    ///
    /// In production, requires wss://.
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        if self.url.is_empty() {
            return Err(ValidationError::MissingRequired("CHANNEL__URL"));
        }
        if !self.url.starts_with("ws://") && !self.url.starts_with("wss://") {
            return Err(ValidationError::InvalidChannelUrl);
        }
        if *environment == Environment::Production && !self.url.starts_with("wss://") {
            return Err(ValidationError::ChannelMustBeSecure);
        }
        if self.connect_timeout_secs == 0 || self.connect_timeout_secs > 120 {
            return Err(ValidationError::InvalidTimeout("connect_timeout_secs"));
        }
        if self.nudge_interval_secs == 0 || self.nudge_interval_secs > 3600 {
            return Err(ValidationError::InvalidTimeout("nudge_interval_secs"));
        }
        if self.reconnect_base_delay_ms == 0 || self.reconnect_base_delay_ms > 60_000 {
            return Err(ValidationError::InvalidReconnectDelay);
        }
        if self.max_reconnect_attempts == 0 || self.max_reconnect_attempts > 100 {
            return Err(ValidationError::InvalidReconnectAttempts);
        }
        if self.inbound_buffer == 0 || self.inbound_buffer > 65_536 {
            return Err(ValidationError::InvalidInboundBuffer);
        }
        Ok(())
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            connect_timeout_secs: default_connect_timeout(),
            reconnect_base_delay_ms: default_reconnect_base_delay(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            nudge_interval_secs: default_nudge_interval(),
            inbound_buffer: default_inbound_buffer(),
        }
    }
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_reconnect_base_delay() -> u64 {
    1000
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_nudge_interval() -> u64 {
    5
}

fn default_inbound_buffer() -> usize {
    256
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ChannelConfig {
        ChannelConfig {
            url: "wss://api.example.com/realtime".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_channel_config_defaults() {
        let config = ChannelConfig::default();
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.reconnect_base_delay(), Duration::from_secs(1));
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.nudge_interval(), Duration::from_secs(5));
        assert_eq!(config.inbound_buffer, 256);
    }

    #[test]
    fn test_validation_requires_url() {
        let config = ChannelConfig::default();
        assert_eq!(
            config.validate(&Environment::Development),
            Err(ValidationError::MissingRequired("CHANNEL__URL"))
        );
    }

    #[test]
    fn test_validation_rejects_http_scheme() {
        let config = ChannelConfig {
            url: "http://localhost:4000".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.validate(&Environment::Development),
            Err(ValidationError::InvalidChannelUrl)
        );
    }

    #[test]
    fn test_production_requires_wss() {
        let config = ChannelConfig {
            url: "ws://localhost:4000/ws".to_string(),
            ..Default::default()
        };
        assert!(config.validate(&Environment::Development).is_ok());
        assert_eq!(
            config.validate(&Environment::Production),
            Err(ValidationError::ChannelMustBeSecure)
        );
    }

    #[test]
    fn test_validation_bounds() {
        let config = ChannelConfig {
            max_reconnect_attempts: 0,
            ..valid()
        };
        assert_eq!(
            config.validate(&Environment::Production),
            Err(ValidationError::InvalidReconnectAttempts)
        );

        let config = ChannelConfig {
            connect_timeout_secs: 0,
            ..valid()
        };
        assert!(config.validate(&Environment::Production).is_err());

        assert!(valid().validate(&Environment::Production).is_ok());
    }
}
