//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Channel URL must use ws:// or wss://")]
    InvalidChannelUrl,

    #[error("Channel URL must use wss:// in production")]
    ChannelMustBeSecure,

    #[error("API base URL must use http:// or https://")]
    InvalidApiUrl,

    #[error("API base URL must use HTTPS in production")]
    ApiMustBeHttps,

    #[error("Invalid timeout: {0}")]
    InvalidTimeout(&'static str),

    #[error("Reconnect base delay must be between 1ms and 60s")]
    InvalidReconnectDelay,

    #[error("Max reconnect attempts must be between 1 and 100")]
    InvalidReconnectAttempts,

    #[error("Inbound buffer must be between 1 and 65536 frames")]
    InvalidInboundBuffer,

    #[error("Invalid log filter directive: {0}")]
    InvalidLogLevel(String),
}
