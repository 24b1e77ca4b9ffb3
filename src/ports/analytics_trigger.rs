//! AnalyticsTrigger port - The one outbound maintenance action.
//!
//! Asks the API to recompute analytics and re-publish them over the push
//! channel right away. This is a plain request: it does not go through the
//! channel, it is never retried automatically, and its failure only
//! reaches the caller.

use async_trait::async_trait;
use serde_json::Value;

/// Errors from the maintenance request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MaintenanceError {
    /// Credential missing, expired or lacking admin rights.
    #[error("Not authorized to trigger an analytics update")]
    Unauthorized,

    /// Any other non-success status.
    #[error("Analytics update failed with status {status}: {body}")]
    Status { status: u16, body: String },

    /// Request never produced a response.
    #[error("Network error: {0}")]
    Network(String),

    /// Success status but the body was not JSON.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl MaintenanceError {
    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        MaintenanceError::Network(message.into())
    }
}

/// Port for the analytics maintenance request.
#[async_trait]
pub trait AnalyticsTrigger: Send + Sync {
    /// Ask the server to recompute and re-publish analytics now.
    ///
    /// Returns the parsed JSON body on success.
    async fn trigger_update(&self) -> Result<Value, MaintenanceError>;
}
