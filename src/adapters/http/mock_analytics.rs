//! Mock AnalyticsTrigger for testing.
//!
//! Returns queued results in order, then a default `{"status":"ok"}` body.
//!
//! ```ignore
//! let trigger = MockAnalyticsTrigger::new()
//!     .with_error(MaintenanceError::Unauthorized);
//!
//! assert!(trigger.trigger_update().await.is_err());
//! assert_eq!(trigger.call_count(), 1);
//! ```

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::ports::{AnalyticsTrigger, MaintenanceError};

/// Mock maintenance client.
#[derive(Debug, Clone, Default)]
pub struct MockAnalyticsTrigger {
    responses: Arc<Mutex<VecDeque<Result<Value, MaintenanceError>>>>,
    delay: Duration,
    calls: Arc<Mutex<usize>>,
}

impl MockAnalyticsTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful body.
    pub fn with_response(self, body: Value) -> Self {
        self.lock_responses().push_back(Ok(body));
        self
    }

    /// Queues a failure.
    pub fn with_error(self, err: MaintenanceError) -> Self {
        self.lock_responses().push_back(Err(err));
        self
    }

    /// Simulated latency per request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of requests made.
    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn lock_responses(
        &self,
    ) -> std::sync::MutexGuard<'_, VecDeque<Result<Value, MaintenanceError>>> {
        self.responses
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl AnalyticsTrigger for MockAnalyticsTrigger {
    async fn trigger_update(&self) -> Result<Value, MaintenanceError> {
        *self.calls.lock().unwrap_or_else(std::sync::PoisonError::into_inner) += 1;

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        let next = self.lock_responses().pop_front();
        next.unwrap_or_else(|| Ok(json!({ "status": "ok" })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_queued_results_then_default() {
        let trigger = MockAnalyticsTrigger::new()
            .with_error(MaintenanceError::Unauthorized)
            .with_response(json!({"refreshed": true}));

        assert_eq!(
            trigger.trigger_update().await,
            Err(MaintenanceError::Unauthorized)
        );
        assert_eq!(
            trigger.trigger_update().await,
            Ok(json!({"refreshed": true}))
        );
        assert_eq!(trigger.trigger_update().await, Ok(json!({"status": "ok"})));
        assert_eq!(trigger.call_count(), 3);
    }
}
