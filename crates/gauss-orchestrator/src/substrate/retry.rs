//! Bounded retry of control-plane calls.

use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

use super::port::ControlPlaneError;
use crate::error::{OrchestratorError, Result};

/// Iterative retry policy for control-plane calls.
///
/// A "not found" answer is returned as `Ok(None)` on the first occurrence and
/// is never retried. Any other error is retried; once `max_attempts` calls
/// have failed the policy gives up with a fatal
/// [`OrchestratorError::Substrate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of calls made before giving up.
    pub max_attempts: u32,

    /// Pause between two calls.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    /// Creates a retry policy.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Runs `call` until it succeeds, reports absence, or attempts run out.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<Option<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, ControlPlaneError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match call().await {
                Ok(value) => return Ok(Some(value)),
                Err(ControlPlaneError::NotFound(_)) => return Ok(None),
                Err(e) => {
                    warn!(operation, attempt, max_attempts = attempts, error = %e, "Control plane call failed");
                    last_error = e.to_string();
                    if attempt < attempts && !self.delay.is_zero() {
                        tokio::time::sleep(self.delay).await;
                    }
                }
            }
        }

        error!(operation, attempts, "Kubernetes API failed too many times");
        Err(OrchestratorError::substrate(operation, attempts, last_error))
    }
}
