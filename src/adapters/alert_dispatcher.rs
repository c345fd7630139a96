//! Retry and backoff around an alert transport.
//!
//! [`AlertDispatcher`] is itself an [`AlertPort`]: a failed send is retried
//! with exponential backoff and the last error is returned to the caller,
//! which logs it and drops the message.

use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::error::SmcError;
use crate::ports::alert_port::AlertPort;
use crate::ports::config_port::ConfigPort;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay after the first failure; doubled after each further one.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &dyn ConfigPort) -> Self {
        let defaults = RetryPolicy::default();
        RetryPolicy {
            max_attempts: config
                .get_int("alerts", "max_attempts", defaults.max_attempts as i64)
                .max(1) as u32,
            backoff: Duration::from_millis(
                config
                    .get_int("alerts", "backoff_ms", defaults.backoff.as_millis() as i64)
                    .max(0) as u64,
            ),
        }
    }

    /// Delay before attempt `attempt + 1`, for `attempt` starting at 1.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.backoff.saturating_mul(1 << exp)
    }
}

pub struct AlertDispatcher {
    transport: Box<dyn AlertPort + Send + Sync>,
    policy: RetryPolicy,
}

impl AlertDispatcher {
    pub fn new(transport: Box<dyn AlertPort + Send + Sync>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }
}

impl AlertPort for AlertDispatcher {
    fn send(&self, message: &str) -> Result<(), SmcError> {
        let mut attempt = 1;
        loop {
            match self.transport.send(message) {
                Ok(()) => {
                    debug!(attempt, "alert delivered");
                    return Ok(());
                }
                Err(e) if attempt >= self.policy.max_attempts => return Err(e),
                Err(e) => {
                    let delay = self.policy.delay_after(attempt);
                    warn!(attempt, error = %e, delay_ms = delay.as_millis() as u64, "alert send failed, retrying");
                    std::thread::sleep(delay);
                    attempt += 1;
                }
            }
        }
    }
}
