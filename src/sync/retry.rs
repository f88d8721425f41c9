use anyhow::ensure;
use rand::Rng;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

use crate::error::{ApiError, REQUIRED_SCOPES};

pub const MAX_RETRIES: u32 = 5;
const BASE_RETRY_DELAY_SECS: f64 = 2.0;
const ATTEMPT_LIMIT: u32 = 20;
const MAX_DELAY: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay before retry `n` (0-indexed) is `base_delay_secs^n` plus jitter.
    pub base_delay_secs: f64,
    pub max_jitter_secs: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RETRIES,
            base_delay_secs: BASE_RETRY_DELAY_SECS,
            max_jitter_secs: 1.0,
        }
    }
}

impl RetryPolicy {
    /// Reject settings that cannot drive a retry loop.
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            (1..=ATTEMPT_LIMIT).contains(&self.max_attempts),
            "max_attempts must be between 1 and {ATTEMPT_LIMIT}, got {}",
            self.max_attempts
        );
        ensure!(
            self.base_delay_secs.is_finite() && self.base_delay_secs > 0.0,
            "base_delay_secs must be a positive number, got {}",
            self.base_delay_secs
        );
        ensure!(
            self.max_jitter_secs.is_finite() && self.max_jitter_secs >= 0.0,
            "max_jitter_secs must be zero or a positive number, got {}",
            self.max_jitter_secs
        );
        Ok(())
    }

    pub fn delay_for(&self, attempt: u32, jitter_secs: f64) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.base_delay_secs.powi(exponent) + jitter_secs;
        Duration::try_from_secs_f64(secs.max(0.0)).map_or(MAX_DELAY, |d| d.min(MAX_DELAY))
    }

    fn jitter(&self) -> f64 {
        if !self.max_jitter_secs.is_finite() || self.max_jitter_secs <= 0.0 {
            return 0.0;
        }
        rand::thread_rng().gen_range(0.0..self.max_jitter_secs)
    }
}

/// Run `call` under `policy`.
///
/// Transient failures are retried with backoff; once attempts run out the
/// result is `Ok(None)` so the caller decides whether a missing answer is
/// fatal for its step. Permission and other failures are returned after the
/// first attempt; a mutation that failed for an unknown reason may still have
/// been applied.
pub async fn execute_with_policy<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &'static str,
    mut call: F,
) -> Result<Option<T>, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    for attempt in 0..policy.max_attempts {
        match call().await {
            Ok(value) => return Ok(Some(value)),
            Err(ApiError::Transient(reason)) => {
                if attempt + 1 == policy.max_attempts {
                    break;
                }
                let delay = policy.delay_for(attempt, policy.jitter());
                warn!(
                    operation,
                    attempt = attempt + 1,
                    %reason,
                    "retryable API failure, retrying in {:.2}s",
                    delay.as_secs_f64()
                );
                tokio::time::sleep(delay).await;
            }
            Err(ApiError::Permission(msg)) => {
                error!(operation, "GitHub token is missing required permissions: {msg}");
                error!(
                    "ensure the token has the {} scopes",
                    REQUIRED_SCOPES.join(", ")
                );
                return Err(ApiError::Permission(msg));
            }
            Err(other) => return Err(other),
        }
    }
    error!(
        operation,
        "API call failed after {} attempts", policy.max_attempts
    );
    Ok(None)
}
