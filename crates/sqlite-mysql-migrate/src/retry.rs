//! Retry policy for connection establishment.
//!
//! The policy is applied around a single fallible call (typically opening a
//! pool). Each failed attempt is logged; the error of the last attempt is
//! returned once `max_attempts` is exhausted.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::error::Result;

/// Retry policy with optional exponential backoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of attempts (including the first one).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt, in milliseconds.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Multiplier applied to the delay after each failed attempt.
    /// 1.0 keeps a constant delay.
    #[serde(default = "default_backoff")]
    pub backoff: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_delay_ms() -> u64 {
    2000
}

fn default_backoff() -> f64 {
    1.0
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
            backoff: default_backoff(),
        }
    }
}

impl RetryPolicy {
    /// A policy that tries exactly once.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            delay_ms: 0,
            backoff: 1.0,
        }
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff.max(1.0).powi(attempt.saturating_sub(1) as i32);
        Duration::from_millis((self.delay_ms as f64 * factor) as u64)
    }

    /// Run `op` until it succeeds or the attempts are exhausted.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < max_attempts => {
                    warn!("{}: attempt {}/{} failed: {}", what, attempt, max_attempts, e);
                    tokio::time::sleep(self.delay_for(attempt)).await;
                }
                Err(e) => {
                    error!("{}: all {} attempts failed", what, max_attempts);
                    return Err(e);
                }
            }
        }
    }
}
