//! Retry policy for task attempts
//!
//! [`RetryPolicy::decide`] is a pure function of the attempt number and the
//! error; the coordinator owns the sleeping and the re-invocation.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Errors that can tell whether another attempt might succeed
pub trait Retryable {
    /// True for connection, network and timeout class failures
    fn is_transient(&self) -> bool;
}

/// Outcome of a retry decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for the delay, then attempt again
    Retry(Duration),
    /// Stop and mark the task failed
    GiveUp,
}

/// Delay growth between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    /// Same delay before every retry
    #[default]
    Fixed,
    /// Delay doubles after each failed attempt
    Exponential,
}

/// When and how long to wait before re-running a failed task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one (always >= 1)
    pub max_attempts: u32,
    /// Delay before the first retry
    pub delay: Duration,
    pub backoff: Backoff,
    /// Upper bound for exponential delays
    pub max_delay: Option<Duration>,
}

impl RetryPolicy {
    /// Fixed-delay policy
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            backoff: Backoff::Fixed,
            max_delay: None,
        }
    }

    /// Exponential policy capped at `max_delay`
    pub fn exponential(max_attempts: u32, delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            backoff: Backoff::Exponential,
            max_delay: Some(max_delay),
        }
    }

    /// Single attempt, never retry
    pub fn no_retry() -> Self {
        Self::fixed(1, Duration::ZERO)
    }

    /// Decide what to do after `attempt` (1-based) failed with `error`.
    pub fn decide<E: Retryable + ?Sized>(&self, attempt: u32, error: &E) -> RetryDecision {
        if !error.is_transient() || attempt >= self.max_attempts {
            return RetryDecision::GiveUp;
        }
        RetryDecision::Retry(self.delay_after(attempt))
    }

    /// Delay to wait after failed attempt number `attempt`
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential => {
                let exponent = attempt.saturating_sub(1).min(31);
                let delay = self.delay.saturating_mul(1u32 << exponent);
                match self.max_delay {
                    Some(cap) => delay.min(cap),
                    None => delay,
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    /// Initial attempt plus two retries, five minutes apart
    fn default() -> Self {
        Self::fixed(3, Duration::from_secs(300))
    }
}

#[cfg(test)]
#[path = "retry_test.rs"]
mod tests;
