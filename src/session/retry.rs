//! Bounded acquisition retry
//!
//! Pure state machine: it decides, the caller sleeps. Keeps retry policy
//! testable without a timer.

use std::time::Duration;

/// What to do after a failed acquisition attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    GiveUp { attempts: u32 },
}

/// Fixed-interval retry with a cap on additional attempts
#[derive(Debug, Clone)]
pub struct AcquireRetry {
    failures: u32,
    max_retries: u32,
    delay: Duration,
}

impl AcquireRetry {
    /// `max_retries` attempts are allowed after the first failure
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self {
            failures: 0,
            max_retries,
            delay,
        }
    }

    /// Attempts made and failed so far
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Record a failed attempt and decide the next step
    pub fn record_failure(&mut self) -> RetryDecision {
        self.failures += 1;
        if self.failures > self.max_retries {
            RetryDecision::GiveUp {
                attempts: self.failures,
            }
        } else {
            RetryDecision::RetryAfter(self.delay)
        }
    }

    pub fn reset(&mut self) {
        self.failures = 0;
    }
}
