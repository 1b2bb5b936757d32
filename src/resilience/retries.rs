//! Retry logic.
//!
//! # Responsibilities
//! - Re-invoke the inner stage after a failure, up to `max_attempts` more times
//! - Wait an exponentially growing delay between attempts
//! - Honor caller cancellation between attempts
//!
//! # Design Decisions
//! - Every failure counts, including breaker fast-fails: the total number of
//!   attempts stays bounded even against an open breaker
//! - The last failure is returned as-is once the budget is spent
//! - Cancellation never interrupts an in-flight attempt
//! - Attempts are capped at `MAX_RETRY_ATTEMPTS` so delays cannot overflow

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::resilience::backoff::calculate_backoff;
use crate::resilience::clock::Clock;
use crate::resilience::error::ResilienceError;
use crate::resilience::events::{EventListener, ResilienceEvent};

/// Hard ceiling on configured retries.
pub const MAX_RETRY_ATTEMPTS: u32 = 20;

/// Retry tuning, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySettings {
    /// Retries after the first attempt. 0 disables retrying.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

/// Re-invokes a failing stage with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    settings: RetrySettings,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventListener>,
}

impl RetryPolicy {
    pub fn new(settings: RetrySettings, clock: Arc<dyn Clock>, events: Arc<dyn EventListener>) -> Self {
        if settings.max_attempts > MAX_RETRY_ATTEMPTS {
            tracing::warn!(
                configured = settings.max_attempts,
                max = MAX_RETRY_ATTEMPTS,
                "Retry attempts clamped"
            );
        }
        let settings = RetrySettings {
            max_attempts: settings.max_attempts.min(MAX_RETRY_ATTEMPTS),
            ..settings
        };
        Self {
            settings,
            clock,
            events,
        }
    }

    pub fn settings(&self) -> RetrySettings {
        self.settings
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        calculate_backoff(
            attempt,
            self.settings.base_delay.as_millis() as u64,
            self.settings.max_delay.as_millis() as u64,
            self.settings.jitter,
        )
    }

    /// Run `stage` until it succeeds, the budget is spent, or `cancel` fires.
    ///
    /// `stage` receives the 1-based attempt number.
    pub async fn run<T, E, F, Fut>(
        &self,
        mut stage: F,
        cancel: &CancellationToken,
    ) -> Result<T, ResilienceError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ResilienceError<E>>>,
        E: fmt::Display,
    {
        let mut attempt: u32 = 1;

        loop {
            if cancel.is_cancelled() {
                return Err(ResilienceError::Cancelled);
            }

            let error = match stage(attempt).await {
                Ok(value) => return Ok(value),
                Err(ResilienceError::Cancelled) => return Err(ResilienceError::Cancelled),
                Err(e) => e,
            };

            if attempt > self.settings.max_attempts {
                tracing::debug!(attempts = attempt, error = %error, "Retry budget exhausted");
                return Err(error);
            }

            let delay = self.delay_for(attempt);
            self.events.on_event(&ResilienceEvent::RetryScheduled {
                attempt,
                delay,
                reason: error.to_string(),
            });

            if cancel.is_cancelled() {
                return Err(ResilienceError::Cancelled);
            }
            tokio::select! {
                _ = self.clock.sleep(delay) => {}
                _ = cancel.cancelled() => return Err(ResilienceError::Cancelled),
            }

            attempt += 1;
        }
    }
}
