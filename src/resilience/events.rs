//! Resilience events and their listeners.
//!
//! # Responsibilities
//! - Describe what the policies did (retry scheduled, breaker transitions)
//! - Hand those events to an observability collaborator
//!
//! # Design Decisions
//! - Listeners are synchronous and must not block; the breaker calls them
//!   right after releasing its lock
//! - The default listener logs through `tracing` and records metrics

use std::fmt;
use std::time::Duration;

use crate::observability::metrics;
use crate::resilience::circuit_breaker::CircuitState;

/// Something observable the resilience policies did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResilienceEvent {
    /// A failed attempt will be retried after `delay`.
    RetryScheduled {
        attempt: u32,
        delay: Duration,
        reason: String,
    },
    /// The breaker opened and will fail fast for `open_duration`.
    BreakerOpened {
        open_duration: Duration,
        reason: String,
    },
    /// The open duration elapsed; the next call is a trial.
    BreakerHalfOpen,
    /// A trial succeeded and the breaker closed again.
    BreakerReset,
}

/// Consumer of resilience events.
pub trait EventListener: Send + Sync + fmt::Debug {
    fn on_event(&self, event: &ResilienceEvent);
}

/// Writes every event as a structured log line and updates metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingListener;

impl EventListener for LoggingListener {
    fn on_event(&self, event: &ResilienceEvent) {
        match event {
            ResilienceEvent::RetryScheduled { attempt, delay, reason } => {
                tracing::warn!(
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    reason = %reason,
                    "Retrying guarded operation"
                );
                metrics::record_retry();
            }
            ResilienceEvent::BreakerOpened { open_duration, reason } => {
                tracing::warn!(
                    open_duration_ms = open_duration.as_millis() as u64,
                    reason = %reason,
                    "Circuit breaker opened"
                );
                metrics::record_breaker_transition(CircuitState::Open);
            }
            ResilienceEvent::BreakerHalfOpen => {
                tracing::info!("Circuit breaker is half-open, next call is a trial");
                metrics::record_breaker_transition(CircuitState::HalfOpen);
            }
            ResilienceEvent::BreakerReset => {
                tracing::info!("Circuit breaker reset");
                metrics::record_breaker_transition(CircuitState::Closed);
            }
        }
    }
}
