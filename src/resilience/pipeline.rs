//! Policy pipeline: Timeout ∘ Retry ∘ CircuitBreaker ∘ operation.
//!
//! # Data Flow
//! ```text
//! execute(operation, cancel)
//!     → TimeoutGuard (one deadline for the whole call)
//!         → RetryPolicy (attempt 1..=max_attempts+1, backoff between)
//!             → CircuitBreaker (fail fast or admit)
//!                 → operation()
//! ```
//!
//! # Design Decisions
//! - The timeout bounds the entire retry-and-breaker sequence, not each attempt
//! - When the deadline passes, the background sequence is marked abandoned:
//!   the breaker discards the outcome of the attempt in flight and reports
//!   it as cancelled, so no retry is scheduled and nothing is counted twice
//! - Caller cancellation is checked between attempts only

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::ServiceConfig;
use crate::observability::metrics;
use crate::resilience::circuit_breaker::{BreakerSettings, CircuitBreaker};
use crate::resilience::clock::{Clock, TokioClock};
use crate::resilience::error::ResilienceError;
use crate::resilience::events::{EventListener, LoggingListener};
use crate::resilience::retries::{RetryPolicy, RetrySettings};
use crate::resilience::timeouts::{TimeoutGuard, TimeoutStrategy};

/// Everything needed to build a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    pub timeout: Duration,
    pub timeout_strategy: TimeoutStrategy,
    pub abandon_grace: Duration,
    pub retry: RetrySettings,
    pub breaker: BreakerSettings,
}

impl From<&ServiceConfig> for PipelineSettings {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            timeout: Duration::from_millis(config.timeout.duration_ms),
            timeout_strategy: config.timeout.strategy,
            abandon_grace: Duration::from_millis(config.timeout.abandon_grace_ms),
            retry: RetrySettings {
                max_attempts: config.retry.max_attempts,
                base_delay: Duration::from_millis(config.retry.base_delay_ms),
                max_delay: Duration::from_millis(config.retry.max_delay_ms),
                jitter: config.retry.jitter,
            },
            breaker: BreakerSettings {
                failure_threshold: config.circuit_breaker.failure_threshold,
                open_duration: Duration::from_millis(config.circuit_breaker.open_duration_ms),
            },
        }
    }
}

/// Guards one downstream operation with timeout, retry and circuit breaker.
///
/// Built once at startup and shared; the breaker inside is the only mutable
/// state and is shared by every call.
#[derive(Debug, Clone)]
pub struct ResiliencePipeline {
    timeout: TimeoutGuard,
    retry: RetryPolicy,
    breaker: Arc<CircuitBreaker>,
}

impl ResiliencePipeline {
    /// Pipeline on the Tokio clock, reporting through [`LoggingListener`].
    pub fn new(settings: PipelineSettings) -> Self {
        Self::with_parts(settings, Arc::new(TokioClock), Arc::new(LoggingListener))
    }

    pub fn with_parts(
        settings: PipelineSettings,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventListener>,
    ) -> Self {
        let timeout = TimeoutGuard::new(
            settings.timeout,
            settings.timeout_strategy,
            settings.abandon_grace,
            clock.clone(),
        );
        let retry = RetryPolicy::new(settings.retry, clock.clone(), events.clone());
        let breaker = Arc::new(CircuitBreaker::new(settings.breaker, clock, events));

        Self {
            timeout,
            retry,
            breaker,
        }
    }

    /// The breaker shared by every call through this pipeline.
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn timeout(&self) -> Duration {
        self.timeout.duration()
    }

    /// Run `operation` through the pipeline.
    ///
    /// `operation` is invoked once per admitted attempt. `cancel` is checked
    /// before every attempt and while waiting out a backoff delay.
    pub async fn execute<T, E, F, Fut>(
        &self,
        operation: F,
        cancel: CancellationToken,
    ) -> Result<T, ResilienceError<E>>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let started = Instant::now();
        let abandoned = CancellationToken::new();

        let retry = self.retry.clone();
        let breaker = self.breaker.clone();
        let work_abandoned = abandoned.clone();
        let work = async move {
            let breaker = &breaker;
            let operation = &operation;
            let abandoned = &work_abandoned;
            retry
                .run(
                    move |attempt| async move {
                        if abandoned.is_cancelled() {
                            return Err(ResilienceError::Cancelled);
                        }
                        tracing::trace!(attempt = attempt, "Invoking guarded operation");
                        breaker.call_unless_abandoned(operation, abandoned).await
                    },
                    &cancel,
                )
                .await
        };

        let outcome = match self.timeout.run(work).await {
            Ok(result) => result,
            Err(elapsed) => {
                abandoned.cancel();
                Err(ResilienceError::TimedOut { after: elapsed.after })
            }
        };

        match &outcome {
            Ok(_) => {
                tracing::debug!(elapsed_ms = started.elapsed().as_millis() as u64, "Guarded call succeeded");
                metrics::record_outcome("success", started.elapsed());
            }
            Err(e) => {
                tracing::debug!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    kind = e.kind(),
                    error = %e,
                    "Guarded call failed"
                );
                metrics::record_outcome(e.kind(), started.elapsed());
            }
        }
        metrics::record_breaker_state(self.breaker.snapshot().state);

        outcome
    }
}
