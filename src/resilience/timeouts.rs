//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound the wall-clock duration of a unit of work
//! - Return promptly when the deadline passes, whatever the work is doing
//!
//! # Design Decisions
//! - Pessimistic by default: the work runs on its own task and is raced
//!   against the timer; on timeout the task is abandoned, not cancelled
//! - Abandoned tasks get a grace period, then they are aborted
//! - Optimistic mode drops the work future instead (cooperative cancellation)
//! - Timeout errors are distinct from other errors

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resilience::clock::Clock;

/// How the guard treats work that outlives its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimeoutStrategy {
    /// Walk away from the work; it keeps running in the background.
    #[default]
    Pessimistic,
    /// Drop the work future; it stops at its next await point.
    Optimistic,
}

/// The deadline passed before the work finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("deadline of {}ms elapsed", after.as_millis())]
pub struct Elapsed {
    pub after: Duration,
}

/// Bounds the duration of one unit of work.
#[derive(Debug, Clone)]
pub struct TimeoutGuard {
    duration: Duration,
    strategy: TimeoutStrategy,
    abandon_grace: Duration,
    clock: Arc<dyn Clock>,
}

impl TimeoutGuard {
    pub fn new(
        duration: Duration,
        strategy: TimeoutStrategy,
        abandon_grace: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            duration,
            strategy,
            abandon_grace,
            clock,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn strategy(&self) -> TimeoutStrategy {
        self.strategy
    }

    /// Run `work`, giving up after the configured duration.
    ///
    /// A panic inside pessimistically spawned work is resumed on the caller.
    pub async fn run<F>(&self, work: F) -> Result<F::Output, Elapsed>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        match self.strategy {
            TimeoutStrategy::Optimistic => self.run_optimistic(work).await,
            TimeoutStrategy::Pessimistic => self.run_pessimistic(work).await,
        }
    }

    async fn run_optimistic<F: Future>(&self, work: F) -> Result<F::Output, Elapsed> {
        let timer = self.clock.sleep(self.duration);
        tokio::select! {
            output = work => Ok(output),
            _ = timer => Err(Elapsed { after: self.duration }),
        }
    }

    async fn run_pessimistic<F>(&self, work: F) -> Result<F::Output, Elapsed>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let mut handle = tokio::spawn(work);
        let timer = self.clock.sleep(self.duration);

        tokio::select! {
            joined = &mut handle => match joined {
                Ok(output) => Ok(output),
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                // Only the runtime shutting down cancels the task; treat it as out of time.
                Err(_) => Err(Elapsed { after: self.duration }),
            },
            _ = timer => {
                tracing::debug!(
                    timeout_ms = self.duration.as_millis() as u64,
                    grace_ms = self.abandon_grace.as_millis() as u64,
                    "Deadline elapsed, abandoning work"
                );
                let grace = self.clock.sleep(self.abandon_grace);
                tokio::spawn(async move {
                    tokio::select! {
                        _ = &mut handle => {}
                        _ = grace => {
                            tracing::warn!("Abandoned work outlived its grace period, aborting");
                            handle.abort();
                        }
                    }
                });
                Err(Elapsed { after: self.duration })
            }
        }
    }
}
