//! Time source for the resilience policies.
//!
//! # Responsibilities
//! - Supply the current instant (breaker open-duration expiry)
//! - Supply non-blocking delays (retry backoff, timeout timer)
//!
//! # Design Decisions
//! - Production clock is Tokio's timer, so tests drive it with
//!   `tokio::time::pause()` / `advance()` instead of a hand-rolled fake
//! - `tokio::time::Instant` rather than `std::time::Instant` for the same reason

use std::fmt;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::time::Instant;

/// Source of time and delayed resumption.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current monotonic instant.
    fn now(&self) -> Instant;

    /// Resolve after `duration` without blocking the executor.
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

/// Clock backed by the Tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}
