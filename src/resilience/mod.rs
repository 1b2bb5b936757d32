//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Guarded call:
//!     → pipeline.rs (single entry point)
//!     → timeouts.rs (deadline for the whole call)
//!     → retries.rs (re-invoke with backoff.rs delays)
//!     → circuit_breaker.rs (track failures, fail fast while open)
//!     → operation
//!
//! Side channel:
//!     retries.rs / circuit_breaker.rs → events.rs → logs + metrics
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every guarded call has a deadline
//! - Failures are a tagged type; cancellation is never an operation failure
//! - Circuit breaker prevents cascading failures
//! - Time comes from clock.rs so tests can pause and advance it

pub mod backoff;
pub mod circuit_breaker;
pub mod clock;
pub mod error;
pub mod events;
pub mod pipeline;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{BreakerSettings, BreakerSnapshot, CircuitBreaker, CircuitState};
pub use clock::{Clock, TokioClock};
pub use error::ResilienceError;
pub use events::{EventListener, LoggingListener, ResilienceEvent};
pub use pipeline::{PipelineSettings, ResiliencePipeline};
pub use retries::{RetryPolicy, RetrySettings, MAX_RETRY_ATTEMPTS};
pub use timeouts::{Elapsed, TimeoutGuard, TimeoutStrategy};
