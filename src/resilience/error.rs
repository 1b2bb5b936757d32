//! Failure taxonomy surfaced by the resilience pipeline.

use std::time::Duration;

use thiserror::Error;

/// Failure of a guarded call.
///
/// `Operation` carries the guarded operation's own error untouched; the other
/// variants are produced by the pipeline itself.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResilienceError<E> {
    /// The guarded operation failed; the original error is preserved.
    #[error("{0}")]
    Operation(E),

    /// The call did not finish within its time budget.
    #[error("operation timed out after {}ms", after.as_millis())]
    TimedOut { after: Duration },

    /// The circuit breaker rejected the call without invoking the operation.
    #[error("circuit breaker is open, retry after {}ms", retry_after.as_millis())]
    CircuitOpen { retry_after: Duration },

    /// The caller cancelled the call between attempts.
    #[error("operation cancelled")]
    Cancelled,
}

impl<E> ResilienceError<E> {
    /// Returns the operation's own error, if that is what failed.
    pub fn into_operation(self) -> Option<E> {
        match self {
            ResilienceError::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ResilienceError::Operation(_) => "operation_failure",
            ResilienceError::TimedOut { .. } => "timed_out",
            ResilienceError::CircuitOpen { .. } => "circuit_open",
            ResilienceError::Cancelled => "cancelled",
        }
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ResilienceError::CircuitOpen { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ResilienceError::TimedOut { .. })
    }
}
