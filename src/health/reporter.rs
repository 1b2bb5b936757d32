//! Circuit breaker health reporting.
//!
//! # Mapping
//! ```text
//! Closed   → Healthy
//! HalfOpen → Degraded
//! Open     → Unhealthy
//! ```
//!
//! # Design Decisions
//! - Read-only: a query never transitions the breaker or invokes the operation
//! - An Open breaker past its open duration reads as HalfOpen, the state the
//!   next call will find

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::resilience::{CircuitBreaker, CircuitState};

/// Three-valued health signal.
///
/// Ordered from best to worst so the worst of several checks is the max.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "Healthy"),
            HealthStatus::Degraded => write!(f, "Degraded"),
            HealthStatus::Unhealthy => write!(f, "Unhealthy"),
        }
    }
}

impl From<CircuitState> for HealthStatus {
    fn from(state: CircuitState) -> Self {
        match state {
            CircuitState::Closed => HealthStatus::Healthy,
            CircuitState::HalfOpen => HealthStatus::Degraded,
            CircuitState::Open => HealthStatus::Unhealthy,
        }
    }
}

/// Health derived from the breaker at query time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthSnapshot {
    pub status: HealthStatus,
    pub state: CircuitState,
    pub description: String,
    /// When the breaker last changed state.
    ///
    /// Not the time of the query: two queries with no call in between
    /// return identical snapshots.
    pub since: DateTime<Utc>,
}

/// Exposes breaker state as a health signal.
#[derive(Debug, Clone)]
pub struct HealthReporter {
    breaker: Arc<CircuitBreaker>,
}

impl HealthReporter {
    pub fn new(breaker: Arc<CircuitBreaker>) -> Self {
        Self { breaker }
    }

    pub fn query_health(&self) -> HealthSnapshot {
        let (state, since) = self.breaker.health_view();
        HealthSnapshot {
            status: state.into(),
            state,
            description: format!("Circuit breaker is currently {}.", state),
            since,
        }
    }
}
