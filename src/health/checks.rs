//! Individual health checks.
//!
//! # Responsibilities
//! - Report the circuit breaker as a health signal
//! - Probe the route store, bounded by a timeout

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::health::reporter::{HealthReporter, HealthStatus};
use crate::store::RouteStore;

/// Result of a single check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub status: HealthStatus,
    pub description: String,
}

impl CheckOutcome {
    pub fn new(status: HealthStatus, description: impl Into<String>) -> Self {
        Self {
            status,
            description: description.into(),
        }
    }
}

/// A named probe contributing to the aggregate health report.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    fn name(&self) -> &str;

    async fn check(&self) -> CheckOutcome;
}

/// Maps the breaker state onto a check outcome. Never touches the breaker.
#[derive(Debug, Clone)]
pub struct BreakerCheck {
    reporter: HealthReporter,
}

impl BreakerCheck {
    pub fn new(reporter: HealthReporter) -> Self {
        Self { reporter }
    }
}

#[async_trait]
impl HealthCheck for BreakerCheck {
    fn name(&self) -> &str {
        "Circuit Breaker"
    }

    async fn check(&self) -> CheckOutcome {
        let snapshot = self.reporter.query_health();
        CheckOutcome::new(snapshot.status, snapshot.description)
    }
}

/// Pings the route store directly, outside the resilience pipeline.
pub struct StoreCheck {
    store: Arc<dyn RouteStore>,
    timeout: Duration,
}

impl StoreCheck {
    pub fn new(store: Arc<dyn RouteStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }
}

#[async_trait]
impl HealthCheck for StoreCheck {
    fn name(&self) -> &str {
        "Route Store"
    }

    async fn check(&self) -> CheckOutcome {
        match tokio::time::timeout(self.timeout, self.store.ping()).await {
            Ok(Ok(())) => CheckOutcome::new(HealthStatus::Healthy, "Route store is reachable."),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Route store ping failed");
                CheckOutcome::new(HealthStatus::Unhealthy, format!("Route store ping failed: {}", e))
            }
            Err(_) => CheckOutcome::new(
                HealthStatus::Unhealthy,
                format!("Route store did not answer within {}ms.", self.timeout.as_millis()),
            ),
        }
    }
}
