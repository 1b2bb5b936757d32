//! Aggregate health report served at `/health`.

use std::sync::Arc;
use std::time::Duration;

use serde::{Serialize, Serializer};
use tokio::time::Instant;

use crate::health::checks::HealthCheck;
use crate::health::reporter::HealthStatus;

/// One check's entry in the report.
#[derive(Debug, Clone, Serialize)]
pub struct CheckEntry {
    pub name: String,
    pub status: HealthStatus,
    pub description: String,
    #[serde(serialize_with = "as_millis")]
    pub duration: Duration,
}

/// Worst status across all checks, with per-check detail.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub checks: Vec<CheckEntry>,
    #[serde(rename = "totalDuration", serialize_with = "as_millis")]
    pub total_duration: Duration,
}

impl HealthReport {
    /// Run every check in order and aggregate. No checks reads as healthy.
    pub async fn collect(checks: &[Arc<dyn HealthCheck>]) -> Self {
        let started = Instant::now();
        let mut entries = Vec::with_capacity(checks.len());

        for check in checks {
            let check_started = Instant::now();
            let outcome = check.check().await;
            entries.push(CheckEntry {
                name: check.name().to_string(),
                status: outcome.status,
                description: outcome.description,
                duration: check_started.elapsed(),
            });
        }

        let status = entries
            .iter()
            .map(|e| e.status)
            .max()
            .unwrap_or(HealthStatus::Healthy);

        Self {
            status,
            checks: entries,
            total_duration: started.elapsed(),
        }
    }
}

fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64() * 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::checks::CheckOutcome;
    use async_trait::async_trait;

    struct Fixed(&'static str, HealthStatus);

    #[async_trait]
    impl HealthCheck for Fixed {
        fn name(&self) -> &str {
            self.0
        }

        async fn check(&self) -> CheckOutcome {
            CheckOutcome::new(self.1, format!("{} is {}", self.0, self.1))
        }
    }

    #[tokio::test]
    async fn test_report_takes_worst_status() {
        let checks: Vec<Arc<dyn HealthCheck>> = vec![
            Arc::new(Fixed("a", HealthStatus::Healthy)),
            Arc::new(Fixed("b", HealthStatus::Degraded)),
        ];
        let report = HealthReport::collect(&checks).await;
        assert_eq!(report.status, HealthStatus::Degraded);
        assert_eq!(report.checks.len(), 2);
        assert_eq!(report.checks[1].name, "b");
    }

    #[tokio::test]
    async fn test_empty_report_is_healthy() {
        let report = HealthReport::collect(&[]).await;
        assert_eq!(report.status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn test_report_json_shape() {
        let checks: Vec<Arc<dyn HealthCheck>> = vec![Arc::new(Fixed("a", HealthStatus::Unhealthy))];
        let report = HealthReport::collect(&checks).await;
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["status"], "Unhealthy");
        assert_eq!(json["checks"][0]["name"], "a");
        assert_eq!(json["checks"][0]["description"], "a is Unhealthy");
        assert!(json["checks"][0]["duration"].is_f64());
        assert!(json["totalDuration"].is_f64());
    }
}
