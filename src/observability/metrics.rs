//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define service metrics (requests, latency, retries, breaker state)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `routes_requests_total` (counter): requests by endpoint, status
//! - `routes_request_duration_seconds` (histogram): latency by endpoint
//! - `resilience_retries_total` (counter): retries scheduled
//! - `resilience_breaker_transitions_total` (counter): transitions by target state
//! - `resilience_breaker_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `resilience_outcomes_total` (counter): guarded call outcomes by kind
//! - `resilience_call_duration_seconds` (histogram): guarded call latency
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so tests need none
//! - Exporter failure is logged, never fatal

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::CircuitState;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(endpoint: &'static str, status: u16, duration: Duration) {
    ::metrics::counter!(
        "routes_requests_total",
        "endpoint" => endpoint,
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("routes_request_duration_seconds", "endpoint" => endpoint)
        .record(duration.as_secs_f64());
}

pub fn record_retry() {
    ::metrics::counter!("resilience_retries_total").increment(1);
}

pub fn record_breaker_transition(to: CircuitState) {
    ::metrics::counter!("resilience_breaker_transitions_total", "to" => state_label(to))
        .increment(1);
    record_breaker_state(to);
}

pub fn record_breaker_state(state: CircuitState) {
    ::metrics::gauge!("resilience_breaker_state").set(state_value(state));
}

pub fn record_outcome(outcome: &'static str, duration: Duration) {
    ::metrics::counter!("resilience_outcomes_total", "outcome" => outcome).increment(1);
    ::metrics::histogram!("resilience_call_duration_seconds", "outcome" => outcome)
        .record(duration.as_secs_f64());
}

fn state_label(state: CircuitState) -> &'static str {
    match state {
        CircuitState::Closed => "closed",
        CircuitState::HalfOpen => "half_open",
        CircuitState::Open => "open",
    }
}

fn state_value(state: CircuitState) -> f64 {
    match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_gauge_values() {
        assert_eq!(state_value(CircuitState::Closed), 0.0);
        assert_eq!(state_value(CircuitState::HalfOpen), 1.0);
        assert_eq!(state_value(CircuitState::Open), 2.0);
        assert_eq!(state_label(CircuitState::HalfOpen), "half_open");
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_request("routes", 200, Duration::from_millis(5));
        record_retry();
        record_breaker_transition(CircuitState::Open);
        record_outcome("success", Duration::from_millis(1));
    }
}
