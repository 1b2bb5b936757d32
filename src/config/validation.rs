//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (durations > 0, retry cap, rates in 0..=1)
//! - Check that addresses parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ServiceConfig;
use crate::resilience::MAX_RETRY_ATTEMPTS;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    #[error("retry.max_attempts is {0}, at most {max} allowed", max = MAX_RETRY_ATTEMPTS)]
    TooManyRetries(u32),

    #[error("circuit_breaker.failure_threshold must be at least 1")]
    ZeroThreshold,

    #[error("store.faults.failure_rate must be between 0 and 1, got {0}")]
    FailureRateOutOfRange(String),

    #[error("{field} is not a valid socket address: {value}")]
    InvalidAddress { field: &'static str, value: String },
}

pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let durations = [
        ("timeout.duration_ms", config.timeout.duration_ms),
        ("retry.base_delay_ms", config.retry.base_delay_ms),
        ("retry.max_delay_ms", config.retry.max_delay_ms),
        ("circuit_breaker.open_duration_ms", config.circuit_breaker.open_duration_ms),
    ];
    for (field, value) in durations {
        if value == 0 {
            errors.push(ValidationError::ZeroDuration { field });
        }
    }

    if config.retry.max_attempts > MAX_RETRY_ATTEMPTS {
        errors.push(ValidationError::TooManyRetries(config.retry.max_attempts));
    }

    if config.circuit_breaker.failure_threshold == 0 {
        errors.push(ValidationError::ZeroThreshold);
    }

    let rate = config.store.faults.failure_rate;
    if !(0.0..=1.0).contains(&rate) {
        errors.push(ValidationError::FailureRateOutOfRange(rate.to_string()));
    }

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
