//! Error responses.
//!
//! # Responsibilities
//! - Map pipeline failures to HTTP status codes
//! - Tell clients when to come back while the circuit is open
//!
//! # Design Decisions
//! - Circuit open → 503 with `Retry-After` in whole seconds, rounded up
//! - Timed out → 504 Gateway Timeout
//! - Store failure → 500; the store's message is logged, not returned

use std::time::Duration;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::resilience::ResilienceError;
use crate::store::StoreError;

/// Everything a routes request can fail with.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing IATA codes.")]
    MissingCodes,

    #[error("Route service is unavailable, try again later.")]
    CircuitOpen { retry_after: Duration },

    #[error("Route lookup timed out.")]
    TimedOut,

    #[error("Route lookup failed.")]
    Store(StoreError),

    #[error("Request cancelled.")]
    Cancelled,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingCodes => StatusCode::BAD_REQUEST,
            ApiError::CircuitOpen { .. } | ApiError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::TimedOut => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ResilienceError<StoreError>> for ApiError {
    fn from(err: ResilienceError<StoreError>) -> Self {
        match err {
            ResilienceError::Operation(e) => ApiError::Store(e),
            ResilienceError::TimedOut { .. } => ApiError::TimedOut,
            ResilienceError::CircuitOpen { retry_after } => ApiError::CircuitOpen { retry_after },
            ResilienceError::Cancelled => ApiError::Cancelled,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Store(e) = &self {
            tracing::error!(error = %e, "Route lookup failed");
        }

        let mut response = (self.status(), self.to_string()).into_response();
        if let ApiError::CircuitOpen { retry_after } = self {
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs.max(1)));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ResilienceError::Operation(StoreError::Query("x".into())), StatusCode::INTERNAL_SERVER_ERROR),
            (ResilienceError::TimedOut { after: Duration::from_secs(1) }, StatusCode::GATEWAY_TIMEOUT),
            (
                ResilienceError::CircuitOpen { retry_after: Duration::from_secs(1) },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (ResilienceError::Cancelled, StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let response = ApiError::CircuitOpen {
            retry_after: Duration::from_millis(1500),
        }
        .into_response();
        assert_eq!(response.headers()[header::RETRY_AFTER], "2");
    }

    #[test]
    fn test_retry_after_at_least_one_second() {
        let response = ApiError::CircuitOpen {
            retry_after: Duration::ZERO,
        }
        .into_response();
        assert_eq!(response.headers()[header::RETRY_AFTER], "1");
    }
}
