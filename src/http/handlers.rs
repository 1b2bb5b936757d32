//! Request handlers.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::health::{HealthReport, HealthStatus};
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::observability::metrics;

#[derive(Debug, Default, Deserialize)]
pub struct RouteQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

/// Trimmed, upper-cased IATA code, or `None` when blank.
fn normalize_code(code: Option<String>) -> Option<String> {
    code.map(|c| c.trim().to_ascii_uppercase())
        .filter(|c| !c.is_empty())
}

/// `GET /api/flights/routes?from=XXX&to=YYY`
pub async fn get_routes(State(state): State<AppState>, Query(query): Query<RouteQuery>) -> Response {
    let started = Instant::now();
    let response = match (normalize_code(query.from), normalize_code(query.to)) {
        (Some(from), Some(to)) => find_routes(&state, from, to).await,
        _ => ApiError::MissingCodes.into_response(),
    };
    metrics::record_request("routes", response.status().as_u16(), started.elapsed());
    response
}

async fn find_routes(state: &AppState, from: String, to: String) -> Response {
    // Dropped with the handler when the client goes away.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    tracing::debug!(from = %from, to = %to, "Looking up routes");
    let store = state.store.clone();
    let result = state
        .pipeline
        .execute(
            move || {
                let store = store.clone();
                let from = from.clone();
                let to = to.clone();
                async move { store.find_routes(&from, &to).await }
            },
            cancel,
        )
        .await;

    match result {
        Ok(routes) => Json(routes).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Response {
    let started = Instant::now();
    let report = HealthReport::collect(&state.health_checks).await;
    let status = match report.status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
    };
    metrics::record_request("health", status.as_u16(), started.elapsed());
    (status, Json(report)).into_response()
}
