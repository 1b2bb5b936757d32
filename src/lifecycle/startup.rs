//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration
//! - Initialize subsystems in dependency order (store, pipeline, health)
//! - Start the metrics exporter
//! - Bind the listener and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when ready)
//! - Draining has a deadline; stragglers are dropped after it

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::config::{validate_config, ConfigError, ServiceConfig};
use crate::health::{BreakerCheck, HealthCheck, HealthReporter, StoreCheck};
use crate::http::{AppState, HttpServer};
use crate::lifecycle::{signals, Shutdown};
use crate::observability::metrics;
use crate::resilience::{PipelineSettings, ResiliencePipeline};
use crate::store::{FaultInjectingStore, InMemoryRouteStore, RouteStore, StoreError};

/// How long in-flight requests may take to finish after shutdown.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),

    #[error("server task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// The assembled service, ready to serve.
pub struct Service {
    config: ServiceConfig,
    pipeline: ResiliencePipeline,
    store: Arc<FaultInjectingStore<InMemoryRouteStore>>,
}

impl Service {
    pub fn build(config: ServiceConfig) -> Result<Self, StartupError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let routes = match &config.store.routes_path {
            Some(path) => InMemoryRouteStore::from_json_file(path)?,
            None => InMemoryRouteStore::with_sample_data(),
        };
        let store = Arc::new(FaultInjectingStore::new(routes, &config.store.faults));

        let settings = PipelineSettings::from(&config);
        tracing::info!(
            timeout_ms = settings.timeout.as_millis() as u64,
            strategy = ?settings.timeout_strategy,
            max_attempts = settings.retry.max_attempts,
            base_delay_ms = settings.retry.base_delay.as_millis() as u64,
            failure_threshold = settings.breaker.failure_threshold,
            open_duration_ms = settings.breaker.open_duration.as_millis() as u64,
            "Resilience pipeline configured"
        );
        let pipeline = ResiliencePipeline::new(settings);

        Ok(Self {
            config,
            pipeline,
            store,
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &ResiliencePipeline {
        &self.pipeline
    }

    /// The fault-injecting store, for toggling outages at runtime.
    pub fn store(&self) -> &Arc<FaultInjectingStore<InMemoryRouteStore>> {
        &self.store
    }

    pub fn app_state(&self) -> AppState {
        let store: Arc<dyn RouteStore> = self.store.clone();
        let checks: Vec<Arc<dyn HealthCheck>> = vec![
            Arc::new(BreakerCheck::new(HealthReporter::new(self.pipeline.breaker().clone()))),
            Arc::new(StoreCheck::new(store.clone(), self.pipeline.timeout())),
        ];
        AppState {
            pipeline: self.pipeline.clone(),
            store,
            health_checks: checks.into(),
        }
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), StartupError> {
        HttpServer::new(self.app_state()).run(listener, shutdown).await?;
        Ok(())
    }
}

/// Run the service until a shutdown signal arrives.
pub async fn run(config: ServiceConfig) -> Result<(), StartupError> {
    let service = Service::build(config)?;

    let observability = &service.config().observability;
    if observability.metrics_enabled {
        match observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let address = service.config().listener.bind_address.clone();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.clone(),
            source,
        })?;
    tracing::info!(address = %address, "Listening for connections");

    let shutdown = Shutdown::new();
    let mut server = tokio::spawn(service.serve(listener, shutdown.subscribe()));

    tokio::select! {
        result = &mut server => return result?,
        _ = signals::shutdown_signal() => {}
    }

    shutdown.trigger();
    match tokio::time::timeout(DRAIN_TIMEOUT, server).await {
        Ok(result) => result?,
        Err(_) => {
            tracing::warn!(deadline_secs = DRAIN_TIMEOUT.as_secs(), "Drain deadline exceeded, exiting");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_rejects_invalid_config() {
        let mut config = ServiceConfig::default();
        config.circuit_breaker.failure_threshold = 0;
        assert!(matches!(
            Service::build(config),
            Err(StartupError::Config(ConfigError::Validation(_)))
        ));
    }

    #[test]
    fn test_build_fails_on_missing_routes_file() {
        let mut config = ServiceConfig::default();
        config.store.routes_path = Some("/nonexistent/routes.json".into());
        assert!(matches!(Service::build(config), Err(StartupError::Store(_))));
    }

    #[tokio::test]
    async fn test_app_state_has_both_checks() {
        let service = Service::build(ServiceConfig::default()).unwrap();
        let state = service.app_state();
        let names: Vec<&str> = state.health_checks.iter().map(|c| c.name()).collect();
        assert_eq!(names, ["Circuit Breaker", "Route Store"]);
    }
}
