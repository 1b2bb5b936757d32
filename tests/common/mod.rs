//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use resilient_routes::config::ServiceConfig;
use resilient_routes::lifecycle::{Service, Shutdown, StartupError};
use resilient_routes::resilience::{
    BreakerSettings, EventListener, PipelineSettings, ResilienceEvent, ResiliencePipeline,
    RetrySettings, TimeoutStrategy, TokioClock,
};
use resilient_routes::store::{FaultInjectingStore, InMemoryRouteStore};

/// Keeps every event for later assertions.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<ResilienceEvent>>,
}

impl RecordingListener {
    pub fn events(&self) -> Vec<ResilienceEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn retry_delays(&self) -> Vec<Duration> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ResilienceEvent::RetryScheduled { delay, .. } => Some(delay),
                _ => None,
            })
            .collect()
    }
}

impl EventListener for RecordingListener {
    fn on_event(&self, event: &ResilienceEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

pub fn settings(timeout_ms: u64, max_attempts: u32, threshold: u32, open_ms: u64) -> PipelineSettings {
    PipelineSettings {
        timeout: Duration::from_millis(timeout_ms),
        timeout_strategy: TimeoutStrategy::Pessimistic,
        abandon_grace: Duration::from_secs(30),
        retry: RetrySettings {
            max_attempts,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            jitter: false,
        },
        breaker: BreakerSettings {
            failure_threshold: threshold,
            open_duration: Duration::from_millis(open_ms),
        },
    }
}

pub fn pipeline(settings: PipelineSettings) -> (ResiliencePipeline, Arc<RecordingListener>) {
    let events = Arc::new(RecordingListener::default());
    let pipeline = ResiliencePipeline::with_parts(settings, Arc::new(TokioClock), events.clone());
    (pipeline, events)
}

/// Operation that counts its invocations, waits `delay`, then returns `result`.
pub fn counting_op<T>(
    calls: Arc<AtomicU32>,
    delay: Duration,
    result: Result<T, String>,
) -> impl Fn() -> BoxFuture<'static, Result<T, String>> + Send + Sync + 'static
where
    T: Clone + Send + Sync + 'static,
{
    move || {
        let calls = calls.clone();
        let result = result.clone();
        Box::pin(async move {
            calls.fetch_add(1, Ordering::SeqCst);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            result
        })
    }
}

/// Service config with short timings, bound to an ephemeral local port.
pub fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.timeout.duration_ms = 2_000;
    config.retry.max_attempts = 1;
    config.retry.base_delay_ms = 10;
    config.circuit_breaker.failure_threshold = 2;
    config.circuit_breaker.open_duration_ms = 60_000;
    config.observability.metrics_enabled = false;
    config
}

/// A running service instance.
pub struct TestServer {
    pub addr: SocketAddr,
    pub store: Arc<FaultInjectingStore<InMemoryRouteStore>>,
    pub pipeline: ResiliencePipeline,
    shutdown: Shutdown,
    handle: JoinHandle<Result<(), StartupError>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        let result = tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("server did not drain in time")
            .expect("server task panicked");
        assert!(result.is_ok(), "server returned {:?}", result);
    }
}

pub async fn spawn_server(config: ServiceConfig) -> TestServer {
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let service = Service::build(config).unwrap();
    let store = service.store().clone();
    let pipeline = service.pipeline().clone();

    let shutdown = Shutdown::new();
    let handle = tokio::spawn(service.serve(listener, shutdown.subscribe()));

    TestServer {
        addr,
        store,
        pipeline,
        shutdown,
        handle,
    }
}
