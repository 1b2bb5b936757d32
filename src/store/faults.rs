//! Fault injection for the route store.
//!
//! # Responsibilities
//! - Add latency to every lookup
//! - Fail a configurable fraction of lookups
//! - Simulate a full outage, switchable at runtime
//!
//! # Design Decisions
//! - Wraps any `RouteStore`; the inner store stays fault-free
//! - Latency is applied before the failure decision, like a slow network
//!   in front of a failing database

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use crate::config::FaultConfig;
use crate::store::{Route, RouteStore, StoreError};

/// Store wrapper that injects latency, random failures and outages.
#[derive(Debug)]
pub struct FaultInjectingStore<S> {
    inner: S,
    latency: Duration,
    failure_rate: f64,
    outage: AtomicBool,
}

impl<S: RouteStore> FaultInjectingStore<S> {
    pub fn new(inner: S, faults: &FaultConfig) -> Self {
        Self {
            inner,
            latency: Duration::from_millis(faults.latency_ms),
            failure_rate: faults.failure_rate.clamp(0.0, 1.0),
            outage: AtomicBool::new(faults.outage),
        }
    }

    /// Start or stop a simulated outage.
    pub fn set_outage(&self, outage: bool) {
        let previous = self.outage.swap(outage, Ordering::SeqCst);
        if previous != outage {
            tracing::warn!(outage = outage, "Route store outage toggled");
        }
    }

    pub fn is_out(&self) -> bool {
        self.outage.load(Ordering::SeqCst)
    }

    async fn inject(&self) -> Result<(), StoreError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.is_out() {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        if self.failure_rate > 0.0 && rand::thread_rng().gen_bool(self.failure_rate) {
            return Err(StoreError::Query("injected failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl<S: RouteStore> RouteStore for FaultInjectingStore<S> {
    async fn find_routes(&self, from: &str, to: &str) -> Result<Vec<Route>, StoreError> {
        self.inject().await?;
        self.inner.find_routes(from, to).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        if self.is_out() {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        self.inner.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryRouteStore;
    use tokio::time::Instant;

    fn faults(latency_ms: u64, failure_rate: f64, outage: bool) -> FaultConfig {
        FaultConfig {
            latency_ms,
            failure_rate,
            outage,
        }
    }

    #[tokio::test]
    async fn test_no_faults_passes_through() {
        let store = FaultInjectingStore::new(InMemoryRouteStore::with_sample_data(), &faults(0, 0.0, false));
        assert_eq!(store.find_routes("OPO", "LIS").await.unwrap().len(), 2);
        assert!(store.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_outage_fails_and_recovers() {
        let store = FaultInjectingStore::new(InMemoryRouteStore::with_sample_data(), &faults(0, 0.0, true));
        assert!(matches!(
            store.find_routes("OPO", "LIS").await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.ping().await.is_err());

        store.set_outage(false);
        assert!(store.find_routes("OPO", "LIS").await.is_ok());
    }

    #[tokio::test]
    async fn test_full_failure_rate_always_fails() {
        let store = FaultInjectingStore::new(InMemoryRouteStore::with_sample_data(), &faults(0, 1.0, false));
        for _ in 0..10 {
            assert!(matches!(
                store.find_routes("OPO", "LIS").await,
                Err(StoreError::Query(_))
            ));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_is_added() {
        let store = FaultInjectingStore::new(InMemoryRouteStore::with_sample_data(), &faults(200, 0.0, false));
        let start = Instant::now();
        store.find_routes("OPO", "LIS").await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_millis(200));
    }
}
