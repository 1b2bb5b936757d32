//! Route store subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP handler
//!     → resilience pipeline
//!     → faults.rs (optional latency / failures / outage)
//!     → memory.rs (route lookup)
//! ```
//!
//! # Design Decisions
//! - The store is the guarded operation; it knows nothing about retries
//! - Store errors are opaque to the pipeline beyond their message
//! - IATA codes are matched case-insensitively

pub mod faults;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use faults::FaultInjectingStore;
pub use memory::InMemoryRouteStore;

/// A direct flight between two airports.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Route {
    pub from: String,
    pub to: String,
    pub airline: String,
}

/// Errors produced by a route store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("route store unavailable: {0}")]
    Unavailable(String),

    /// The store answered but the query failed.
    #[error("route query failed: {0}")]
    Query(String),

    /// Loading route data failed.
    #[error("failed to load routes: {0}")]
    Load(String),
}

/// Source of flight routes.
#[async_trait]
pub trait RouteStore: Send + Sync {
    /// All routes from `from` to `to`.
    async fn find_routes(&self, from: &str, to: &str) -> Result<Vec<Route>, StoreError>;

    /// Cheap liveness probe.
    async fn ping(&self) -> Result<(), StoreError>;
}
