//! Health reporting subsystem.
//!
//! # Data Flow
//! ```text
//! GET /health
//!     → report.rs (run every check, keep the worst status)
//!         → checks.rs BreakerCheck → reporter.rs (breaker state → status)
//!         → checks.rs StoreCheck   → RouteStore::ping (bounded)
//! ```
//!
//! # Design Decisions
//! - Queries are read-only; asking for health never moves the breaker
//! - Healthy < Degraded < Unhealthy, so aggregation is a max
//! - The store probe bypasses the pipeline so it cannot trip the breaker

pub mod checks;
pub mod report;
pub mod reporter;

pub use checks::{BreakerCheck, CheckOutcome, HealthCheck, StoreCheck};
pub use report::{CheckEntry, HealthReport};
pub use reporter::{HealthReporter, HealthSnapshot, HealthStatus};
