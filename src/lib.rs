//! Resilient flight routes service library.
//!
//! Guards a route store behind a timeout, retry and circuit breaker
//! pipeline and serves it over HTTP with a health endpoint.

pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod store;

pub use config::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::{Service, Shutdown};
pub use resilience::{ResilienceError, ResiliencePipeline};
