//! Request identification.
//!
//! # Responsibilities
//! - Name the request ID header shared by the layers and handlers
//! - Read the ID back off a request for spans and logs
//!
//! # Design Decisions
//! - IDs are generated by `tower-http` (UUID v4) as early as possible
//! - A client-supplied ID is kept, not replaced

use axum::http::{HeaderName, Request};

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Access to the request ID assigned by the request-id layer.
pub trait RequestIdExt {
    /// The request ID, or `"unknown"` if none was assigned.
    fn request_id(&self) -> &str;
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> &str {
        self.headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
    }
}
