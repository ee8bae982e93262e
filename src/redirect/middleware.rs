//! Stamps each redirect request with its arrival instant.
//!
//! The redirect handler reads this back to emit the
//! `x-waypost-timing-total-ms` response header, which includes routing,
//! enrichment, and storage time, not just handler time.

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use std::time::Instant;

/// Arrival instant of the request, inserted before any other work runs.
#[derive(Copy, Clone)]
pub struct RequestStart(pub Instant);

pub async fn record_request_start(mut request: Request<Body>, next: Next) -> Response {
    request
        .extensions_mut()
        .insert(RequestStart(Instant::now()));
    next.run(request).await
}
