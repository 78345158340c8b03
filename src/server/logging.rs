use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, Request, Response};
use log::debug;
use tracing::Span;

pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

pub fn correlation_header() -> HeaderName {
    HeaderName::from_static(CORRELATION_ID_HEADER)
}

fn correlation_id(headers: &HeaderMap) -> &str {
    headers
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
}

/// `TraceLayer` request callback
pub fn log_request(request: &Request<Body>, _span: &Span) {
    debug!(
        "[{}] {} {}",
        correlation_id(request.headers()),
        request.method(),
        request.uri()
    );
}

/// `TraceLayer` response callback, the correlation id is read back from the response
pub fn log_response(response: &Response<Body>, latency: Duration, _span: &Span) {
    debug!(
        "[{}] {} ({} ms)",
        correlation_id(response.headers()),
        response.status().as_u16(),
        latency.as_millis()
    );
}
