//! Request tracing: request ids, per-request log lines and outbound call logging

use axum::{extract::Request, middleware::Next, response::Response};
use http::HeaderValue;
use std::time::{Duration, Instant};
use tower_http::request_id::{MakeRequestId, RequestId};
use tracing::{info, warn};
use uuid::Uuid;

/// Generates a UUID v4 `x-request-id` for requests that arrive without one.
#[derive(Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &http::Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

pub async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let response = next.run(request).await;

    let status = response.status();
    let latency_ms = started.elapsed().as_millis() as u64;
    if status.is_server_error() {
        warn!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status = status.as_u16(),
            latency_ms,
            "request failed"
        );
    } else {
        info!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status = status.as_u16(),
            latency_ms,
            "request completed"
        );
    }

    response
}

/// One log line per call to a third-party API.
pub fn log_external_call(service: &str, endpoint: &str, status: Option<u16>, elapsed: Duration) {
    match status {
        Some(code) if (200..300).contains(&code) => info!(
            service,
            endpoint,
            status = code,
            duration_ms = elapsed.as_millis() as u64,
            "external call completed"
        ),
        Some(code) => warn!(
            service,
            endpoint,
            status = code,
            duration_ms = elapsed.as_millis() as u64,
            "external call returned error status"
        ),
        None => warn!(
            service,
            endpoint,
            duration_ms = elapsed.as_millis() as u64,
            "external call failed without response"
        ),
    }
}
