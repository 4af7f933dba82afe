//! Shared-secret guard for internal callers (`x-internal-token`)

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::config::SecurityConfig;
use crate::error::AppError;
use crate::middleware::error::get_request_id_from_headers;
use crate::payments::utils::secure_eq;

pub const INTERNAL_TOKEN_HEADER: &str = "x-internal-token";

/// Rejects the request with 401 unless the header matches the configured token.
/// No configured token means the guard lets everything through.
pub async fn require_internal_token(
    State(security): State<SecurityConfig>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = security.internal_token.as_deref() else {
        return next.run(request).await;
    };

    let received = request
        .headers()
        .get(INTERNAL_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());

    match received {
        Some(token) if secure_eq(token.as_bytes(), expected.as_bytes()) => next.run(request).await,
        _ => {
            warn!(
                path = %request.uri().path(),
                header_present = received.is_some(),
                "internal token check failed"
            );
            let mut error = AppError::unauthorized();
            if let Some(request_id) = get_request_id_from_headers(request.headers()) {
                error = error.with_request_id(request_id);
            }
            error.into_response()
        }
    }
}
