//! Error response formatting
//!
//! Every failure on the payment routes leaves as the same JSON shape:
//! `{success: false, error, message, ...}`.

use crate::error::{AppError, ErrorCode};
use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Standardized error response structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always `false`; lets callers branch on one field for every endpoint
    pub success: bool,

    /// Machine-readable error code
    pub error: ErrorCode,

    /// Human-readable error message
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    /// ISO 8601 timestamp of the error
    pub timestamp: String,

    /// Raw gateway response when the gateway refused the request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl ErrorResponse {
    pub fn from_app_error(error: &AppError) -> Self {
        Self {
            success: false,
            error: error.error_code(),
            message: error.user_message(),
            request_id: error.request_id.clone(),
            timestamp: Utc::now().to_rfc3339(),
            gateway: error.gateway_response().cloned(),
            retryable: Some(error.is_retryable()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status_code.is_server_error() {
            tracing::error!(
                error = ?self,
                request_id = ?self.request_id,
                status = %status_code.as_u16(),
                "Server error occurred"
            );
        } else {
            tracing::warn!(
                error = %self,
                request_id = ?self.request_id,
                status = %status_code.as_u16(),
                "Client error occurred"
            );
        }

        let error_response = ErrorResponse::from_app_error(&self);
        (status_code, Json(error_response)).into_response()
    }
}

/// Helper to extract request ID from request headers
pub fn get_request_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppErrorKind, DomainError};

    #[test]
    fn test_error_response_from_app_error() {
        let app_error = AppError::order_not_found("ORD_1").with_request_id("req_123");

        let error_response = ErrorResponse::from_app_error(&app_error);

        assert!(!error_response.success);
        assert_eq!(error_response.error, ErrorCode::OrderNotFound);
        assert_eq!(error_response.request_id, Some("req_123".to_string()));
        assert!(error_response.gateway.is_none());
    }

    #[test]
    fn test_rejected_initiation_body_carries_gateway() {
        let app_error = AppError::new(AppErrorKind::Domain(DomainError::InitiationRejected {
            reason: "Invalid store".to_string(),
            gateway_response: serde_json::json!({"status": "FAILED"}),
        }));

        let body = serde_json::to_value(ErrorResponse::from_app_error(&app_error)).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "INITIATION_FAILED");
        assert_eq!(body["message"], "Invalid store");
        assert_eq!(body["gateway"]["status"], "FAILED");
    }

    #[test]
    fn test_app_error_into_response() {
        let response = AppError::missing_field("amount").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = AppError::unauthorized().into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_request_id_header_lookup() {
        let mut headers = HeaderMap::new();
        assert_eq!(get_request_id_from_headers(&headers), None);

        headers.insert("x-request-id", "abc".parse().unwrap());
        assert_eq!(get_request_id_from_headers(&headers), Some("abc".to_string()));
    }
}
