//! Error handling for the payment relay
//!
//! One error type for every HTTP-facing failure. It maps each failure to an HTTP
//! status, a stable error code and a message that is safe to show the caller.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

use crate::database::error::LedgerError;
use crate::payments::error::PaymentError;

/// Machine-readable error codes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    // Domain errors (4xx)
    #[serde(rename = "ORDER_NOT_FOUND")]
    OrderNotFound,
    #[serde(rename = "INITIATION_FAILED")]
    InitiationFailed,
    #[serde(rename = "UNAUTHORIZED")]
    Unauthorized,

    // Infrastructure errors (5xx)
    #[serde(rename = "STORAGE_ERROR")]
    StorageError,
    #[serde(rename = "CONFIGURATION_ERROR")]
    ConfigurationError,

    // External errors
    #[serde(rename = "PAYMENT_PROVIDER_ERROR")]
    PaymentProviderError,
    #[serde(rename = "RATE_LIMIT_ERROR")]
    RateLimitError,
    #[serde(rename = "EXTERNAL_SERVICE_TIMEOUT")]
    ExternalServiceTimeout,

    // Generic
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError,
}

/// Payment-flow business errors
#[derive(Debug, Clone)]
pub enum DomainError {
    /// No order stored under this transaction id
    OrderNotFound { tran_id: String },
    /// Gateway answered but refused to open a session
    InitiationRejected {
        reason: String,
        gateway_response: JsonValue,
    },
}

#[derive(Debug, Clone)]
pub enum AuthError {
    /// `x-internal-token` missing or different from the configured secret
    InvalidInternalToken,
}

#[derive(Debug, Clone)]
pub enum InfrastructureError {
    Storage { message: String },
    Configuration { message: String },
}

/// Upstream service errors
#[derive(Debug, Clone)]
pub enum ExternalError {
    PaymentProvider {
        provider: String,
        message: String,
        is_retryable: bool,
    },
    RateLimit {
        service: String,
        retry_after: Option<u64>,
    },
    Timeout { service: String, timeout_secs: u64 },
}

/// Input validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    MissingField { field: String },
    /// At least one of several required fields is absent
    MissingOneOf { fields: Vec<String> },
    InvalidAmount { amount: String, reason: String },
    InvalidField { field: String, reason: String },
    /// Body could not be decoded at all
    MalformedBody { reason: String },
}

/// Unified application error type
#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub request_id: Option<String>,
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AppErrorKind {
    Domain(DomainError),
    Auth(AuthError),
    Infrastructure(InfrastructureError),
    External(ExternalError),
    Validation(ValidationError),
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            request_id: None,
            context: None,
        }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Validation(ValidationError::MissingField {
            field: field.into(),
        }))
    }

    pub fn missing_one_of(fields: &[&str]) -> Self {
        Self::new(AppErrorKind::Validation(ValidationError::MissingOneOf {
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }))
    }

    pub fn order_not_found(tran_id: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Domain(DomainError::OrderNotFound {
            tran_id: tran_id.into(),
        }))
    }

    pub fn unauthorized() -> Self {
        Self::new(AppErrorKind::Auth(AuthError::InvalidInternalToken))
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Map error to HTTP status code
    pub fn status_code(&self) -> u16 {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::OrderNotFound { .. } => 404,
                DomainError::InitiationRejected { .. } => 400,
            },
            AppErrorKind::Auth(_) => 401,
            AppErrorKind::Infrastructure(_) => 500,
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentProvider { .. } => 500,
                ExternalError::RateLimit { .. } => 429,
                ExternalError::Timeout { .. } => 500,
            },
            AppErrorKind::Validation(_) => 400,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> ErrorCode {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::OrderNotFound { .. } => ErrorCode::OrderNotFound,
                DomainError::InitiationRejected { .. } => ErrorCode::InitiationFailed,
            },
            AppErrorKind::Auth(_) => ErrorCode::Unauthorized,
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Storage { .. } => ErrorCode::StorageError,
                InfrastructureError::Configuration { .. } => ErrorCode::ConfigurationError,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentProvider { .. } => ErrorCode::PaymentProviderError,
                ExternalError::RateLimit { .. } => ErrorCode::RateLimitError,
                ExternalError::Timeout { .. } => ErrorCode::ExternalServiceTimeout,
            },
            AppErrorKind::Validation(_) => ErrorCode::ValidationError,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::OrderNotFound { .. } => "Order not found".to_string(),
                DomainError::InitiationRejected { reason, .. } => reason.clone(),
            },
            AppErrorKind::Auth(AuthError::InvalidInternalToken) => {
                "Unauthorized (internal token)".to_string()
            }
            AppErrorKind::Infrastructure(_) => "Internal error".to_string(),
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentProvider { message, .. } => message.clone(),
                ExternalError::RateLimit {
                    service,
                    retry_after,
                } => {
                    if let Some(secs) = retry_after {
                        format!(
                            "Rate limit exceeded for {}. Please try again in {} seconds",
                            service, secs
                        )
                    } else {
                        format!("Rate limit exceeded for {}. Please try again later", service)
                    }
                }
                ExternalError::Timeout {
                    service,
                    timeout_secs,
                } => format!(
                    "{} request timed out after {} seconds",
                    service, timeout_secs
                ),
            },
            AppErrorKind::Validation(err) => match err {
                ValidationError::MissingField { field } => format!("{} is required", field),
                ValidationError::MissingOneOf { fields } => {
                    format!("Missing {}", fields.join(" or "))
                }
                ValidationError::InvalidAmount { amount, reason } => {
                    format!("Invalid amount '{}': {}", amount, reason)
                }
                ValidationError::InvalidField { field, reason } => {
                    format!("Invalid {}: {}", field, reason)
                }
                ValidationError::MalformedBody { reason } => {
                    format!("Malformed request body: {}", reason)
                }
            },
        }
    }

    /// Raw gateway payload worth echoing back to the caller, if any.
    pub fn gateway_response(&self) -> Option<&JsonValue> {
        match &self.kind {
            AppErrorKind::Domain(DomainError::InitiationRejected {
                gateway_response, ..
            }) => Some(gateway_response),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::Domain(_) | AppErrorKind::Auth(_) | AppErrorKind::Validation(_) => false,
            AppErrorKind::Infrastructure(err) => {
                matches!(err, InfrastructureError::Storage { .. })
            }
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentProvider { is_retryable, .. } => *is_retryable,
                ExternalError::RateLimit { .. } => true,
                ExternalError::Timeout { .. } => true,
            },
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(context) => write!(f, "{}: {}", context, self.user_message()),
            None => write!(f, "{}", self.user_message()),
        }
    }
}

impl std::error::Error for AppError {}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        let kind = match err {
            PaymentError::ValidationError { message, field } => {
                AppErrorKind::Validation(ValidationError::InvalidField {
                    field: field.unwrap_or_else(|| "request".to_string()),
                    reason: message,
                })
            }
            PaymentError::InitiationRejected {
                message,
                gateway_response,
            } => AppErrorKind::Domain(DomainError::InitiationRejected {
                reason: message,
                gateway_response,
            }),
            PaymentError::RateLimitError {
                retry_after_seconds,
                ..
            } => AppErrorKind::External(ExternalError::RateLimit {
                service: "sslcommerz".to_string(),
                retry_after: retry_after_seconds,
            }),
            PaymentError::TimeoutError { timeout_secs } => {
                AppErrorKind::External(ExternalError::Timeout {
                    service: "sslcommerz".to_string(),
                    timeout_secs,
                })
            }
            PaymentError::NetworkError { message } => {
                AppErrorKind::External(ExternalError::PaymentProvider {
                    provider: "sslcommerz".to_string(),
                    message,
                    is_retryable: true,
                })
            }
            PaymentError::ProviderError {
                provider,
                message,
                retryable,
                ..
            } => AppErrorKind::External(ExternalError::PaymentProvider {
                provider,
                message,
                is_retryable: retryable,
            }),
        };

        AppError::new(kind)
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        AppError::new(AppErrorKind::Infrastructure(InfrastructureError::Storage {
            message: err.to_string(),
        }))
    }
}

/// Result type for operations that can fail with AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_amount_error() {
        let error = AppError::missing_field("amount");

        assert_eq!(error.status_code(), 400);
        assert_eq!(error.error_code(), ErrorCode::ValidationError);
        assert_eq!(error.user_message(), "amount is required");
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_missing_callback_ids_error() {
        let error = AppError::missing_one_of(&["tran_id", "val_id"]);

        assert_eq!(error.status_code(), 400);
        assert_eq!(error.user_message(), "Missing tran_id or val_id");
    }

    #[test]
    fn test_order_not_found_error() {
        let error = AppError::order_not_found("ORD_1");

        assert_eq!(error.status_code(), 404);
        assert_eq!(error.error_code(), ErrorCode::OrderNotFound);
        assert_eq!(error.user_message(), "Order not found");
    }

    #[test]
    fn test_rejected_initiation_keeps_gateway_payload() {
        let payload = serde_json::json!({"status": "FAILED", "failedreason": "Store inactive"});
        let error: AppError = PaymentError::InitiationRejected {
            message: "Store inactive".to_string(),
            gateway_response: payload.clone(),
        }
        .into();

        assert_eq!(error.status_code(), 400);
        assert_eq!(error.user_message(), "Store inactive");
        assert_eq!(error.gateway_response(), Some(&payload));
    }

    #[test]
    fn test_network_failure_is_server_error_with_provider_message() {
        let error: AppError = PaymentError::NetworkError {
            message: "connection refused".to_string(),
        }
        .into();

        assert_eq!(error.status_code(), 500);
        assert_eq!(error.error_code(), ErrorCode::PaymentProviderError);
        assert_eq!(error.user_message(), "connection refused");
        assert!(error.is_retryable());
    }

    #[test]
    fn test_storage_error_hides_details() {
        let error: AppError = LedgerError::Unavailable("poisoned".to_string()).into();

        assert_eq!(error.status_code(), 500);
        assert_eq!(error.user_message(), "Internal error");
    }

    #[test]
    fn test_context_prefixes_display() {
        let error = AppError::unauthorized().with_context("initiate");
        assert_eq!(error.to_string(), "initiate: Unauthorized (internal token)");
        assert_eq!(error.status_code(), 401);
    }
}
