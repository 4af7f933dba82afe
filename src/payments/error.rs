use serde_json::Value as JsonValue;
use thiserror::Error;

pub type PaymentResult<T> = Result<T, PaymentError>;

#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    #[error("Validation error: {message}")]
    ValidationError {
        message: String,
        field: Option<String>,
    },

    /// The gateway answered 2xx but did not hand out a payment page.
    #[error("Initiation rejected: {message}")]
    InitiationRejected {
        message: String,
        gateway_response: JsonValue,
    },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Request timed out after {timeout_secs}s")]
    TimeoutError { timeout_secs: u64 },

    #[error("Rate limit exceeded: {message}")]
    RateLimitError {
        message: String,
        retry_after_seconds: Option<u64>,
    },

    #[error("Provider error: provider={provider}, message={message}")]
    ProviderError {
        provider: String,
        message: String,
        provider_code: Option<String>,
        retryable: bool,
    },
}

impl PaymentError {
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::ValidationError { .. } => false,
            PaymentError::InitiationRejected { .. } => false,
            PaymentError::NetworkError { .. } => true,
            PaymentError::TimeoutError { .. } => true,
            PaymentError::RateLimitError { .. } => true,
            PaymentError::ProviderError { retryable, .. } => *retryable,
        }
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            PaymentError::ValidationError { .. } => 400,
            PaymentError::InitiationRejected { .. } => 400,
            PaymentError::NetworkError { .. } => 500,
            PaymentError::TimeoutError { .. } => 500,
            PaymentError::RateLimitError { .. } => 429,
            PaymentError::ProviderError { .. } => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_http_status_mapping_is_correct() {
        assert_eq!(
            PaymentError::ValidationError {
                message: "bad".to_string(),
                field: None
            }
            .http_status_code(),
            400
        );
        assert_eq!(
            PaymentError::InitiationRejected {
                message: "Store Credential Error".to_string(),
                gateway_response: serde_json::json!({"status": "FAILED"}),
            }
            .http_status_code(),
            400
        );
        assert_eq!(
            PaymentError::NetworkError {
                message: "reset".to_string()
            }
            .http_status_code(),
            500
        );
    }

    #[test]
    fn retryable_flags_are_set() {
        assert!(PaymentError::TimeoutError { timeout_secs: 20 }.is_retryable());
        assert!(!PaymentError::InitiationRejected {
            message: "declined".to_string(),
            gateway_response: JsonValue::Null,
        }
        .is_retryable());
    }
}
