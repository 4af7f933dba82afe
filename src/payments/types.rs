use crate::payments::error::{PaymentError, PaymentResult};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::str::FromStr;

pub const DEFAULT_CURRENCY: &str = "BDT";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Money {
    pub amount: BigDecimal,
    pub currency: String,
}

impl Money {
    /// Accepts a JSON number or numeric string; the result must be strictly positive.
    pub fn from_json(raw: &JsonValue, currency: &str) -> PaymentResult<Self> {
        let text = match raw {
            JsonValue::Number(n) => n.to_string(),
            JsonValue::String(s) => s.trim().to_string(),
            other => {
                return Err(PaymentError::ValidationError {
                    message: format!("amount must be a number, got {}", other),
                    field: Some("amount".to_string()),
                })
            }
        };

        let amount = BigDecimal::from_str(&text).map_err(|_| PaymentError::ValidationError {
            message: format!("invalid decimal amount: {}", text),
            field: Some("amount".to_string()),
        })?;

        let money = Self {
            amount,
            currency: currency.trim().to_string(),
        };
        money.validate_positive("amount")?;
        Ok(money)
    }

    pub fn validate_positive(&self, field: &str) -> Result<(), PaymentError> {
        if self.amount <= BigDecimal::from(0) {
            return Err(PaymentError::ValidationError {
                message: "amount must be greater than zero".to_string(),
                field: Some(field.to_string()),
            });
        }
        if self.currency.is_empty() {
            return Err(PaymentError::ValidationError {
                message: "currency is required".to_string(),
                field: Some("currency".to_string()),
            });
        }
        Ok(())
    }
}

/// Customer contact as sent by the frontend; every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustomerDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

fn or_default(value: &Option<String>, fallback: &str) -> String {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

impl CustomerDetails {
    pub fn name_or_default(&self) -> String {
        or_default(&self.name, "Customer")
    }

    pub fn email_or_default(&self) -> String {
        or_default(&self.email, "customer@example.com")
    }

    pub fn phone_or_default(&self) -> String {
        or_default(&self.phone, "01700000000")
    }

    pub fn address_or_default(&self) -> String {
        or_default(&self.address, "Dhaka")
    }

    pub fn city_or_default(&self) -> String {
        or_default(&self.city, "Dhaka")
    }

    pub fn country_or_default(&self) -> String {
        or_default(&self.country, "Bangladesh")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductInfo {
    pub name: String,
    pub category: String,
    pub profile: String,
}

impl Default for ProductInfo {
    fn default() -> Self {
        Self {
            name: "Order".to_string(),
            category: "General".to_string(),
            profile: "general".to_string(),
        }
    }
}

/// Browser redirect targets the gateway sends the customer back to.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RedirectUrls {
    pub success_url: Option<String>,
    pub fail_url: Option<String>,
    pub cancel_url: Option<String>,
}

/// Everything the gateway needs to open a checkout session, minus store credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub transaction_reference: String,
    pub amount: Money,
    pub customer: CustomerDetails,
    pub product: ProductInfo,
    pub redirects: RedirectUrls,
}

/// Raw initiation answer. Only `status == "SUCCESS"` plus a `GatewayPageURL` means success.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct InitiationResponse(pub JsonValue);

impl InitiationResponse {
    pub fn status(&self) -> Option<&str> {
        self.0.get("status").and_then(|v| v.as_str())
    }

    pub fn gateway_page_url(&self) -> Option<&str> {
        self.0
            .get("GatewayPageURL")
            .and_then(|v| v.as_str())
            .filter(|v| !v.trim().is_empty())
    }

    pub fn failed_reason(&self) -> Option<&str> {
        self.0
            .get("failedreason")
            .and_then(|v| v.as_str())
            .filter(|v| !v.trim().is_empty())
    }

    /// The customer-facing payment page, or a rejection carrying the raw payload.
    pub fn checkout_url(&self) -> PaymentResult<String> {
        match (self.status(), self.gateway_page_url()) {
            (Some("SUCCESS"), Some(url)) => Ok(url.to_string()),
            _ => Err(PaymentError::InitiationRejected {
                message: self
                    .failed_reason()
                    .unwrap_or("SSLCommerz initiation failed")
                    .to_string(),
                gateway_response: self.0.clone(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationRequest {
    pub val_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationStatus {
    Valid,
    Validated,
    Failed,
    Other(String),
    Missing,
}

impl ValidationStatus {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::to_uppercase) {
            None => ValidationStatus::Missing,
            Some(s) => match s.as_str() {
                "VALID" => ValidationStatus::Valid,
                "VALIDATED" => ValidationStatus::Validated,
                "FAILED" => ValidationStatus::Failed,
                "" => ValidationStatus::Missing,
                _ => ValidationStatus::Other(s),
            },
        }
    }

    pub fn is_paid(&self) -> bool {
        matches!(self, ValidationStatus::Valid | ValidationStatus::Validated)
    }
}

/// Raw validation answer as returned by the validator API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ValidationResponse(pub JsonValue);

impl ValidationResponse {
    pub fn raw_status(&self) -> Option<&str> {
        self.0.get("status").and_then(|v| v.as_str())
    }

    pub fn status(&self) -> ValidationStatus {
        ValidationStatus::parse(self.raw_status())
    }

    pub fn is_paid(&self) -> bool {
        self.status().is_paid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn money_accepts_numbers_and_numeric_strings() {
        let money = Money::from_json(&json!(100), DEFAULT_CURRENCY).unwrap();
        assert_eq!(money.amount, BigDecimal::from(100));
        assert_eq!(money.currency, "BDT");

        let money = Money::from_json(&json!("250.50"), "USD").unwrap();
        assert_eq!(money.amount, BigDecimal::from_str("250.50").unwrap());
    }

    #[test]
    fn money_rejects_non_positive_and_garbage() {
        assert!(Money::from_json(&json!(0), DEFAULT_CURRENCY).is_err());
        assert!(Money::from_json(&json!(-5), DEFAULT_CURRENCY).is_err());
        assert!(Money::from_json(&json!("ten"), DEFAULT_CURRENCY).is_err());
        assert!(Money::from_json(&json!(true), DEFAULT_CURRENCY).is_err());
        assert!(Money::from_json(&json!(10), " ").is_err());
    }

    #[test]
    fn customer_defaults_fill_blank_fields() {
        let customer = CustomerDetails {
            name: Some("Rahim".to_string()),
            email: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(customer.name_or_default(), "Rahim");
        assert_eq!(customer.email_or_default(), "customer@example.com");
        assert_eq!(customer.phone_or_default(), "01700000000");
        assert_eq!(customer.country_or_default(), "Bangladesh");
    }

    #[test]
    fn checkout_url_requires_success_and_page_url() {
        let ok = InitiationResponse(json!({
            "status": "SUCCESS",
            "GatewayPageURL": "https://sandbox.sslcommerz.com/EasyCheckOut/abc"
        }));
        assert_eq!(
            ok.checkout_url().unwrap(),
            "https://sandbox.sslcommerz.com/EasyCheckOut/abc"
        );

        let no_url = InitiationResponse(json!({"status": "SUCCESS", "GatewayPageURL": ""}));
        assert!(matches!(
            no_url.checkout_url(),
            Err(PaymentError::InitiationRejected { ref message, .. }) if message == "SSLCommerz initiation failed"
        ));

        let failed = InitiationResponse(json!({"status": "FAILED", "failedreason": "Store Credential Error Or Store is De-active"}));
        match failed.checkout_url() {
            Err(PaymentError::InitiationRejected {
                message,
                gateway_response,
            }) => {
                assert_eq!(message, "Store Credential Error Or Store is De-active");
                assert_eq!(gateway_response["status"], "FAILED");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn validation_status_is_case_insensitive() {
        assert!(ValidationStatus::parse(Some("VALID")).is_paid());
        assert!(ValidationStatus::parse(Some("validated")).is_paid());
        assert!(!ValidationStatus::parse(Some(" VALID ")).is_paid());
        assert_eq!(
            ValidationStatus::parse(Some(" VALID ")),
            ValidationStatus::Other(" VALID ".to_string())
        );
        assert!(!ValidationStatus::parse(Some("FAILED")).is_paid());
        assert!(!ValidationStatus::parse(Some("INVALID_TRANSACTION")).is_paid());
        assert_eq!(ValidationStatus::parse(None), ValidationStatus::Missing);
    }

    #[test]
    fn validation_response_reads_status_field() {
        let response = ValidationResponse(json!({"status": "VALIDATED", "tran_id": "ORD_1"}));
        assert_eq!(response.raw_status(), Some("VALIDATED"));
        assert!(response.is_paid());

        let response = ValidationResponse(json!({"error": "no status"}));
        assert!(!response.is_paid());
    }
}
