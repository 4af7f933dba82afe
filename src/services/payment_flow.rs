//! Payment flow
//!
//! Drives one transaction through `initiated → paid | failed | cancelled`.
//! Status changes come through one of two doors:
//!
//! - [`PaymentFlowService::apply_trusted_update`]: the server-to-server IPN, after
//!   the gateway has confirmed the `val_id`. This is authoritative.
//! - [`PaymentFlowService::apply_advisory_update`]: browser redirects. These can be
//!   forged by the customer, so the stored status is flagged `provisional`.
//!
//! Neither door refuses to leave a terminal state; the last write wins.

use crate::config::RedirectConfig;
use crate::database::{OrderRecord, OrderRepository, OrderStatus, StatusSource};
use crate::error::{AppError, AppResult};
use crate::payments::provider::PaymentGateway;
use crate::payments::types::{
    CustomerDetails, Money, PaymentRequest, ProductInfo, RedirectUrls, ValidationRequest,
    ValidationResponse, DEFAULT_CURRENCY,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Body of `POST /initiate`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InitiatePaymentRequest {
    /// Number or numeric string; required
    #[serde(default)]
    pub amount: Option<JsonValue>,
    #[serde(default)]
    pub tran_id: Option<String>,
    #[serde(default)]
    pub customer: Option<CustomerDetails>,
    #[serde(default)]
    pub success_url: Option<String>,
    #[serde(default)]
    pub fail_url: Option<String>,
    #[serde(default)]
    pub cancel_url: Option<String>,
    #[serde(default)]
    pub meta: Option<JsonValue>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub product_category: Option<String>,
    #[serde(default)]
    pub product_profile: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiatedPayment {
    pub tran_id: String,
    pub payment_url: String,
}

/// Result of a validated IPN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpnOutcome {
    pub tran_id: String,
    pub paid: bool,
    pub status_from_ipn: Option<String>,
    pub validated_status: Option<String>,
}

/// Status change backed by a gateway-validated callback.
#[derive(Debug, Clone)]
pub struct TrustedUpdate {
    pub status: OrderStatus,
    pub validation: ValidationResponse,
    pub ipn_payload: JsonValue,
}

/// Status change reported by the customer's browser.
#[derive(Debug, Clone)]
pub struct AdvisoryUpdate {
    pub status: OrderStatus,
    /// Only the success redirect re-validates; fail/cancel keep whatever was stored.
    pub validation: Option<ValidationResponse>,
}

pub struct PaymentFlowService {
    gateway: Arc<dyn PaymentGateway>,
    orders: Arc<dyn OrderRepository>,
    redirects: RedirectConfig,
}

/// `ORD_<unix millis>_<8 hex chars>`; the random tail keeps ids distinct within a millisecond.
pub fn generate_tran_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("ORD_{}_{}", Utc::now().timestamp_millis(), &suffix[..8])
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn pick(preferred: Option<String>, fallback: &Option<String>) -> Option<String> {
    preferred
        .filter(|v| !v.trim().is_empty())
        .or_else(|| fallback.clone())
}

impl PaymentFlowService {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        orders: Arc<dyn OrderRepository>,
        redirects: RedirectConfig,
    ) -> Self {
        Self {
            gateway,
            orders,
            redirects,
        }
    }

    /// Opens a gateway session and records the order as `initiated`.
    /// Nothing is stored unless the gateway returns a payment page.
    pub async fn initiate(&self, request: InitiatePaymentRequest) -> AppResult<InitiatedPayment> {
        let raw_amount = match request.amount.as_ref() {
            None | Some(JsonValue::Null) => return Err(AppError::missing_field("amount")),
            Some(JsonValue::String(s)) if s.trim().is_empty() => {
                return Err(AppError::missing_field("amount"))
            }
            Some(raw) => raw,
        };

        let currency = non_empty(request.currency.as_deref())
            .unwrap_or(DEFAULT_CURRENCY)
            .to_string();
        let amount = Money::from_json(raw_amount, &currency)?;

        let tran_id = non_empty(request.tran_id.as_deref())
            .map(str::to_string)
            .unwrap_or_else(generate_tran_id);
        let customer = request.customer.unwrap_or_default();
        let defaults = ProductInfo::default();
        let product = ProductInfo {
            name: request.product_name.unwrap_or(defaults.name),
            category: request.product_category.unwrap_or(defaults.category),
            profile: request.product_profile.unwrap_or(defaults.profile),
        };
        let redirects = RedirectUrls {
            success_url: pick(request.success_url, &self.redirects.success_url),
            fail_url: pick(request.fail_url, &self.redirects.fail_url),
            cancel_url: pick(request.cancel_url, &self.redirects.cancel_url),
        };

        let response = self
            .gateway
            .initiate_payment(PaymentRequest {
                transaction_reference: tran_id.clone(),
                amount: amount.clone(),
                customer: customer.clone(),
                product,
                redirects,
            })
            .await
            .map_err(|e| {
                error!(tran_id = %tran_id, error = %e, "payment initiation call failed");
                AppError::from(e)
            })?;

        let payment_url = response.checkout_url().map_err(|e| {
            warn!(tran_id = %tran_id, error = %e, "gateway refused to open a session");
            AppError::from(e)
        })?;

        let record = OrderRecord::initiated(
            amount,
            customer,
            request.meta.unwrap_or_else(|| JsonValue::Object(Default::default())),
            response.0,
        );
        self.orders.put(&tran_id, record).await?;

        info!(tran_id = %tran_id, "payment initiated");
        Ok(InitiatedPayment {
            tran_id,
            payment_url,
        })
    }

    /// Server-to-server notification. The `val_id` is always re-checked with the
    /// gateway before the ledger is touched.
    pub async fn handle_ipn(&self, payload: HashMap<String, String>) -> AppResult<IpnOutcome> {
        let tran_id = non_empty(payload.get("tran_id").map(String::as_str)).map(str::to_string);
        let val_id = non_empty(payload.get("val_id").map(String::as_str)).map(str::to_string);
        let (tran_id, val_id) = match (tran_id, val_id) {
            (Some(t), Some(v)) => (t, v),
            _ => return Err(AppError::missing_one_of(&["tran_id", "val_id"])),
        };
        let status_from_ipn = payload.get("status").cloned();

        let validation = self.validate(&tran_id, &val_id).await?;
        let paid = validation.is_paid();
        let validated_status = validation.raw_status().map(str::to_string);

        let ipn_payload = serde_json::to_value(&payload)
            .unwrap_or_else(|_| JsonValue::Object(Default::default()));
        self.apply_trusted_update(
            &tran_id,
            TrustedUpdate {
                status: if paid {
                    OrderStatus::Paid
                } else {
                    OrderStatus::Failed
                },
                validation,
                ipn_payload,
            },
        )
        .await?;

        info!(
            tran_id = %tran_id,
            paid,
            status_from_ipn = status_from_ipn.as_deref().unwrap_or("<none>"),
            "ipn processed"
        );
        Ok(IpnOutcome {
            tran_id,
            paid,
            status_from_ipn,
            validated_status,
        })
    }

    /// Success redirect. Re-validates only when both ids are present; returns
    /// whether the gateway considered the payment paid.
    pub async fn confirm_success_redirect(
        &self,
        tran_id: Option<&str>,
        val_id: Option<&str>,
    ) -> AppResult<Option<bool>> {
        let (Some(tran_id), Some(val_id)) = (non_empty(tran_id), non_empty(val_id)) else {
            return Ok(None);
        };

        let validation = self.validate(tran_id, val_id).await?;
        let paid = validation.is_paid();
        self.apply_advisory_update(
            tran_id,
            AdvisoryUpdate {
                status: if paid {
                    OrderStatus::Paid
                } else {
                    OrderStatus::Failed
                },
                validation: Some(validation),
            },
        )
        .await?;
        Ok(Some(paid))
    }

    /// Fail / cancel redirects. No gateway call; a missing id is a no-op.
    pub async fn record_redirect_outcome(
        &self,
        tran_id: Option<&str>,
        status: OrderStatus,
    ) -> AppResult<()> {
        let Some(tran_id) = non_empty(tran_id) else {
            return Ok(());
        };
        self.apply_advisory_update(
            tran_id,
            AdvisoryUpdate {
                status,
                validation: None,
            },
        )
        .await
    }

    pub async fn apply_trusted_update(&self, tran_id: &str, update: TrustedUpdate) -> AppResult<()> {
        let mut record = self
            .orders
            .get(tran_id)
            .await?
            .unwrap_or_else(|| OrderRecord::unknown(update.status, StatusSource::Callback));

        if record.status.is_terminal() && record.status != update.status {
            warn!(
                tran_id = %tran_id,
                stored = %record.status,
                confirmed = %update.status,
                "callback overrides earlier terminal status"
            );
        }

        record.status = update.status;
        record.validated = Some(update.validation.0);
        record.ipn_payload = Some(update.ipn_payload);
        record.status_source = StatusSource::Callback;
        record.provisional = false;
        record.updated_at = Some(Utc::now());

        self.orders.put(tran_id, record).await?;
        Ok(())
    }

    pub async fn apply_advisory_update(
        &self,
        tran_id: &str,
        update: AdvisoryUpdate,
    ) -> AppResult<()> {
        let mut record = self
            .orders
            .get(tran_id)
            .await?
            .unwrap_or_else(|| OrderRecord::unknown(update.status, StatusSource::Redirect));

        if matches!(record.status_source, StatusSource::Callback) && record.status != update.status
        {
            warn!(
                tran_id = %tran_id,
                stored = %record.status,
                reported = %update.status,
                "redirect overrides callback-confirmed status"
            );
        }

        record.status = update.status;
        if let Some(validation) = update.validation {
            record.validated = Some(validation.0);
        }
        record.status_source = StatusSource::Redirect;
        record.provisional = true;
        record.updated_at = Some(Utc::now());

        self.orders.put(tran_id, record).await?;
        info!(tran_id = %tran_id, status = %update.status, "advisory status recorded");
        Ok(())
    }

    pub async fn get_order(&self, tran_id: &str) -> AppResult<OrderRecord> {
        self.orders
            .get(tran_id)
            .await?
            .ok_or_else(|| AppError::order_not_found(tran_id))
    }

    pub async fn list_orders(&self) -> AppResult<Vec<(String, OrderRecord)>> {
        Ok(self.orders.list().await?)
    }

    async fn validate(&self, tran_id: &str, val_id: &str) -> AppResult<ValidationResponse> {
        self.gateway
            .validate_payment(ValidationRequest {
                val_id: val_id.to_string(),
            })
            .await
            .map_err(|e| {
                error!(tran_id = %tran_id, val_id = %val_id, error = %e, "payment validation call failed");
                AppError::from(e)
            })
    }
}
