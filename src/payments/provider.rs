use crate::payments::error::PaymentResult;
use crate::payments::types::{
    InitiationResponse, PaymentRequest, ValidationRequest, ValidationResponse,
};
use async_trait::async_trait;

/// The two gateway calls the payment flow depends on.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens a checkout session. Transport failures and non-2xx answers are errors;
    /// a 2xx answer is returned as-is for the caller to judge.
    async fn initiate_payment(&self, request: PaymentRequest) -> PaymentResult<InitiationResponse>;

    /// Asks the gateway whether a `val_id` reported by a callback is genuine.
    async fn validate_payment(&self, request: ValidationRequest)
        -> PaymentResult<ValidationResponse>;

    fn name(&self) -> &'static str;

    fn is_sandbox(&self) -> bool;
}
