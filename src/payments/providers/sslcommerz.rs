use crate::config::SslCommerzConfig;
use crate::logging::mask_identifier;
use crate::payments::error::PaymentResult;
use crate::payments::provider::PaymentGateway;
use crate::payments::types::{
    InitiationResponse, PaymentRequest, ValidationRequest, ValidationResponse,
};
use crate::payments::utils::PaymentHttpClient;
use async_trait::async_trait;
use tracing::info;

const INIT_PATH: &str = "/gwprocess/v4/api.php";
const VALIDATE_PATH: &str = "/validator/api/validationserverAPI.php";

pub struct SslCommerzProvider {
    config: SslCommerzConfig,
    http: PaymentHttpClient,
}

impl SslCommerzProvider {
    pub fn new(config: SslCommerzConfig) -> PaymentResult<Self> {
        let http = PaymentHttpClient::new("sslcommerz", config.timeout())?;
        Ok(Self { config, http })
    }

    pub fn init_endpoint(&self) -> String {
        format!("{}{}", self.config.base_url(), INIT_PATH)
    }

    pub fn validation_endpoint(&self) -> String {
        format!("{}{}", self.config.base_url(), VALIDATE_PATH)
    }

    /// Session form body. Customer and shipping fields always carry a value;
    /// redirect URLs are only sent when known.
    pub fn build_init_form(&self, request: &PaymentRequest) -> Vec<(&'static str, String)> {
        let customer = &request.customer;
        let mut fields = vec![
            ("store_id", self.config.store_id.clone()),
            ("store_passwd", self.config.store_password.clone()),
            ("total_amount", request.amount.amount.to_string()),
            ("currency", request.amount.currency.clone()),
            ("tran_id", request.transaction_reference.clone()),
            ("product_name", request.product.name.clone()),
            ("product_category", request.product.category.clone()),
            ("product_profile", request.product.profile.clone()),
            ("cus_name", customer.name_or_default()),
            ("cus_email", customer.email_or_default()),
            ("cus_add1", customer.address_or_default()),
            ("cus_city", customer.city_or_default()),
            ("cus_country", customer.country_or_default()),
            ("cus_phone", customer.phone_or_default()),
            ("ship_name", customer.name_or_default()),
            ("ship_add1", customer.address_or_default()),
            ("ship_city", customer.city_or_default()),
            ("ship_country", customer.country_or_default()),
        ];

        let redirects = [
            ("success_url", &request.redirects.success_url),
            ("fail_url", &request.redirects.fail_url),
            ("cancel_url", &request.redirects.cancel_url),
        ];
        for (key, value) in redirects {
            if let Some(url) = value {
                fields.push((key, url.clone()));
            }
        }

        fields
    }
}

#[async_trait]
impl PaymentGateway for SslCommerzProvider {
    async fn initiate_payment(&self, request: PaymentRequest) -> PaymentResult<InitiationResponse> {
        request.amount.validate_positive("amount")?;

        let form = self.build_init_form(&request);
        let response: InitiationResponse =
            self.http.post_form(&self.init_endpoint(), &form).await?;

        info!(
            tran_id = %request.transaction_reference,
            store = %mask_identifier(&self.config.store_id),
            gateway_status = response.status().unwrap_or("<none>"),
            "sslcommerz session requested"
        );
        Ok(response)
    }

    async fn validate_payment(
        &self,
        request: ValidationRequest,
    ) -> PaymentResult<ValidationResponse> {
        let query = [
            ("val_id", request.val_id.as_str()),
            ("store_id", self.config.store_id.as_str()),
            ("store_passwd", self.config.store_password.as_str()),
            ("format", "json"),
        ];
        let response: ValidationResponse = self
            .http
            .get_json(&self.validation_endpoint(), &query)
            .await?;

        info!(
            val_id = %request.val_id,
            validation_status = response.raw_status().unwrap_or("<none>"),
            "sslcommerz validation completed"
        );
        Ok(response)
    }

    fn name(&self) -> &'static str {
        "sslcommerz"
    }

    fn is_sandbox(&self) -> bool {
        self.config.sandbox
    }
}
