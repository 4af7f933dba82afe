use crate::middleware::logging::log_external_call;
use crate::payments::error::{PaymentError, PaymentResult};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};

/// Thin reqwest wrapper shared by gateway providers. Single attempt per call.
#[derive(Clone)]
pub struct PaymentHttpClient {
    client: Client,
    timeout: Duration,
    provider: &'static str,
}

impl PaymentHttpClient {
    pub fn new(provider: &'static str, timeout: Duration) -> PaymentResult<Self> {
        let client =
            Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| PaymentError::NetworkError {
                    message: format!("failed to initialize HTTP client: {}", e),
                })?;

        Ok(Self {
            client,
            timeout,
            provider,
        })
    }

    /// POST `application/x-www-form-urlencoded` and decode a JSON answer.
    pub async fn post_form<T: DeserializeOwned>(
        &self,
        url: &str,
        fields: &[(&str, String)],
    ) -> PaymentResult<T> {
        let request = self.client.post(url).form(fields);
        self.send(url, request).await
    }

    /// GET with query parameters and decode a JSON answer.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> PaymentResult<T> {
        let request = self.client.get(url).query(query);
        self.send(url, request).await
    }

    // `endpoint` is logged; never pass it a URL carrying credentials.
    async fn send<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: RequestBuilder,
    ) -> PaymentResult<T> {
        let started = Instant::now();
        let response = request.timeout(self.timeout).send().await.map_err(|e| {
            log_external_call(self.provider, endpoint, None, started.elapsed());
            if e.is_timeout() {
                PaymentError::TimeoutError {
                    timeout_secs: self.timeout.as_secs(),
                }
            } else {
                PaymentError::NetworkError {
                    message: format!("provider request failed: {}", e),
                }
            }
        })?;

        let status = response.status();
        log_external_call(
            self.provider,
            endpoint,
            Some(status.as_u16()),
            started.elapsed(),
        );
        let text = response
            .text()
            .await
            .map_err(|e| PaymentError::NetworkError {
                message: format!("failed to read provider response: {}", e),
            })?;

        if status.is_success() {
            return serde_json::from_str::<T>(&text).map_err(|e| PaymentError::ProviderError {
                provider: self.provider.to_string(),
                message: format!("invalid provider JSON response: {}", e),
                provider_code: None,
                retryable: false,
            });
        }

        if status.as_u16() == 429 {
            return Err(PaymentError::RateLimitError {
                message: "provider rate limit exceeded".to_string(),
                retry_after_seconds: None,
            });
        }

        Err(PaymentError::ProviderError {
            provider: self.provider.to_string(),
            message: format!("HTTP {}: {}", status, text),
            provider_code: Some(status.as_u16().to_string()),
            retryable: status.is_server_error(),
        })
    }
}

/// Constant-time comparison for shared secrets.
pub fn secure_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0_u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
