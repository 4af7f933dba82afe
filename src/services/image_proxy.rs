//! Image proxy
//!
//! Turns one prompt into `numImages` data-URIs by fetching from the image
//! provider with consecutive seeds. Fetches run as a lazy stream: output order
//! follows seed order, a failed image becomes a placeholder, and an auth or
//! rate-limit answer drops the stream so nothing further is requested.

use crate::config::ImageProviderConfig;
use crate::middleware::logging::log_external_call;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::stream::{self, StreamExt};
use reqwest::{header::CONTENT_TYPE, Client, Url};
use serde::Deserialize;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{info, warn};

pub const PLACEHOLDER_IMAGE: &str = "/error-placeholder.png";
pub const DEFAULT_SEED: i64 = 42;

const SERVICE: &str = "pollinations";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ImageProxyError {
    #[error("Prompt is required")]
    MissingPrompt,

    #[error("Invalid {name}: {value}")]
    InvalidParameter { name: &'static str, value: String },

    #[error("Authentication failed or invalid API key.")]
    Authentication { status: u16 },

    #[error("Rate limit exceeded for Pollinations.AI. Please try again later.")]
    RateLimited,

    #[error("No images could be generated.")]
    NoImages,

    #[error("Image provider misconfigured: {0}")]
    Setup(String),
}

impl ImageProxyError {
    pub fn status_code(&self) -> u16 {
        match self {
            ImageProxyError::MissingPrompt | ImageProxyError::InvalidParameter { .. } => 400,
            ImageProxyError::Authentication { status } => *status,
            ImageProxyError::RateLimited => 429,
            ImageProxyError::NoImages | ImageProxyError::Setup(_) => 500,
        }
    }
}

/// Raw query string of `GET /api/images`.
#[derive(Debug, Default, Deserialize)]
pub struct ImageQuery {
    pub prompt: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
    pub seed: Option<String>,
    #[serde(rename = "numImages")]
    pub num_images: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub prompt: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub seed: i64,
    pub count: u32,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_number<T: std::str::FromStr>(
    name: &'static str,
    value: &Option<String>,
) -> Result<Option<T>, ImageProxyError> {
    present(value)
        .map(|raw| {
            raw.parse::<T>().map_err(|_| ImageProxyError::InvalidParameter {
                name,
                value: raw.to_string(),
            })
        })
        .transpose()
}

impl ImageRequest {
    /// Blank optional values count as absent. `numImages` must land in `1..=max_count`.
    pub fn from_query(query: &ImageQuery, max_count: u32) -> Result<Self, ImageProxyError> {
        let prompt = present(&query.prompt)
            .ok_or(ImageProxyError::MissingPrompt)?
            .to_string();

        let count = parse_number::<u32>("numImages", &query.num_images)?.unwrap_or(1);
        if count == 0 || count > max_count {
            return Err(ImageProxyError::InvalidParameter {
                name: "numImages",
                value: count.to_string(),
            });
        }

        let request = Self {
            prompt,
            width: parse_number("width", &query.width)?,
            height: parse_number("height", &query.height)?,
            seed: parse_number("seed", &query.seed)?.unwrap_or(DEFAULT_SEED),
            count,
        };
        request.last_seed()?;
        Ok(request)
    }

    /// Seed of the final image; the batch uses `seed..=last_seed`.
    pub fn last_seed(&self) -> Result<i64, ImageProxyError> {
        self.seed
            .checked_add(i64::from(self.count.saturating_sub(1)))
            .ok_or_else(|| ImageProxyError::InvalidParameter {
                name: "seed",
                value: self.seed.to_string(),
            })
    }
}

/// Why one fetch did not produce an image.
enum FetchFailure {
    /// Stops the whole batch
    Abort(ImageProxyError),
    /// Replaced by the placeholder
    Skip(String),
}

pub struct ImageProxyService {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
    timeout: Duration,
    pacing: Duration,
    max_concurrency: usize,
    max_count: u32,
}

impl ImageProxyService {
    pub fn new(config: &ImageProviderConfig) -> Result<Self, ImageProxyError> {
        let base_url = Url::parse(config.base_url.trim_end_matches('/'))
            .map_err(|e| ImageProxyError::Setup(format!("invalid base url: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ImageProxyError::Setup(format!(
                "base url cannot carry a path: {}",
                base_url
            )));
        }

        let client = Client::builder()
            .build()
            .map_err(|e| ImageProxyError::Setup(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            timeout: Duration::from_secs(config.timeout_secs),
            pacing: Duration::from_millis(config.pacing_ms),
            max_concurrency: config.max_concurrency.max(1),
            max_count: config.max_count,
        })
    }

    pub fn max_count(&self) -> u32 {
        self.max_count
    }

    /// `{base}/prompt/{prompt}?nologo=true[&width][&height]&seed`
    pub fn image_url(&self, request: &ImageRequest, seed: i64) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("prompt").push(&request.prompt);
        }
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("nologo", "true");
            if let Some(width) = request.width {
                query.append_pair("width", &width.to_string());
            }
            if let Some(height) = request.height {
                query.append_pair("height", &height.to_string());
            }
            query.append_pair("seed", &seed.to_string());
        }
        url
    }

    pub async fn generate(&self, request: &ImageRequest) -> Result<Vec<String>, ImageProxyError> {
        info!(
            count = request.count,
            seed = request.seed,
            width = ?request.width,
            height = ?request.height,
            api_key_set = self.api_key.is_some(),
            "image batch requested"
        );

        request.last_seed()?;

        // Shared across tasks so sends stay `pacing` apart at any concurrency.
        let launches = self.launch_gate();
        let launches = launches.as_ref();
        let mut fetches = std::pin::pin!(stream::iter(0..request.count)
            .map(|index| {
                let seed = request.seed + i64::from(index);
                async move {
                    if let Some(gate) = launches {
                        gate.lock().await.tick().await;
                    }
                    (index, self.fetch_one(request, seed).await)
                }
            })
            .buffered(self.max_concurrency));

        let mut images = Vec::with_capacity(request.count as usize);
        let mut produced = 0usize;
        while let Some((index, outcome)) = fetches.next().await {
            match outcome {
                Ok(data_uri) => {
                    produced += 1;
                    images.push(data_uri);
                }
                Err(FetchFailure::Skip(reason)) => {
                    warn!(
                        image = index + 1,
                        total = request.count,
                        reason = %reason,
                        "image fetch failed, using placeholder"
                    );
                    images.push(PLACEHOLDER_IMAGE.to_string());
                }
                Err(FetchFailure::Abort(err)) => {
                    warn!(image = index + 1, error = %err, "image batch aborted");
                    return Err(err);
                }
            }
        }

        if produced == 0 {
            return Err(ImageProxyError::NoImages);
        }
        Ok(images)
    }

    /// First tick is immediate, later ones wait out the rest of the pacing window.
    fn launch_gate(&self) -> Option<Mutex<Interval>> {
        if self.pacing.is_zero() {
            return None;
        }
        let mut ticker = tokio::time::interval(self.pacing);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Some(Mutex::new(ticker))
    }

    async fn fetch_one(&self, request: &ImageRequest, seed: i64) -> Result<String, FetchFailure> {
        let url = self.image_url(request, seed);
        let endpoint = format!("{}/prompt", self.base_url.as_str().trim_end_matches('/'));

        let mut call = self.client.get(url);
        if let Some(key) = &self.api_key {
            call = call.bearer_auth(key);
        }

        let started = Instant::now();
        let fetch = async {
            let response = call.send().await.map_err(|e| {
                log_external_call(SERVICE, &endpoint, None, started.elapsed());
                FetchFailure::Skip(format!("no response: {}", e))
            })?;

            let status = response.status();
            log_external_call(SERVICE, &endpoint, Some(status.as_u16()), started.elapsed());
            match status.as_u16() {
                401 | 403 => {
                    return Err(FetchFailure::Abort(ImageProxyError::Authentication {
                        status: status.as_u16(),
                    }))
                }
                429 => return Err(FetchFailure::Abort(ImageProxyError::RateLimited)),
                _ if !status.is_success() => {
                    return Err(FetchFailure::Skip(format!("HTTP {}", status)))
                }
                _ => {}
            }

            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            let body = response
                .bytes()
                .await
                .map_err(|e| FetchFailure::Skip(format!("body read failed: {}", e)))?;

            Ok::<_, FetchFailure>(to_data_uri(&content_type, &body))
        };

        match tokio::time::timeout(self.timeout, fetch).await {
            Ok(outcome) => outcome,
            Err(_) => Err(FetchFailure::Skip(format!(
                "timed out after {}s",
                self.timeout.as_secs()
            ))),
        }
    }
}

/// png and gif keep their type; everything else is labelled jpeg.
pub fn to_data_uri(content_type: &str, body: &[u8]) -> String {
    let mime = if content_type.contains("image/png") {
        "image/png"
    } else if content_type.contains("image/gif") {
        "image/gif"
    } else {
        "image/jpeg"
    };
    format!("data:{};base64,{}", mime, STANDARD.encode(body))
}
