//! Application configuration module
//! Handles environment variable loading, configuration validation, and application settings

use std::env;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub sslcommerz: SslCommerzConfig,
    pub redirects: RedirectConfig,
    pub security: SecurityConfig,
    pub images: ImageProviderConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log format options
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Plain,
}

pub const SSLC_SANDBOX_URL: &str = "https://sandbox.sslcommerz.com";
pub const SSLC_LIVE_URL: &str = "https://securepay.sslcommerz.com";

/// SSLCommerz gateway credentials and endpoint selection
#[derive(Debug, Clone)]
pub struct SslCommerzConfig {
    pub sandbox: bool,
    pub store_id: String,
    pub store_password: String,
    /// Overrides the sandbox/live host (local mocks).
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

/// Default browser redirect targets handed to the gateway
#[derive(Debug, Clone, Default)]
pub struct RedirectConfig {
    pub success_url: Option<String>,
    pub fail_url: Option<String>,
    pub cancel_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SecurityConfig {
    pub internal_token: Option<String>,
}

/// Image generation provider configuration
#[derive(Debug, Clone)]
pub struct ImageProviderConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
    pub pacing_ms: u64,
    pub max_concurrency: usize,
    pub max_count: u32,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenv::dotenv().ok();

        Ok(AppConfig {
            server: ServerConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
            sslcommerz: SslCommerzConfig::from_env()?,
            redirects: RedirectConfig::from_env(),
            security: SecurityConfig::from_env(),
            images: ImageProviderConfig::from_env()?,
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.logging.validate()?;
        self.sslcommerz.validate()?;
        self.images.validate()?;

        Ok(())
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(ServerConfig {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PORT".to_string()))?,
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue("PORT cannot be 0".to_string()));
        }

        if self.host.is_empty() {
            return Err(ConfigError::InvalidValue("HOST cannot be empty".to_string()));
        }

        Ok(())
    }
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "plain".to_string())
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Plain,
            },
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];
        if !valid_levels.contains(&self.level.to_uppercase().as_str()) {
            return Err(ConfigError::InvalidValue("LOG_LEVEL".to_string()));
        }

        Ok(())
    }
}

impl SslCommerzConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(SslCommerzConfig {
            sandbox: env::var("SSLC_SANDBOX")
                .map(|v| v.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            store_id: env::var("SSLC_STORE_ID")
                .map_err(|_| ConfigError::MissingVariable("SSLC_STORE_ID".to_string()))?,
            store_password: env::var("SSLC_STORE_PASSWORD")
                .map_err(|_| ConfigError::MissingVariable("SSLC_STORE_PASSWORD".to_string()))?,
            base_url: env::var("SSLC_BASE_URL").ok().filter(|v| !v.trim().is_empty()),
            timeout_secs: env::var("SSLC_TIMEOUT_SECS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SSLC_TIMEOUT_SECS".to_string()))?,
        })
    }

    /// Host all gateway endpoints hang off.
    pub fn base_url(&self) -> &str {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/'),
            None if self.sandbox => SSLC_SANDBOX_URL,
            None => SSLC_LIVE_URL,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store_id.trim().is_empty() {
            return Err(ConfigError::InvalidValue("SSLC_STORE_ID".to_string()));
        }

        if self.store_password.trim().is_empty() {
            return Err(ConfigError::InvalidValue("SSLC_STORE_PASSWORD".to_string()));
        }

        let base = self.base_url();
        if !base.starts_with("http://") && !base.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "SSLC_BASE_URL must be a valid URL".to_string(),
            ));
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue("SSLC_TIMEOUT_SECS".to_string()));
        }

        Ok(())
    }
}

impl RedirectConfig {
    pub fn from_env() -> Self {
        let non_empty = |key: &str| env::var(key).ok().filter(|v| !v.trim().is_empty());
        RedirectConfig {
            success_url: non_empty("SUCCESS_URL"),
            fail_url: non_empty("FAIL_URL"),
            cancel_url: non_empty("CANCEL_URL"),
        }
    }
}

impl SecurityConfig {
    pub fn from_env() -> Self {
        SecurityConfig {
            internal_token: env::var("INTERNAL_SHARED_TOKEN")
                .ok()
                .filter(|v| !v.is_empty()),
        }
    }
}

impl Default for ImageProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://image.pollinations.ai".to_string(),
            timeout_secs: 60,
            pacing_ms: 1000,
            max_concurrency: 1,
            max_count: 10,
        }
    }
}

impl ImageProviderConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(ImageProviderConfig {
            api_key: env::var("POLLINATIONS_API_KEY")
                .ok()
                .filter(|v| !v.is_empty()),
            base_url: env::var("POLLINATIONS_BASE_URL").unwrap_or(defaults.base_url),
            timeout_secs: env::var("IMAGE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("IMAGE_TIMEOUT_SECS".to_string()))?,
            pacing_ms: env::var("IMAGE_PACING_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("IMAGE_PACING_MS".to_string()))?,
            max_concurrency: env::var("IMAGE_MAX_CONCURRENCY")
                .unwrap_or_else(|_| "1".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("IMAGE_MAX_CONCURRENCY".to_string()))?,
            max_count: env::var("IMAGE_MAX_COUNT")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("IMAGE_MAX_COUNT".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "POLLINATIONS_BASE_URL must be a valid URL".to_string(),
            ));
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue("IMAGE_TIMEOUT_SECS".to_string()));
        }

        if self.max_concurrency == 0 {
            return Err(ConfigError::InvalidValue(
                "IMAGE_MAX_CONCURRENCY".to_string(),
            ));
        }

        if self.max_count == 0 {
            return Err(ConfigError::InvalidValue("IMAGE_MAX_COUNT".to_string()));
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid value for configuration: {0}")]
    InvalidValue(String),
}
