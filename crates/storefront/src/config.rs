//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `REDSEAM_API_URL` - Base URL of the commerce API (e.g., `https://api.example.com/api`)
//!
//! ## Optional
//! - `REDSEAM_REQUEST_TIMEOUT_SECS` - Timeout for catalog requests (default: 30)
//! - `REDSEAM_CART_TIMEOUT_SECS` - Timeout for cart requests (default: none)
//! - `REDSEAM_PRODUCTS_PER_PAGE` - Product listing page size (default: 10)
//! - `REDSEAM_DELIVERY_FEE` - Flat delivery fee added to non-empty carts (default: 5)
//! - `REDSEAM_PRODUCT_CACHE_TTL_SECS` - Product detail cache lifetime (default: 300)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::time::Duration;

use redseam_core::Price;
use thiserror::Error;
use url::Url;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PRODUCT_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_PRODUCTS_PER_PAGE: u32 = 10;
const DEFAULT_DELIVERY_FEE: i64 = 5;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Commerce API connection settings
    pub api: ApiConfig,
    /// Product listing page size
    pub products_per_page: u32,
    /// Flat delivery fee for non-empty carts
    pub delivery_fee: Price,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Commerce API connection settings.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// API base URL; endpoint paths are appended to it
    pub base_url: Url,
    /// Timeout for catalog and account requests
    pub request_timeout: Duration,
    /// Timeout for cart requests (`None` waits indefinitely)
    pub cart_timeout: Option<Duration>,
    /// Lifetime of cached product details
    pub product_cache_ttl: Duration,
}

impl ApiConfig {
    /// Settings for `base_url` with default timeouts and cache lifetime.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            cart_timeout: None,
            product_cache_ttl: Duration::from_secs(DEFAULT_PRODUCT_CACHE_TTL_SECS),
        }
    }

    fn from_env() -> Result<Self, ConfigError> {
        let base_url = parse_env("REDSEAM_API_URL", &get_required_env("REDSEAM_API_URL")?, |v| {
            Url::parse(v).map_err(|e| e.to_string())
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::InvalidEnvVar(
                "REDSEAM_API_URL".to_string(),
                "must be an absolute http(s) URL".to_string(),
            ));
        }

        let request_timeout = Duration::from_secs(get_env_u64(
            "REDSEAM_REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?);
        let cart_timeout = get_optional_env("REDSEAM_CART_TIMEOUT_SECS")
            .map(|v| parse_env("REDSEAM_CART_TIMEOUT_SECS", &v, parse_u64))
            .transpose()?
            .map(Duration::from_secs);
        let product_cache_ttl = Duration::from_secs(get_env_u64(
            "REDSEAM_PRODUCT_CACHE_TTL_SECS",
            DEFAULT_PRODUCT_CACHE_TTL_SECS,
        )?);

        Ok(Self {
            base_url,
            request_timeout,
            cart_timeout,
            product_cache_ttl,
        })
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api = ApiConfig::from_env()?;

        let products_per_page = get_optional_env("REDSEAM_PRODUCTS_PER_PAGE")
            .map(|v| {
                parse_env("REDSEAM_PRODUCTS_PER_PAGE", &v, |s| {
                    s.parse::<u32>()
                        .map_err(|e| e.to_string())
                        .and_then(|n| if n == 0 { Err("must be at least 1".to_string()) } else { Ok(n) })
                })
            })
            .transpose()?
            .unwrap_or(DEFAULT_PRODUCTS_PER_PAGE);

        let delivery_fee = get_optional_env("REDSEAM_DELIVERY_FEE")
            .map(|v| {
                parse_env("REDSEAM_DELIVERY_FEE", &v, |s| {
                    Price::parse_non_negative(s).map_err(|e| e.to_string())
                })
            })
            .transpose()?
            .unwrap_or_else(|| Price::from_units(DEFAULT_DELIVERY_FEE));

        Ok(Self {
            api,
            products_per_page,
            delivery_fee,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Configuration for `base_url` with every optional setting at its default.
    #[must_use]
    pub fn with_base_url(base_url: Url) -> Self {
        Self {
            api: ApiConfig::new(base_url),
            products_per_page: DEFAULT_PRODUCTS_PER_PAGE,
            delivery_fee: Price::from_units(DEFAULT_DELIVERY_FEE),
            sentry_dsn: None,
            sentry_environment: None,
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable; blank values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an integer environment variable with a default value.
fn get_env_u64(key: &str, default: u64) -> Result<u64, ConfigError> {
    get_optional_env(key).map_or(Ok(default), |v| parse_env(key, &v, parse_u64))
}

fn parse_u64(value: &str) -> Result<u64, String> {
    value.trim().parse::<u64>().map_err(|e| e.to_string())
}

/// Parse a raw variable value, tagging failures with the variable name.
fn parse_env<T>(
    key: &str,
    value: &str,
    parse: impl FnOnce(&str) -> Result<T, String>,
) -> Result<T, ConfigError> {
    parse(value).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e))
}
