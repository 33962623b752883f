//! Dispatch server configuration

use std::path::PathBuf;

use chrono_tz::Tz;
use shared::LocationConfig;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Dispatch server configuration
///
/// | Variable | Default |
/// |----------|---------|
/// | HTTP_PORT | 8080 |
/// | ENVIRONMENT | development |
/// | DATA_DIR | ./data |
/// | SHOPIFY_SHOP_DOMAIN | (required) |
/// | SHOPIFY_ACCESS_TOKEN | (secret) |
/// | SHOPIFY_API_VERSION | 2024-10 |
/// | SQUARE_ACCESS_TOKEN | (secret) |
/// | SQUARE_BASE_URL | https://connect.squareup.com |
/// | DELIVERY_API_URL | https://api.delivery.example/v1/orders |
/// | DEFAULT_LOCATION_ID | (none) |
/// | DEFAULT_LOCATION_NAME | Main Kitchen |
/// | DEFAULT_POS_LOCATION_ID | (empty) |
/// | DEFAULT_DELIVERY_API_KEY | (none) |
/// | BUSINESS_TIMEZONE | America/New_York |
/// | PAYMENT_KEY_WINDOW_SECS | 600 |
/// | LOG_FORMAT | text (read by tracing init, `json` for JSON logs) |
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP port
    pub http_port: u16,
    /// Environment: development | staging | production
    pub environment: String,
    /// Directory holding the audit database
    pub data_dir: PathBuf,
    /// `my-shop.myshopify.com`
    pub shopify_shop_domain: String,
    pub shopify_access_token: String,
    pub shopify_api_version: String,
    pub square_access_token: String,
    pub square_base_url: String,
    /// Endpoint of the delivery service's order-create operation
    pub delivery_api_url: String,
    /// Fallback location used when the fulfillment assignment is unusable
    pub default_location: LocationConfig,
    /// Window in which repeated payment submissions share an idempotency key
    pub payment_key_window_secs: u64,
}

impl Config {
    /// Require a secret env var: must be set and non-empty in non-development environments.
    fn require_secret(name: &str, environment: &str) -> Result<String, BoxError> {
        let val = match std::env::var(name) {
            Ok(v) => v,
            Err(_) => {
                if environment != "development" {
                    return Err(format!("{name} must be set in {environment} environment").into());
                }
                format!("dev-{name}-not-for-production")
            }
        };
        if val.is_empty() && environment != "development" {
            return Err(format!("{name} must not be empty in {environment} environment").into());
        }
        Ok(val)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let tz_name =
            std::env::var("BUSINESS_TIMEZONE").unwrap_or_else(|_| "America/New_York".into());
        let time_zone: Tz = shared::util::parse_time_zone(&tz_name)
            .ok_or_else(|| format!("BUSINESS_TIMEZONE is not a valid IANA zone: {tz_name}"))?;

        let default_location = LocationConfig {
            location_id: std::env::var("DEFAULT_LOCATION_ID")
                .ok()
                .filter(|s| !s.is_empty()),
            pos_location_id: std::env::var("DEFAULT_POS_LOCATION_ID").unwrap_or_default(),
            delivery_api_key: std::env::var("DEFAULT_DELIVERY_API_KEY")
                .ok()
                .filter(|s| !s.is_empty()),
            name: std::env::var("DEFAULT_LOCATION_NAME")
                .unwrap_or_else(|_| "Main Kitchen".into()),
            time_zone,
        };
        if default_location.pos_location_id.is_empty() {
            tracing::warn!(
                "DEFAULT_POS_LOCATION_ID is not set; orders without a configured location will fail"
            );
        }

        Ok(Self {
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            environment: environment.clone(),
            data_dir: std::env::var("DATA_DIR")
                .unwrap_or_else(|_| "./data".into())
                .into(),
            shopify_shop_domain: std::env::var("SHOPIFY_SHOP_DOMAIN")
                .map_err(|_| "SHOPIFY_SHOP_DOMAIN must be set")?,
            shopify_access_token: Self::require_secret("SHOPIFY_ACCESS_TOKEN", &environment)?,
            shopify_api_version: std::env::var("SHOPIFY_API_VERSION")
                .unwrap_or_else(|_| "2024-10".into()),
            square_access_token: Self::require_secret("SQUARE_ACCESS_TOKEN", &environment)?,
            square_base_url: std::env::var("SQUARE_BASE_URL")
                .unwrap_or_else(|_| "https://connect.squareup.com".into()),
            delivery_api_url: std::env::var("DELIVERY_API_URL")
                .unwrap_or_else(|_| "https://api.delivery.example/v1/orders".into()),
            default_location,
            payment_key_window_secs: std::env::var("PAYMENT_KEY_WINDOW_SECS")
                .ok()
                .and_then(|p| p.parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(600),
        })
    }

    /// Path of the redb audit database file
    pub fn audit_db_path(&self) -> PathBuf {
        self.data_dir.join("audit.redb")
    }
}
