use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_CURRENCY: &str = "VND";
const DEFAULT_PAYMENT_WINDOW_SECS: u64 = 900; // 15 minutes
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
const DEFAULT_MAX_POLL_FAILURES: u32 = 3;
const DEFAULT_SUCCESS_REDIRECT_DELAY_SECS: u64 = 3;
const DEFAULT_MAX_QUANTITY: u32 = 99;
const DEFAULT_CART_STORAGE_PATH: &str = "storefront-cart.json";
const CONFIG_DIR: &str = "config";

/// Bank-transfer payment session configuration
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PaymentConfig {
    /// Payment window before the session is cancelled (seconds)
    #[serde(default = "default_payment_window_secs")]
    pub window_secs: u64,

    /// Cadence of order confirmation polling (seconds)
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Consecutive poll failures tolerated before the session errors out
    #[serde(default = "default_max_poll_failures")]
    pub max_consecutive_poll_failures: u32,

    /// Cosmetic delay before navigating away after a confirmed payment (seconds)
    #[serde(default = "default_success_redirect_delay_secs")]
    pub success_redirect_delay_secs: u64,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            window_secs: DEFAULT_PAYMENT_WINDOW_SECS,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            max_consecutive_poll_failures: DEFAULT_MAX_POLL_FAILURES,
            success_redirect_delay_secs: DEFAULT_SUCCESS_REDIRECT_DELAY_SECS,
        }
    }
}

/// Cart configuration
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CartConfig {
    /// Upper bound on a single line item's quantity
    #[serde(default = "default_max_quantity")]
    #[validate(range(min = 1, max = 99))]
    pub max_quantity: u32,

    /// Path of the client-held local cart file
    #[serde(default = "default_cart_storage_path")]
    pub storage_path: String,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            max_quantity: DEFAULT_MAX_QUANTITY,
            storage_path: DEFAULT_CART_STORAGE_PATH.to_string(),
        }
    }
}

/// Base URLs of the external collaborators
#[derive(Clone, Debug, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ServicesConfig {
    /// Cart service base URL
    #[serde(default)]
    pub cart_base_url: String,

    /// Order service base URL
    #[serde(default)]
    pub order_base_url: String,
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Default currency for carts and orders
    #[serde(default = "default_currency")]
    pub currency: String,

    #[serde(default)]
    #[validate]
    pub payment: PaymentConfig,

    #[serde(default)]
    #[validate]
    pub cart: CartConfig,

    #[serde(default)]
    #[validate]
    pub services: ServicesConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            log_level: default_log_level(),
            log_json: false,
            currency: default_currency(),
            payment: PaymentConfig::default(),
            cart: CartConfig::default(),
            services: ServicesConfig::default(),
        }
    }
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}
fn default_payment_window_secs() -> u64 {
    DEFAULT_PAYMENT_WINDOW_SECS
}
fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}
fn default_max_poll_failures() -> u32 {
    DEFAULT_MAX_POLL_FAILURES
}
fn default_success_redirect_delay_secs() -> u64 {
    DEFAULT_SUCCESS_REDIRECT_DELAY_SECS
}
fn default_max_quantity() -> u32 {
    DEFAULT_MAX_QUANTITY
}
fn default_cart_storage_path() -> String {
    DEFAULT_CART_STORAGE_PATH.to_string()
}

/// Loads configuration from `config/default.toml` (optional) layered under
/// `STOREFRONT_*` environment variables, then validates the result.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let config: AppConfig = Config::builder()
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(Environment::with_prefix("STOREFRONT").separator("__"))
        .build()?
        .try_deserialize()?;

    config
        .validate()
        .map_err(|e| ConfigError::Message(e.to_string()))?;

    if config.payment.poll_interval_secs == 0
        || config.payment.poll_interval_secs >= config.payment.window_secs
    {
        return Err(ConfigError::Message(
            "payment.poll_interval_secs must be non-zero and shorter than payment.window_secs"
                .to_string(),
        ));
    }

    Ok(config)
}
