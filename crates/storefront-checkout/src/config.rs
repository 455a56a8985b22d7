//! # Checkout Configuration
//!
//! Endpoints, shipping policy and promo table for the checkout.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     STOREFRONT_API_URL=https://shop.example.com/api                    │
//! │     STOREFRONT_API_TOKEN=...        (never written to disk)            │
//! │     STOREFRONT_FREIGHT_URL=...                                         │
//! │     STOREFRONT_FREIGHT_TOKEN=...    (never written to disk)            │
//! │     STOREFRONT_ORIGIN_COUNTRY=CN                                       │
//! │     STOREFRONT_DESTINATION=FR                                          │
//! │     STOREFRONT_FREIGHT_TIMEOUT_SECS=10                                 │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/storefront-checkout/checkout.toml (Linux)                │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [api]
//! base_url = "https://shop.example.com/api"
//! request_timeout_secs = 15
//!
//! [freight]
//! endpoint = "https://freight.example.com/logistic/freightCalculate"
//! origin_country = "CN"
//! timeout_secs = 10
//!
//! [shipping]
//! free_threshold_cents = 5000
//! flat_fee_cents = 499
//! currency = "USD"
//!
//! [checkout]
//! default_destination = "FR"
//!
//! [[promo]]
//! code = "WELCOME10"
//! kind = "percentage"
//! value = 10
//! ```

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use storefront_core::discount::{PromoRule, PromoTable, DEFAULT_PROMO_CODE};
use storefront_core::shipping::FlatRatePolicy;
use storefront_core::{CountryCode, Destination, Money, DEFAULT_ORIGIN_COUNTRY};

use crate::error::{CheckoutError, CheckoutResult};

// =============================================================================
// Storefront API
// =============================================================================

/// Storefront REST API settings (`/cart`, `/wishlist`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Base URL; `/cart` and `/wishlist` are resolved against it.
    #[serde(default = "default_api_url")]
    pub base_url: String,

    /// Per-request timeout (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Bearer token of the signed-in user. Environment only.
    #[serde(skip)]
    pub token: Option<SecretString>,
}

fn default_api_url() -> String {
    "http://localhost:3000/api".to_string()
}

fn default_request_timeout() -> u64 {
    15
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            base_url: default_api_url(),
            request_timeout_secs: default_request_timeout(),
            token: None,
        }
    }
}

// =============================================================================
// Freight Provider
// =============================================================================

/// Carrier-rate provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreightSettings {
    /// Full URL of the freight calculation endpoint.
    #[serde(default = "default_freight_url")]
    pub endpoint: String,

    /// Country the supplier ships from.
    #[serde(default = "default_origin_country")]
    pub origin_country: String,

    /// Upper bound on one resolution (seconds).
    #[serde(default = "default_freight_timeout")]
    pub timeout_secs: u64,

    /// Provider access token. Environment only.
    #[serde(skip)]
    pub token: Option<SecretString>,
}

fn default_freight_url() -> String {
    "https://developers.cjdropshipping.com/api2.0/v1/logistic/freightCalculate".to_string()
}

fn default_origin_country() -> String {
    DEFAULT_ORIGIN_COUNTRY.to_string()
}

fn default_freight_timeout() -> u64 {
    10
}

impl Default for FreightSettings {
    fn default() -> Self {
        FreightSettings {
            endpoint: default_freight_url(),
            origin_country: default_origin_country(),
            timeout_secs: default_freight_timeout(),
            token: None,
        }
    }
}

// =============================================================================
// Flat-Rate Shipping
// =============================================================================

/// Flat-rate policy for carts with nothing drop-shipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingSettings {
    /// Subtotal (cents) at or above which shipping is free.
    #[serde(default = "default_free_threshold")]
    pub free_threshold_cents: i64,

    /// Fee (cents) below the threshold.
    #[serde(default = "default_flat_fee")]
    pub flat_fee_cents: i64,

    /// Currency assumed when the freight provider omits one.
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_free_threshold() -> i64 {
    5_000
}

fn default_flat_fee() -> i64 {
    499
}

fn default_currency() -> String {
    "USD".to_string()
}

impl Default for ShippingSettings {
    fn default() -> Self {
        ShippingSettings {
            free_threshold_cents: default_free_threshold(),
            flat_fee_cents: default_flat_fee(),
            currency: default_currency(),
        }
    }
}

/// Session defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Destination selected when a session starts.
    #[serde(default)]
    pub default_destination: Destination,
}

// =============================================================================
// Promo Codes
// =============================================================================

/// Kind of a configured promo code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromoKind {
    /// `value` is a whole percentage of the subtotal.
    Percentage,
    /// `value` is an amount in cents.
    Fixed,
}

/// One `[[promo]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoEntry {
    pub code: String,
    pub kind: PromoKind,
    pub value: i64,
}

impl PromoEntry {
    fn rule(&self) -> CheckoutResult<PromoRule> {
        match self.kind {
            PromoKind::Percentage => {
                let bps = u32::try_from(self.value)
                    .ok()
                    .and_then(|pct| pct.checked_mul(100))
                    .ok_or_else(|| {
                        CheckoutError::InvalidConfig(format!(
                            "promo {}: percentage {} out of range",
                            self.code, self.value
                        ))
                    })?;
                Ok(PromoRule::Percentage { bps })
            }
            PromoKind::Fixed => Ok(PromoRule::Fixed {
                amount: Money::from_cents(self.value),
            }),
        }
    }
}

fn default_promos() -> Vec<PromoEntry> {
    vec![PromoEntry {
        code: DEFAULT_PROMO_CODE.to_string(),
        kind: PromoKind::Percentage,
        value: 10,
    }]
}

// =============================================================================
// Main Checkout Configuration
// =============================================================================

/// Complete checkout configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutConfig {
    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub freight: FreightSettings,

    #[serde(default)]
    pub shipping: ShippingSettings,

    #[serde(default)]
    pub checkout: SessionSettings,

    #[serde(default = "default_promos")]
    pub promo: Vec<PromoEntry>,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        CheckoutConfig {
            api: ApiSettings::default(),
            freight: FreightSettings::default(),
            shipping: ShippingSettings::default(),
            checkout: SessionSettings::default(),
            promo: default_promos(),
        }
    }
}

impl CheckoutConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (checkout.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> CheckoutResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading checkout config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load checkout config: {}. Using defaults.", e);
            let mut config = Self::default();
            config.apply_env_overrides();
            config
        })
    }

    /// Saves configuration to file. Tokens are never written.
    pub fn save(&self, config_path: Option<PathBuf>) -> CheckoutResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| CheckoutError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CheckoutError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| CheckoutError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Checkout config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> CheckoutResult<()> {
        for (name, url) in [("api.base_url", &self.api.base_url), ("freight.endpoint", &self.freight.endpoint)] {
            let parsed = url::Url::parse(url)
                .map_err(|e| CheckoutError::InvalidConfig(format!("{}: {}", name, e)))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(CheckoutError::InvalidConfig(format!(
                    "{} must start with http:// or https://, got: {}",
                    name, url
                )));
            }
        }

        self.origin()?;

        if self.freight.timeout_secs == 0 {
            return Err(CheckoutError::InvalidConfig(
                "freight.timeout_secs must be greater than 0".into(),
            ));
        }

        if self.shipping.free_threshold_cents < 0 || self.shipping.flat_fee_cents < 0 {
            return Err(CheckoutError::InvalidConfig(
                "shipping amounts must not be negative".into(),
            ));
        }

        self.promo_table()?;

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from any key lookup (the environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("STOREFRONT_API_URL") {
            debug!(url = %url, "Overriding API URL from environment");
            self.api.base_url = url;
        }

        if let Some(token) = lookup("STOREFRONT_API_TOKEN") {
            self.api.token = Some(SecretString::from(token));
        }

        if let Some(url) = lookup("STOREFRONT_FREIGHT_URL") {
            debug!(url = %url, "Overriding freight endpoint from environment");
            self.freight.endpoint = url;
        }

        if let Some(token) = lookup("STOREFRONT_FREIGHT_TOKEN") {
            self.freight.token = Some(SecretString::from(token));
        }

        if let Some(origin) = lookup("STOREFRONT_ORIGIN_COUNTRY") {
            self.freight.origin_country = origin;
        }

        if let Some(destination) = lookup("STOREFRONT_DESTINATION") {
            match destination.parse() {
                Ok(parsed) => self.checkout.default_destination = parsed,
                Err(_) => warn!(destination = %destination, "Unknown destination in environment"),
            }
        }

        if let Some(timeout) = lookup("STOREFRONT_FREIGHT_TIMEOUT_SECS") {
            match timeout.parse::<u64>() {
                Ok(secs) => self.freight.timeout_secs = secs,
                Err(_) => warn!(timeout = %timeout, "Invalid freight timeout in environment"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "storefront", "storefront-checkout")
            .map(|dirs| dirs.config_dir().join("checkout.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Supplier origin country.
    pub fn origin(&self) -> CheckoutResult<CountryCode> {
        self.freight
            .origin_country
            .parse()
            .map_err(|e| CheckoutError::InvalidConfig(format!("freight.origin_country: {}", e)))
    }

    pub fn flat_rate_policy(&self) -> FlatRatePolicy {
        FlatRatePolicy {
            free_threshold: Money::from_cents(self.shipping.free_threshold_cents),
            fee: Money::from_cents(self.shipping.flat_fee_cents),
        }
    }

    /// Builds the promo table from the `[[promo]]` entries.
    pub fn promo_table(&self) -> CheckoutResult<PromoTable> {
        let mut table = PromoTable::empty();
        for entry in &self.promo {
            let rule = entry.rule()?;
            table.insert(&entry.code, rule).map_err(|e| {
                CheckoutError::InvalidConfig(format!("promo {}: {}", entry.code, e))
            })?;
        }
        Ok(table)
    }

    pub fn freight_timeout(&self) -> Duration {
        Duration::from_secs(self.freight.timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.request_timeout_secs)
    }
}
