//! # Checkout Error Types
//!
//! Error types for cart-store, wishlist and shipping-resolution operations.
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Checkout Error Categories                          │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │   Local Rules   │  │    Transport    │  │      Fulfillment        │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Core(Invalid-  │  │  NetworkFailure │  │  NoShippableVariant     │ │
//! │  │   Quantity...)  │  │  Timeout        │  │  NoDeliveryOption       │ │
//! │  │  UnknownCarrier │  │  Backend{status}│  │  StaleResolution-       │ │
//! │  │                 │  │  Decode         │  │   Discarded (internal)  │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐                                                   │
//! │  │  Configuration  │   Nothing here is fatal: every error becomes an   │
//! │  │                 │   inline message and the cart stays editable.     │
//! │  │  InvalidConfig  │                                                   │
//! │  │  ConfigLoad/Save│                                                   │
//! │  └─────────────────┘                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use thiserror::Error;

use storefront_core::{CoreError, ValidationError};

/// Result type alias for checkout operations.
pub type CheckoutResult<T> = Result<T, CheckoutError>;

/// Checkout error type covering every failure of this crate.
#[derive(Debug, Error)]
pub enum CheckoutError {
    // =========================================================================
    // Local Rule Errors
    // =========================================================================
    /// A cart rule was violated before any request was sent.
    ///
    /// ## When This Occurs
    /// - `add` with quantity < 1 (`InvalidQuantity`)
    /// - quantity above 999 or more than 100 lines
    /// - a backend returned a cart that breaks an invariant
    #[error(transparent)]
    Core(#[from] CoreError),

    /// `select_option` named a carrier that is not among the current options.
    #[error("Carrier '{0}' is not among the available delivery options")]
    UnknownCarrier(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// Request never got an HTTP response.
    ///
    /// Retried by user action only, never automatically.
    #[error("Network failure: {0}")]
    NetworkFailure(String),

    /// Request did not complete in time.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// The server answered with a non-success status.
    #[error("Backend returned {status}: {message}")]
    Backend { status: u16, message: String },

    /// The response body did not match the expected shape.
    #[error("Unexpected response: {0}")]
    Decode(String),

    // =========================================================================
    // Fulfillment Errors
    // =========================================================================
    /// Drop-shipped lines exist but none carries a usable variant id.
    #[error("No shippable variant found for drop-shipped items")]
    NoShippableVariant,

    /// Freight provider returned no options, or an error payload.
    ///
    /// Checkout continues with the flat-rate estimate.
    #[error("{0}")]
    NoDeliveryOption(String),

    /// A superseded resolution finished after a newer one started.
    ///
    /// Internal only; never shown to the user.
    #[error("Discarded stale shipping resolution (generation {generation}, current {current})")]
    StaleResolutionDiscarded { generation: u64, current: u64 },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid checkout configuration.
    #[error("Invalid checkout configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<ValidationError> for CheckoutError {
    fn from(err: ValidationError) -> Self {
        CheckoutError::Core(CoreError::Validation(err))
    }
}

impl From<reqwest::Error> for CheckoutError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            CheckoutError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            CheckoutError::Backend {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            CheckoutError::NetworkFailure(err.to_string())
        }
    }
}

impl From<serde_json::Error> for CheckoutError {
    fn from(err: serde_json::Error) -> Self {
        CheckoutError::Decode(err.to_string())
    }
}

impl From<url::ParseError> for CheckoutError {
    fn from(err: url::ParseError) -> Self {
        CheckoutError::InvalidConfig(format!("invalid URL: {}", err))
    }
}

impl From<std::io::Error> for CheckoutError {
    fn from(err: std::io::Error) -> Self {
        CheckoutError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for CheckoutError {
    fn from(err: toml::de::Error) -> Self {
        CheckoutError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for CheckoutError {
    fn from(err: toml::ser::Error) -> Self {
        CheckoutError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl CheckoutError {
    /// Returns true if the user can reasonably retry the same action.
    ///
    /// Nothing is retried automatically; this only drives the "Try again"
    /// affordance next to the inline message.
    pub fn is_retryable(&self) -> bool {
        match self {
            CheckoutError::NetworkFailure(_)
            | CheckoutError::Timeout(_)
            | CheckoutError::NoDeliveryOption(_) => true,
            CheckoutError::Backend { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Returns false for errors that are only logged.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, CheckoutError::StaleResolutionDiscarded { .. })
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            CheckoutError::InvalidConfig(_)
                | CheckoutError::ConfigLoadFailed(_)
                | CheckoutError::ConfigSaveFailed(_)
        )
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            CheckoutError::Core(CoreError::InvalidQuantity { .. }) => ErrorCode::InvalidQuantity,
            CheckoutError::Core(CoreError::QuantityTooLarge { .. })
            | CheckoutError::Core(CoreError::CartTooLarge { .. }) => ErrorCode::LimitExceeded,
            CheckoutError::Core(CoreError::NoShippableVariant)
            | CheckoutError::NoShippableVariant => ErrorCode::NoShippableVariant,
            CheckoutError::Core(_) | CheckoutError::UnknownCarrier(_) => ErrorCode::ValidationError,
            CheckoutError::NetworkFailure(_) | CheckoutError::Timeout(_) => {
                ErrorCode::NetworkFailure
            }
            CheckoutError::Backend { .. } | CheckoutError::Decode(_) => ErrorCode::BackendError,
            CheckoutError::NoDeliveryOption(_) => ErrorCode::NoDeliveryOption,
            CheckoutError::StaleResolutionDiscarded { .. } => ErrorCode::StaleResolutionDiscarded,
            CheckoutError::InvalidConfig(_)
            | CheckoutError::ConfigLoadFailed(_)
            | CheckoutError::ConfigSaveFailed(_) => ErrorCode::ConfigError,
        }
    }

    /// Projection handed to UI layers for inline display.
    pub fn to_user_message(&self) -> UserMessage {
        UserMessage {
            code: self.code(),
            message: self.to_string(),
            retryable: self.is_retryable(),
        }
    }
}

// =============================================================================
// User-Facing Projection
// =============================================================================

/// Error codes for front-end handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidQuantity,
    LimitExceeded,
    ValidationError,
    NetworkFailure,
    BackendError,
    NoShippableVariant,
    NoDeliveryOption,
    StaleResolutionDiscarded,
    ConfigError,
}

/// Inline, non-blocking message for the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserMessage {
    pub code: ErrorCode,
    pub message: String,
    pub retryable: bool,
}

impl From<&CheckoutError> for UserMessage {
    fn from(err: &CheckoutError) -> Self {
        err.to_user_message()
    }
}
