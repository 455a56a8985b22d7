//! # Error Types
//!
//! Domain-specific error types for storefront-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  storefront-core errors (this file)                                    │
//! │  ├── CoreError        - Cart / shipping rule violations                │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  storefront-checkout errors (separate crate)                           │
//! │  └── CheckoutError    - Network, provider, config failures             │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → CheckoutError → UserMessage → UI  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! None of these errors are fatal: every one of them is shown inline and the
//! cart stays viewable and editable.

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Cart and fulfillment rule violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Quantity below one.
    ///
    /// ## When This Occurs
    /// - `add` with quantity 0 or a negative number
    ///
    /// Raised locally; the request never reaches the backend.
    #[error("Invalid quantity {requested}: quantity must be at least 1")]
    InvalidQuantity { requested: i64 },

    /// Item quantity exceeds maximum allowed.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// Cart has exceeded maximum allowed lines.
    #[error("Cart cannot have more than {max} items")]
    CartTooLarge { max: usize },

    /// Two lines share the same id.
    #[error("Duplicate cart line: {item_id}")]
    DuplicateLine { item_id: String },

    /// Drop-shipped lines exist but none of them carries a usable variant id.
    ///
    /// ## When This Occurs
    /// - The backend returned a shipping source with a blank variant id
    ///
    /// This is a data inconsistency and must not be papered over with the
    /// flat-rate policy, which would misprice a drop-shipped order.
    #[error("No shippable variant found for drop-shipped items")]
    NoShippableVariant,

    /// Destination is not one of the supported countries.
    #[error("Unsupported destination country: {0}")]
    UnsupportedDestination(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Amount must not be negative.
    #[error("{field} must not be negative")]
    NegativeAmount { field: String },

    /// Amount is above the largest price the cart accepts.
    #[error("{field} must not exceed {max}")]
    AmountTooLarge { field: String, max: Money },

    /// Invalid format (e.g. malformed country code).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
