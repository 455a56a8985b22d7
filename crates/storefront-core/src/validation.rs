//! # Validation Module
//!
//! Input validation for everything that crosses into the cart: product ids,
//! quantities, prices, supplier variant ids and promo codes.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Front-end                                                     │
//! │  └── Steppers and input masks, immediate feedback                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE (before any backend call)                        │
//! │  ├── quantity ≥ 1 and ≤ MAX_ITEM_QUANTITY                              │
//! │  ├── 0 ≤ unit price ≤ MAX_UNIT_PRICE                                   │
//! │  └── identifiers present and bounded                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Storefront API                                                │
//! │  └── Stock, catalog existence, auth                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! An `InvalidQuantity` raised here never reaches the backend.
//!
//! ## Usage
//! ```rust
//! use storefront_core::validation::{validate_product_id, validate_quantity};
//!
//! validate_product_id("sneaker-42").unwrap();
//! validate_quantity(5).unwrap();
//! assert!(validate_quantity(0).is_err());
//! ```

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::LineItem;
use crate::{MAX_ITEM_QUANTITY, MAX_UNIT_PRICE};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_ID_LEN: usize = 128;
const MAX_PROMO_LEN: usize = 32;

// =============================================================================
// Identifier Validators
// =============================================================================

fn validate_identifier(field: &str, value: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.len() > MAX_ID_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_ID_LEN,
        });
    }

    Ok(())
}

/// Validates a local catalog product id.
pub fn validate_product_id(product_id: &str) -> ValidationResult<()> {
    validate_identifier("product_id", product_id)
}

/// Validates a cart line id.
pub fn validate_item_id(item_id: &str) -> ValidationResult<()> {
    validate_identifier("item_id", item_id)
}

/// Validates a supplier variant id.
pub fn validate_variant_id(variant_id: &str) -> ValidationResult<()> {
    validate_identifier("variant_id", variant_id)
}

/// Normalizes and validates a promo code.
///
/// ## Rules
/// - Surrounding whitespace is ignored
/// - Must not be empty, at most 32 characters
/// - Letters, digits, hyphens and underscores only
///
/// ## Returns
/// The upper-cased code used for table lookup.
pub fn validate_promo_code(code: &str) -> ValidationResult<String> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "promo_code".to_string(),
        });
    }

    if code.len() > MAX_PROMO_LEN {
        return Err(ValidationError::TooLong {
            field: "promo_code".to_string(),
            max: MAX_PROMO_LEN,
        });
    }

    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "promo_code".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(code.to_ascii_uppercase())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be at least 1
/// - Must not exceed MAX_ITEM_QUANTITY (999)
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Cart: Add Item                                                         │
/// │                                                                         │
/// │  User picks quantity: 5                                                │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  validate_quantity(5) ← THIS FUNCTION                                  │
/// │       │                                                                 │
/// │       ├── qty < 1?   → InvalidQuantity (never sent to backend)         │
/// │       │                                                                 │
/// │       ├── qty > 999? → QuantityTooLarge                                │
/// │       │                                                                 │
/// │       └── OK → Proceed with add                                        │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_quantity(qty: i64) -> CoreResult<()> {
    if qty < 1 {
        return Err(CoreError::InvalidQuantity { requested: qty });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(CoreError::QuantityTooLarge {
            requested: qty,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

fn validate_price(field: &str, price: Money) -> ValidationResult<()> {
    if price.is_negative() {
        return Err(ValidationError::NegativeAmount {
            field: field.to_string(),
        });
    }
    if price > MAX_UNIT_PRICE {
        return Err(ValidationError::AmountTooLarge {
            field: field.to_string(),
            max: MAX_UNIT_PRICE,
        });
    }
    Ok(())
}

/// Validates a unit price.
///
/// ## Rules
/// - Zero is allowed (free items)
/// - Must not be negative
/// - Must not exceed MAX_UNIT_PRICE
pub fn validate_unit_price(price: Money) -> ValidationResult<()> {
    validate_price("unit_price", price)
}

/// Validates every field of a line item.
pub fn validate_line_item(item: &LineItem) -> CoreResult<()> {
    validate_item_id(&item.id)?;
    validate_product_id(&item.product_id)?;
    validate_quantity(item.quantity)?;
    validate_unit_price(item.unit_price)?;
    if let Some(original) = item.original_unit_price {
        validate_price("original_unit_price", original)?;
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
