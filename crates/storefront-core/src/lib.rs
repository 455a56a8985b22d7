//! # storefront-core: Pure Pricing & Fulfillment Logic
//!
//! This crate holds every calculation behind the storefront cart: line items,
//! subtotals, discount percentages, promo codes, the grouping of drop-shipped
//! lines into a freight request, the shipping-resolution state and the final
//! checkout summary. Nothing in here performs I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Storefront Checkout Architecture                    │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            Web app / Mobile app / Admin console                 │   │
//! │  │      Cart screen ──► Destination picker ──► Checkout screen     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  storefront-checkout (async I/O)                │   │
//! │  │   CartStore ── ShippingResolver ── CheckoutSession ── events    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ storefront-core (THIS CRATE) ★                   │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌──────────┐ ┌────────┐ │   │
//! │  │   │  money  │ │  cart   │ │ discount │ │ shipping │ │summary │ │   │
//! │  │   │  Money  │ │  Cart   │ │ percent  │ │ grouping │ │ totals │ │   │
//! │  │   │         │ │LineItem │ │  promo   │ │ flat rate│ │ clamp  │ │   │
//! │  │   └─────────┘ └─────────┘ └──────────┘ └──────────┘ └────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO NETWORK • NO TIMERS • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Line items, destinations, shipping options
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`cart`] - The cart model and its derived totals
//! - [`discount`] - Discount percentages and promo codes
//! - [`shipping`] - Variant grouping, flat-rate policy, resolution state
//! - [`summary`] - Checkout summary projection
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use storefront_core::cart::Cart;
//! use storefront_core::money::Money;
//! use storefront_core::types::LineItem;
//!
//! let mut cart = Cart::new();
//! cart.add_item(LineItem::new("line-1", "sneaker", 2, Money::from_cents(4_000))).unwrap();
//!
//! assert_eq!(cart.subtotal().cents(), 8_000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod discount;
pub mod error;
pub mod money;
pub mod shipping;
pub mod summary;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::Cart;
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct lines allowed in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single line.
///
/// Prevents accidental over-ordering (typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Largest unit price a line may carry (1,000,000.00).
///
/// Together with the quantity and line limits this keeps every cart total
/// far inside the range of `Money`.
pub const MAX_UNIT_PRICE: Money = Money::from_cents(100_000_000);

/// Country the drop-shipping supplier ships from.
pub const DEFAULT_ORIGIN_COUNTRY: &str = "CN";
