//! # Domain Types
//!
//! Core domain types shared by the cart, the shipping resolver and the
//! checkout summary.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌───────────────────────┐        ┌───────────────────────┐            │
//! │  │       LineItem        │        │    ShippingOption     │            │
//! │  │  ───────────────────  │        │  ───────────────────  │            │
//! │  │  id                   │        │  carrier_id           │            │
//! │  │  product_id           │        │  freight (Money)      │            │
//! │  │  quantity (≥ 1)       │        │  eta (EtaRange)       │            │
//! │  │  unit_price           │        │  currency             │            │
//! │  │  original_unit_price? │        └───────────────────────┘            │
//! │  │  shipping_source? ────┼──► ShippingSourceRef { variant_id }         │
//! │  └───────────────────────┘    (present only for drop-shipped lines)    │
//! │                                                                         │
//! │  ┌───────────────────────┐        ┌───────────────────────┐            │
//! │  │     Destination       │        │     CountryCode       │            │
//! │  │  FR US GB DE ES IT    │        │  ISO 3166-1 alpha-2   │            │
//! │  │  CA BE CH NL AU       │        │  (supplier origin)    │            │
//! │  └───────────────────────┘        └───────────────────────┘            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{CoreError, ValidationError};
use crate::money::Money;

// =============================================================================
// Shipping Source
// =============================================================================

/// Link from a cart line to the drop-shipping supplier's own variant.
///
/// The variant id is the supplier's identifier, distinct from the local
/// product id, and is what the freight provider prices.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ShippingSourceRef {
    /// Supplier variant identifier.
    pub variant_id: String,
}

impl ShippingSourceRef {
    pub fn new(variant_id: impl Into<String>) -> Self {
        ShippingSourceRef {
            variant_id: variant_id.into(),
        }
    }

    /// Returns the trimmed variant id, or `None` when it is blank.
    pub fn usable_variant_id(&self) -> Option<&str> {
        let id = self.variant_id.trim();
        if id.is_empty() {
            None
        } else {
            Some(id)
        }
    }
}

// =============================================================================
// Line Item
// =============================================================================

/// One line of the cart.
///
/// ## Invariants
/// - `quantity >= 1` (a line with zero quantity is removed, never stored)
/// - `unit_price >= 0`
/// - `shipping_source` is present only for drop-shipped products
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    /// Cart line identifier (assigned by the backend).
    pub id: String,

    /// Local catalog product identifier.
    pub product_id: String,

    /// Quantity in cart.
    pub quantity: i64,

    /// Current unit price.
    pub unit_price: Money,

    /// Price before markdown, when the product is on sale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_unit_price: Option<Money>,

    /// Supplier variant link for drop-shipped products.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_source: Option<ShippingSourceRef>,
}

impl LineItem {
    /// Creates a plain (not drop-shipped, not marked down) line.
    pub fn new(
        id: impl Into<String>,
        product_id: impl Into<String>,
        quantity: i64,
        unit_price: Money,
    ) -> Self {
        LineItem {
            id: id.into(),
            product_id: product_id.into(),
            quantity,
            unit_price,
            original_unit_price: None,
            shipping_source: None,
        }
    }

    /// Sets the pre-markdown unit price.
    pub fn with_original_price(mut self, original: Money) -> Self {
        self.original_unit_price = Some(original);
        self
    }

    /// Marks the line as drop-shipped through the given supplier variant.
    pub fn with_shipping_source(mut self, variant_id: impl Into<String>) -> Self {
        self.shipping_source = Some(ShippingSourceRef::new(variant_id));
        self
    }

    /// Unit price × quantity.
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }

    /// (original − current) × quantity when the line is marked down, else zero.
    pub fn line_savings(&self) -> Money {
        match self.original_unit_price {
            Some(original) if original > self.unit_price => {
                (original - self.unit_price).multiply_quantity(self.quantity)
            }
            _ => Money::zero(),
        }
    }

    /// True for lines fulfilled through the drop-shipping supplier.
    #[inline]
    pub fn is_drop_shipped(&self) -> bool {
        self.shipping_source.is_some()
    }
}

// =============================================================================
// Countries
// =============================================================================

/// Supported delivery destinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
pub enum Destination {
    Fr,
    Us,
    Gb,
    De,
    Es,
    It,
    Ca,
    Be,
    Ch,
    Nl,
    Au,
}

impl Destination {
    /// Every supported destination, in picker order.
    pub const ALL: [Destination; 11] = [
        Destination::Fr,
        Destination::Us,
        Destination::Gb,
        Destination::De,
        Destination::Es,
        Destination::It,
        Destination::Ca,
        Destination::Be,
        Destination::Ch,
        Destination::Nl,
        Destination::Au,
    ];

    /// ISO 3166-1 alpha-2 code.
    pub const fn code(&self) -> &'static str {
        match self {
            Destination::Fr => "FR",
            Destination::Us => "US",
            Destination::Gb => "GB",
            Destination::De => "DE",
            Destination::Es => "ES",
            Destination::It => "IT",
            Destination::Ca => "CA",
            Destination::Be => "BE",
            Destination::Ch => "CH",
            Destination::Nl => "NL",
            Destination::Au => "AU",
        }
    }
}

impl Default for Destination {
    fn default() -> Self {
        Destination::Fr
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Destination {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        Destination::ALL
            .iter()
            .copied()
            .find(|d| d.code() == code)
            .ok_or_else(|| CoreError::UnsupportedDestination(s.trim().to_string()))
    }
}

/// A validated ISO 3166-1 alpha-2 country code (two uppercase letters).
///
/// Used for the supplier origin, which is not restricted to [`Destination`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, type = "string")]
#[serde(try_from = "String", into = "String")]
pub struct CountryCode(String);

impl CountryCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CountryCode {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let code = value.trim().to_ascii_uppercase();
        if code.len() != 2 || !code.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(ValidationError::InvalidFormat {
                field: "country_code".to_string(),
                reason: format!("expected two letters, got '{}'", value),
            });
        }
        Ok(CountryCode(code))
    }
}

impl FromStr for CountryCode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CountryCode::try_from(s.to_string())
    }
}

impl From<CountryCode> for String {
    fn from(code: CountryCode) -> Self {
        code.0
    }
}

impl From<Destination> for CountryCode {
    fn from(destination: Destination) -> Self {
        CountryCode(destination.code().to_string())
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Shipping Option
// =============================================================================

/// Delivery window in days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct EtaRange {
    pub min_days: u32,
    pub max_days: u32,
}

impl EtaRange {
    /// Builds a range, swapping the bounds if they arrive reversed.
    pub fn new(a: u32, b: u32) -> Self {
        EtaRange {
            min_days: a.min(b),
            max_days: a.max(b),
        }
    }
}

impl fmt::Display for EtaRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min_days == self.max_days {
            write!(f, "{} days", self.min_days)
        } else {
            write!(f, "{}-{} days", self.min_days, self.max_days)
        }
    }
}

/// Parses provider strings such as `"7-12"`, `"7 - 12 days"` or `"5"`.
impl FromStr for EtaRange {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let numbers: Vec<u32> = s
            .split(|c: char| !c.is_ascii_digit())
            .filter(|part| !part.is_empty())
            .filter_map(|part| part.parse().ok())
            .collect();

        match numbers.as_slice() {
            [single] => Ok(EtaRange::new(*single, *single)),
            [min, max] => Ok(EtaRange::new(*min, *max)),
            _ => Err(ValidationError::InvalidFormat {
                field: "eta_range".to_string(),
                reason: format!("cannot read a day range from '{}'", s),
            }),
        }
    }
}

/// One priced delivery option returned by the freight provider.
///
/// Immutable once returned; a new resolution replaces the whole list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ShippingOption {
    /// Carrier identity, used to keep a user's choice across re-resolutions.
    pub carrier_id: String,

    /// Display name, when the provider sends one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carrier_name: Option<String>,

    /// Freight cost (never negative).
    pub freight: Money,

    /// Expected delivery window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta: Option<EtaRange>,

    /// ISO 4217 currency of `freight`.
    pub currency: String,
}

// =============================================================================
// Unit Tests
// =============================================================================
