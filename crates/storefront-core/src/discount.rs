//! # Discount Evaluator
//!
//! Per-item and aggregate discount percentages, plus promo-code rules.
//!
//! ## Rounding
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  discount_percentage(original, price)                                   │
//! │                                                                         │
//! │    exact value:  (original − price) / original × 100                   │
//! │    result:       rounded half away from zero to a whole percent        │
//! │                                                                         │
//! │    original = 30.00, price = 20.00 → 33.33… → 33                      │
//! │    original = 8.00,  price = 7.00  → 12.5   → 13                      │
//! │                                                                         │
//! │  Computed in i128 integer arithmetic: no float ever touches a price.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Promo Codes
//! Promo codes are a fixed table looked up at apply time. The outcome is
//! never stored in the cart: [`AppliedPromo::discount_for`] recomputes the
//! discount whenever the subtotal changes, and an unknown code is an explicit
//! [`PromoOutcome::Rejected`] rather than a silent 0%.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::validation::{validate_promo_code, ValidationResult};

/// Code shipped in the default promo table.
pub const DEFAULT_PROMO_CODE: &str = "WELCOME10";

/// 100% in basis points.
const FULL_BPS: u32 = 10_000;

// =============================================================================
// Percentages
// =============================================================================

/// Whole-percent markdown from `original` to `price`.
///
/// Returns 0 when `original <= 0` or `original <= price`; a price increase
/// never yields a negative discount.
///
/// ## Example
/// ```rust
/// use storefront_core::discount::discount_percentage;
/// use storefront_core::money::Money;
///
/// assert_eq!(discount_percentage(Money::from_cents(10_000), Money::from_cents(8_000)), 20);
/// assert_eq!(discount_percentage(Money::from_cents(5_000), Money::from_cents(6_000)), 0);
/// ```
pub fn discount_percentage(original: Money, price: Money) -> u32 {
    let (o, p) = (original.cents() as i128, price.cents() as i128);
    if o <= 0 || o <= p {
        return 0;
    }
    // round(x) with x = 100 (o - p) / o, half away from zero: (2·100·(o−p) + o) / 2o
    let rounded = (200 * (o - p) + o) / (2 * o);
    u32::try_from(rounded).unwrap_or(u32::MAX)
}

/// Mean of [`discount_percentage`] over the marked-down pairs.
///
/// Pairs whose original price is not above the current price are excluded
/// from both the numerator and the denominator. An input with no discounted
/// pair averages to 0.
///
/// ## Example
/// ```rust
/// use storefront_core::discount::average_discount;
/// use storefront_core::money::Money;
///
/// let pairs = [
///     (Money::from_cents(10_000), Money::from_cents(8_000)),
///     (Money::from_cents(5_000), Money::from_cents(5_000)),
/// ];
/// assert_eq!(average_discount(pairs), 20);
/// ```
pub fn average_discount<I>(pairs: I) -> u32
where
    I: IntoIterator<Item = (Money, Money)>,
{
    let (sum, count) = pairs
        .into_iter()
        .filter(|(original, price)| original.is_positive() && original > price)
        .map(|(original, price)| discount_percentage(original, price) as u64)
        .fold((0u64, 0u64), |(sum, count), pct| (sum + pct, count + 1));

    if count == 0 {
        return 0;
    }
    ((2 * sum + count) / (2 * count)) as u32
}

// =============================================================================
// Promo Rules
// =============================================================================

/// What a promo code takes off the subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PromoRule {
    /// Percentage of the subtotal, in basis points (1000 = 10%).
    Percentage { bps: u32 },
    /// Fixed amount, not capped by the subtotal.
    Fixed { amount: Money },
}

impl PromoRule {
    /// Discount this rule yields on `subtotal`.
    pub fn discount_for(&self, subtotal: Money) -> Money {
        match *self {
            PromoRule::Percentage { bps } => subtotal.clamp_non_negative().percentage_of(bps),
            PromoRule::Fixed { amount } => amount,
        }
    }

    fn validate(&self) -> ValidationResult<()> {
        match *self {
            PromoRule::Percentage { bps } if bps > FULL_BPS => Err(ValidationError::InvalidFormat {
                field: "promo.percentage".to_string(),
                reason: format!("{} bps is more than 100%", bps),
            }),
            PromoRule::Fixed { amount } if amount.is_negative() => {
                Err(ValidationError::NegativeAmount {
                    field: "promo.amount".to_string(),
                })
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for PromoRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromoRule::Percentage { bps } if bps % 100 == 0 => write!(f, "{}% off", bps / 100),
            PromoRule::Percentage { bps } => write!(f, "{}.{:02}% off", bps / 100, bps % 100),
            PromoRule::Fixed { amount } => write!(f, "{} off", amount),
        }
    }
}

/// A promo code that was accepted at apply time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AppliedPromo {
    /// Normalized (upper-case) code.
    pub code: String,
    pub rule: PromoRule,
}

impl AppliedPromo {
    /// Recomputes the discount against the current subtotal.
    pub fn discount_for(&self, subtotal: Money) -> Money {
        self.rule.discount_for(subtotal)
    }
}

/// Why a promo code was not applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PromoRejection {
    /// Well-formed but not in the table.
    UnknownCode,
    /// Empty, too long or containing illegal characters.
    Malformed { reason: String },
}

impl fmt::Display for PromoRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromoRejection::UnknownCode => f.write_str("Invalid promo code"),
            PromoRejection::Malformed { reason } => write!(f, "Invalid promo code: {}", reason),
        }
    }
}

/// Result of [`PromoTable::apply`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PromoOutcome {
    Applied {
        promo: AppliedPromo,
        discount: Money,
    },
    Rejected {
        code: String,
        reason: PromoRejection,
    },
}

impl PromoOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, PromoOutcome::Applied { .. })
    }

    /// Discount granted, zero when rejected.
    pub fn discount(&self) -> Money {
        match self {
            PromoOutcome::Applied { discount, .. } => *discount,
            PromoOutcome::Rejected { .. } => Money::zero(),
        }
    }
}

// =============================================================================
// Promo Table
// =============================================================================

/// Client-side table of known promo codes.
///
/// Keys are stored upper-cased; lookups trim and upper-case the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromoTable {
    rules: BTreeMap<String, PromoRule>,
}

impl PromoTable {
    /// An empty table (every code is rejected).
    pub fn empty() -> Self {
        PromoTable {
            rules: BTreeMap::new(),
        }
    }

    /// Registers a code, replacing any previous rule under the same code.
    pub fn insert(&mut self, code: &str, rule: PromoRule) -> ValidationResult<()> {
        let code = validate_promo_code(code)?;
        rule.validate()?;
        self.rules.insert(code, rule);
        Ok(())
    }

    pub fn lookup(&self, code: &str) -> Option<PromoRule> {
        let code = validate_promo_code(code).ok()?;
        self.rules.get(&code).copied()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Evaluates `code` against `subtotal`.
    ///
    /// ## Example
    /// ```rust
    /// use storefront_core::discount::{PromoOutcome, PromoTable};
    /// use storefront_core::money::Money;
    ///
    /// let table = PromoTable::default();
    /// let outcome = table.apply("welcome10", Money::from_cents(20_000));
    /// assert_eq!(outcome.discount().cents(), 2_000);
    ///
    /// assert!(matches!(table.apply("BOGUS", Money::from_cents(20_000)), PromoOutcome::Rejected { .. }));
    /// ```
    pub fn apply(&self, code: &str, subtotal: Money) -> PromoOutcome {
        let normalized = match validate_promo_code(code) {
            Ok(normalized) => normalized,
            Err(err) => {
                return PromoOutcome::Rejected {
                    code: code.trim().to_string(),
                    reason: PromoRejection::Malformed {
                        reason: err.to_string(),
                    },
                }
            }
        };

        match self.rules.get(&normalized) {
            Some(rule) => PromoOutcome::Applied {
                discount: rule.discount_for(subtotal),
                promo: AppliedPromo {
                    code: normalized,
                    rule: *rule,
                },
            },
            None => PromoOutcome::Rejected {
                code: normalized,
                reason: PromoRejection::UnknownCode,
            },
        }
    }
}

impl Default for PromoTable {
    /// The built-in table: `WELCOME10` takes 10% off the subtotal.
    fn default() -> Self {
        let mut rules = BTreeMap::new();
        rules.insert(
            DEFAULT_PROMO_CODE.to_string(),
            PromoRule::Percentage { bps: 1_000 },
        );
        PromoTable { rules }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
