//! # Checkout Summary Projector
//!
//! Pure projection of cart totals, the applied promo and the shipping
//! resolution state into the payable total. Never persisted; recomputed on
//! every relevant change.
//!
//! ## Shipping Line
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Resolver state                 shipping               basis            │
//! │  ──────────────                 ────────               ─────            │
//! │  Resolved + selected option ──► option.freight ──────► Carrier          │
//! │  Resolving ───────────────────► flat-rate quote ─────► Pending          │
//! │  Failed ──────────────────────► flat-rate quote ─────► Estimate         │
//! │                                                        (unconfirmed)    │
//! │  Idle, nothing drop-shipped ──► flat-rate quote ─────► FlatRate         │
//! │                                                                         │
//! │  total = subtotal + shipping − promo_discount, clamped at 0            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::cart::Cart;
use crate::discount::AppliedPromo;
use crate::money::Money;
use crate::shipping::{FlatRatePolicy, ResolutionState};

/// Where the shipping amount came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShippingBasis {
    /// Nothing drop-shipped: flat-rate policy.
    FlatRate,
    /// Selected carrier option.
    Carrier { carrier_id: String },
    /// Carrier rate still being resolved; flat-rate shown meanwhile.
    Pending,
    /// Resolution failed; flat-rate shown as an unconfirmed estimate.
    Estimate { reason: String },
}

impl ShippingBasis {
    /// True when the amount is not a confirmed carrier or flat-rate charge.
    pub fn is_estimate(&self) -> bool {
        matches!(self, ShippingBasis::Pending | ShippingBasis::Estimate { .. })
    }
}

/// Final payable breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSummary {
    pub subtotal: Money,
    pub total_savings: Money,
    /// Mean markdown percentage over discounted lines.
    pub average_discount: u32,
    pub shipping: Money,
    pub shipping_basis: ShippingBasis,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promo_code: Option<String>,
    pub promo_discount: Money,
    pub total: Money,
    /// Set when `subtotal + shipping − promo_discount` was negative and the
    /// total had to be clamped to zero.
    pub anomalous: bool,
}

/// Computes the checkout summary.
///
/// ## Example
/// ```rust
/// use storefront_core::cart::Cart;
/// use storefront_core::money::Money;
/// use storefront_core::shipping::{FlatRatePolicy, ResolutionState};
/// use storefront_core::summary::project;
/// use storefront_core::types::LineItem;
///
/// let mut cart = Cart::new();
/// cart.add_item(LineItem::new("l1", "mug", 2, Money::from_cents(1_200))).unwrap();
///
/// let summary = project(&cart, &FlatRatePolicy::default(), &ResolutionState::Idle, None);
/// assert_eq!(summary.shipping.cents(), 499);
/// assert_eq!(summary.total.cents(), 2_899);
/// ```
pub fn project(
    cart: &Cart,
    policy: &FlatRatePolicy,
    resolution: &ResolutionState,
    promo: Option<&AppliedPromo>,
) -> CheckoutSummary {
    let subtotal = cart.subtotal();
    let flat_rate = policy.quote(subtotal);

    let (shipping, shipping_basis) = match resolution {
        ResolutionState::Resolved { .. } => match resolution.selected_option() {
            Some(option) => (
                option.freight.clamp_non_negative(),
                ShippingBasis::Carrier {
                    carrier_id: option.carrier_id.clone(),
                },
            ),
            None => (flat_rate, ShippingBasis::Pending),
        },
        ResolutionState::Resolving { .. } => (flat_rate, ShippingBasis::Pending),
        ResolutionState::Failed { reason, .. } => (
            flat_rate,
            ShippingBasis::Estimate {
                reason: reason.message(),
            },
        ),
        ResolutionState::Idle if cart.has_drop_shipped() => (flat_rate, ShippingBasis::Pending),
        ResolutionState::Idle => (flat_rate, ShippingBasis::FlatRate),
    };

    let promo_discount = promo
        .map(|p| p.discount_for(subtotal))
        .unwrap_or_else(Money::zero);

    let raw_total = subtotal + shipping - promo_discount;

    CheckoutSummary {
        subtotal,
        total_savings: cart.total_savings(),
        average_discount: cart.average_discount(),
        shipping,
        shipping_basis,
        promo_code: promo.map(|p| p.code.clone()),
        promo_discount,
        total: raw_total.clamp_non_negative(),
        anomalous: raw_total.is_negative(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discount::PromoRule;
    use crate::shipping::FailureReason;
    use crate::types::{EtaRange, LineItem, ShippingOption};

    fn drop_cart() -> Cart {
        let mut cart = Cart::new();
        cart.add_item(
            LineItem::new("l1", "p1", 2, Money::from_cents(1_500)).with_shipping_source("A"),
        )
        .unwrap();
        cart
    }

    fn option(carrier: &str, cents: i64) -> ShippingOption {
        ShippingOption {
            carrier_id: carrier.to_string(),
            carrier_name: None,
            freight: Money::from_cents(cents),
            eta: Some(EtaRange::new(5, 9)),
            currency: "USD".to_string(),
        }
    }

    #[test]
    fn test_resolved_uses_selected_freight() {
        let state = ResolutionState::from_options(1, vec![option("a", 731), option("b", 1_200)], None);
        let summary = project(&drop_cart(), &FlatRatePolicy::default(), &state, None);

        assert_eq!(summary.shipping.cents(), 731);
        assert_eq!(
            summary.shipping_basis,
            ShippingBasis::Carrier { carrier_id: "a".into() }
        );
        assert_eq!(summary.total.cents(), 3_731);
        assert!(!summary.anomalous);
    }

    #[test]
    fn test_failed_falls_back_to_flat_rate_estimate() {
        let state = ResolutionState::Failed {
            generation: 2,
            reason: FailureReason::Timeout { after_secs: 10 },
        };
        let summary = project(&drop_cart(), &FlatRatePolicy::default(), &state, None);

        assert_eq!(summary.shipping.cents(), 499);
        assert!(summary.shipping_basis.is_estimate());
        assert!(matches!(summary.shipping_basis, ShippingBasis::Estimate { .. }));
    }

    #[test]
    fn test_resolving_shows_pending_estimate() {
        let state = ResolutionState::Resolving { generation: 4 };
        let summary = project(&drop_cart(), &FlatRatePolicy::default(), &state, None);
        assert_eq!(summary.shipping_basis, ShippingBasis::Pending);
        assert_eq!(summary.shipping.cents(), 499);
    }

    #[test]
    fn test_plain_cart_uses_flat_rate() {
        let mut cart = Cart::new();
        cart.add_item(LineItem::new("l1", "p1", 1, Money::from_cents(6_000)))
            .unwrap();
        let summary = project(&cart, &FlatRatePolicy::default(), &ResolutionState::Idle, None);
        assert_eq!(summary.shipping, Money::zero());
        assert_eq!(summary.shipping_basis, ShippingBasis::FlatRate);
        assert_eq!(summary.total.cents(), 6_000);
    }

    #[test]
    fn test_total_clamps_to_zero_and_flags_anomaly() {
        let promo = AppliedPromo {
            code: "BIGSAVE".into(),
            rule: PromoRule::Fixed {
                amount: Money::from_cents(10_000),
            },
        };
        let summary = project(
            &drop_cart(),
            &FlatRatePolicy::default(),
            &ResolutionState::Idle,
            Some(&promo),
        );

        assert_eq!(summary.promo_discount.cents(), 10_000);
        assert_eq!(summary.total, Money::zero());
        assert!(summary.anomalous);
        assert_eq!(summary.promo_code.as_deref(), Some("BIGSAVE"));
    }

    #[test]
    fn test_percentage_promo_follows_subtotal() {
        let promo = AppliedPromo {
            code: "WELCOME10".into(),
            rule: PromoRule::Percentage { bps: 1_000 },
        };
        let mut cart = drop_cart();
        let before = project(&cart, &FlatRatePolicy::default(), &ResolutionState::Idle, Some(&promo));
        assert_eq!(before.promo_discount.cents(), 300);

        cart.set_quantity("l1", 4).unwrap();
        let after = project(&cart, &FlatRatePolicy::default(), &ResolutionState::Idle, Some(&promo));
        assert_eq!(after.promo_discount.cents(), 600);
    }

    #[test]
    fn test_savings_and_average_discount_are_projected() {
        let mut cart = Cart::new();
        cart.add_item(
            LineItem::new("l1", "p1", 1, Money::from_cents(8_000))
                .with_original_price(Money::from_cents(10_000)),
        )
        .unwrap();
        let summary = project(&cart, &FlatRatePolicy::default(), &ResolutionState::Idle, None);
        assert_eq!(summary.total_savings.cents(), 2_000);
        assert_eq!(summary.average_discount, 20);
    }
}
