//! # Shipping Rules
//!
//! The pure half of shipping resolution: picking the drop-shipped lines,
//! grouping them by supplier variant, the flat-rate fallback policy, and the
//! resolution state machine the async resolver drives.
//!
//! ## Resolution State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │            no drop-shipped lines                                        │
//! │   ┌──────┐ ◄──────────────────────────────────────────────┐            │
//! │   │ Idle │                                                 │            │
//! │   └──┬───┘                                                 │            │
//! │      │ cart contents or destination changed                │            │
//! │      ▼                                                     │            │
//! │   ┌───────────┐   ≥1 option    ┌──────────┐                │            │
//! │   │ Resolving │ ─────────────► │ Resolved │ ───────────────┤            │
//! │   │  (gen N)  │                └──────────┘                │            │
//! │   └─────┬─────┘                                            │            │
//! │         │ 0 options / error / timeout / no variant         │            │
//! │         ▼                                                  │            │
//! │   ┌──────────┐                                             │            │
//! │   │  Failed  │ ────────────────────────────────────────────┘            │
//! │   └──────────┘                                                          │
//! │                                                                         │
//! │   Any state ──(new trigger)──► Resolving (gen N+1)                      │
//! │   Results tagged with gen < current are discarded on arrival.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::cart::Cart;
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{CountryCode, Destination, LineItem, ShippingOption};

/// Message shown when the provider gives no reason of its own.
pub const NO_DELIVERY_OPTION_MESSAGE: &str = "No delivery option available";

// =============================================================================
// Flat-Rate Policy
// =============================================================================

/// Shipping for carts with no drop-shipped lines, and the estimate shown
/// while a carrier rate is pending or has failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct FlatRatePolicy {
    /// Subtotal at or above which shipping is free.
    pub free_threshold: Money,
    /// Fee charged below the threshold.
    pub fee: Money,
}

impl Default for FlatRatePolicy {
    /// Free from 50.00, otherwise 4.99.
    fn default() -> Self {
        FlatRatePolicy {
            free_threshold: Money::from_cents(5_000),
            fee: Money::from_cents(499),
        }
    }
}

impl FlatRatePolicy {
    /// Shipping charged for a subtotal. An empty cart ships for free.
    pub fn quote(&self, subtotal: Money) -> Money {
        if !subtotal.is_positive() || subtotal >= self.free_threshold {
            Money::zero()
        } else {
            self.fee
        }
    }
}

// =============================================================================
// Variant Grouping
// =============================================================================

/// One `{vid, quantity}` entry of a freight request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct FreightLine {
    pub variant_id: String,
    pub quantity: i64,
}

/// Everything the freight provider needs to price a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct FreightRequest {
    pub origin: CountryCode,
    pub destination: Destination,
    pub lines: Vec<FreightLine>,
}

impl FreightRequest {
    /// Builds the request for a cart.
    ///
    /// Returns `Ok(None)` when the cart has no drop-shipped lines (the
    /// flat-rate policy applies) and `Err(NoShippableVariant)` when it has
    /// some but none carries a usable variant id.
    pub fn for_cart(
        cart: &Cart,
        origin: &CountryCode,
        destination: Destination,
    ) -> CoreResult<Option<FreightRequest>> {
        Ok(group_by_variant(cart.items())?.map(|lines| FreightRequest {
            origin: origin.clone(),
            destination,
            lines,
        }))
    }

    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }
}

/// Groups drop-shipped lines by supplier variant, summing quantities.
///
/// Variants keep the order in which they first appear in the cart. Lines
/// with a blank variant id are skipped; if that leaves nothing the cart is
/// inconsistent and `NoShippableVariant` is returned.
///
/// ## Example
/// ```rust
/// use storefront_core::money::Money;
/// use storefront_core::shipping::group_by_variant;
/// use storefront_core::types::LineItem;
///
/// let items = vec![
///     LineItem::new("l1", "shirt-red", 2, Money::from_cents(1_000)).with_shipping_source("A"),
///     LineItem::new("l2", "mug", 1, Money::from_cents(900)),
///     LineItem::new("l3", "shirt-red-xl", 1, Money::from_cents(1_000)).with_shipping_source("A"),
/// ];
/// let lines = group_by_variant(&items).unwrap().unwrap();
/// assert_eq!(lines.len(), 1);
/// assert_eq!(lines[0].quantity, 3);
/// ```
pub fn group_by_variant(items: &[LineItem]) -> CoreResult<Option<Vec<FreightLine>>> {
    let mut any_drop_shipped = false;
    let mut lines: Vec<FreightLine> = Vec::new();

    for item in items {
        let Some(source) = &item.shipping_source else {
            continue;
        };
        any_drop_shipped = true;

        let Some(variant_id) = source.usable_variant_id() else {
            continue;
        };

        match lines.iter_mut().find(|l| l.variant_id == variant_id) {
            Some(line) => line.quantity += item.quantity,
            None => lines.push(FreightLine {
                variant_id: variant_id.to_string(),
                quantity: item.quantity,
            }),
        }
    }

    if !any_drop_shipped {
        return Ok(None);
    }
    if lines.is_empty() {
        return Err(CoreError::NoShippableVariant);
    }
    Ok(Some(lines))
}

// =============================================================================
// Re-trigger Key
// =============================================================================

/// Fingerprint of what a resolution depends on.
///
/// Covers the destination, every drop-shipped line (id, variant, quantity)
/// and the overall line count and quantity of the cart. A trigger whose key
/// equals the last one does not need a new resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolutionKey {
    destination: Destination,
    line_count: usize,
    total_quantity: i64,
    lines: Vec<(String, Option<String>, i64)>,
}

impl ResolutionKey {
    /// Key for a cart, or `None` when nothing in it is drop-shipped.
    pub fn for_cart(cart: &Cart, destination: Destination) -> Option<ResolutionKey> {
        let lines: Vec<_> = cart
            .drop_shipped()
            .map(|item| {
                (
                    item.id.clone(),
                    item.shipping_source
                        .as_ref()
                        .and_then(|s| s.usable_variant_id())
                        .map(str::to_string),
                    item.quantity,
                )
            })
            .collect();

        if lines.is_empty() {
            None
        } else {
            Some(ResolutionKey {
                destination,
                line_count: cart.line_count(),
                total_quantity: cart.total_quantity(),
                lines,
            })
        }
    }

    pub fn destination(&self) -> Destination {
        self.destination
    }
}

// =============================================================================
// Resolution State
// =============================================================================

/// Why a resolution ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// Drop-shipped lines without any usable variant id.
    NoShippableVariant,
    /// Provider answered with no options, or with an error payload.
    NoDeliveryOption { message: Option<String> },
    /// Transport-level failure reaching the provider.
    Network { message: String },
    /// Provider did not answer in time.
    Timeout { after_secs: u64 },
}

impl FailureReason {
    /// Text shown inline next to the shipping line.
    pub fn message(&self) -> String {
        match self {
            FailureReason::NoShippableVariant => CoreError::NoShippableVariant.to_string(),
            FailureReason::NoDeliveryOption { message } => message
                .as_deref()
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .unwrap_or(NO_DELIVERY_OPTION_MESSAGE)
                .to_string(),
            FailureReason::Network { .. } | FailureReason::Timeout { .. } => {
                NO_DELIVERY_OPTION_MESSAGE.to_string()
            }
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// Coarse status, used in events and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    Idle,
    Resolving,
    Resolved,
    Failed,
}

impl fmt::Display for ResolutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResolutionStatus::Idle => "idle",
            ResolutionStatus::Resolving => "resolving",
            ResolutionStatus::Resolved => "resolved",
            ResolutionStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Current state of shipping resolution.
///
/// Every trigger bumps the generation; only results carrying the current
/// generation may move the state out of `Resolving`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ResolutionState {
    Idle,
    Resolving {
        generation: u64,
    },
    Resolved {
        generation: u64,
        options: Vec<ShippingOption>,
        /// Carrier id of the selected option.
        selected: String,
    },
    Failed {
        generation: u64,
        reason: FailureReason,
    },
}

impl Default for ResolutionState {
    fn default() -> Self {
        ResolutionState::Idle
    }
}

impl ResolutionState {
    /// Generation that produced this state (`None` for `Idle`).
    pub fn generation(&self) -> Option<u64> {
        match self {
            ResolutionState::Idle => None,
            ResolutionState::Resolving { generation }
            | ResolutionState::Resolved { generation, .. }
            | ResolutionState::Failed { generation, .. } => Some(*generation),
        }
    }

    pub fn status(&self) -> ResolutionStatus {
        match self {
            ResolutionState::Idle => ResolutionStatus::Idle,
            ResolutionState::Resolving { .. } => ResolutionStatus::Resolving,
            ResolutionState::Resolved { .. } => ResolutionStatus::Resolved,
            ResolutionState::Failed { .. } => ResolutionStatus::Failed,
        }
    }

    /// Options of a `Resolved` state, empty otherwise.
    pub fn options(&self) -> &[ShippingOption] {
        match self {
            ResolutionState::Resolved { options, .. } => options,
            _ => &[],
        }
    }

    /// The selected option of a `Resolved` state.
    pub fn selected_option(&self) -> Option<&ShippingOption> {
        match self {
            ResolutionState::Resolved {
                options, selected, ..
            } => options.iter().find(|o| &o.carrier_id == selected),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            ResolutionState::Failed { reason, .. } => Some(reason),
            _ => None,
        }
    }

    /// Builds the state for a successful provider answer.
    ///
    /// Zero options is a failure, not an empty success.
    pub fn from_options(
        generation: u64,
        options: Vec<ShippingOption>,
        previous_selection: Option<&str>,
    ) -> ResolutionState {
        match reconcile_selection(previous_selection, &options) {
            Some(selected) => ResolutionState::Resolved {
                generation,
                options,
                selected,
            },
            None => ResolutionState::Failed {
                generation,
                reason: FailureReason::NoDeliveryOption { message: None },
            },
        }
    }
}

/// Picks the carrier to select after a new option list arrives.
///
/// Keeps `previous` only if the same carrier is still offered; otherwise
/// falls back to the first option. `None` only for an empty list.
pub fn reconcile_selection(previous: Option<&str>, options: &[ShippingOption]) -> Option<String> {
    previous
        .and_then(|carrier| options.iter().find(|o| o.carrier_id == carrier))
        .or_else(|| options.first())
        .map(|o| o.carrier_id.clone())
}

// =============================================================================
// Unit Tests
// =============================================================================
