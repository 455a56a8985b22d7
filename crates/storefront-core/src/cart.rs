//! # Cart Model
//!
//! The in-memory shape of a user's cart and every total derived from it.
//!
//! The authoritative copy lives behind the storefront API; this type is what a
//! re-read produces and what the in-memory backend mutates. All rules that can
//! be checked without the network (quantity bounds, line limits, unique ids)
//! are enforced here.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Cart Operations                                 │
//! │                                                                         │
//! │  Operation                    Effect                                    │
//! │  ─────────                    ──────                                    │
//! │                                                                         │
//! │  add_item(line) ────────────► same product_id? qty += n : push(line)   │
//! │                                                                         │
//! │  set_quantity(id, n) ───────► n < 1 ? remove(id) : items[i].qty = n    │
//! │                               (shipping_source is never touched)       │
//! │                                                                         │
//! │  remove_item(id) ───────────► absent? no-op : items.remove(i)          │
//! │                                                                         │
//! │  clear() ───────────────────► items.clear()                            │
//! │                                                                         │
//! │  subtotal() ────────────────► Σ unit_price × quantity                  │
//! │  total_savings() ───────────► Σ (original − unit_price) × quantity     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use ts_rs::TS;

use crate::discount;
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::LineItem;
use crate::validation::{validate_line_item, validate_quantity};
use crate::MAX_CART_ITEMS;

/// Ordered collection of line items, unique by `id`.
///
/// ## Invariants
/// - Every line has `quantity >= 1` and `quantity <= MAX_ITEM_QUANTITY`
/// - Line ids are unique
/// - At most `MAX_CART_ITEMS` lines
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    items: Vec<LineItem>,
}

impl Cart {
    /// Creates a new empty cart.
    pub fn new() -> Self {
        Cart { items: Vec::new() }
    }

    /// Builds a cart from lines returned by a backend, checking every invariant.
    pub fn from_items(items: Vec<LineItem>) -> CoreResult<Self> {
        if items.len() > MAX_CART_ITEMS {
            return Err(CoreError::CartTooLarge { max: MAX_CART_ITEMS });
        }

        let mut seen = HashSet::with_capacity(items.len());
        for item in &items {
            validate_line_item(item)?;
            if !seen.insert(item.id.as_str()) {
                return Err(CoreError::DuplicateLine {
                    item_id: item.id.clone(),
                });
            }
        }

        Ok(Cart { items })
    }

    /// Lines in cart order.
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    /// Consumes the cart, returning its lines.
    pub fn into_items(self) -> Vec<LineItem> {
        self.items
    }

    pub fn get(&self, item_id: &str) -> Option<&LineItem> {
        self.items.iter().find(|i| i.id == item_id)
    }

    pub fn find_by_product(&self, product_id: &str) -> Option<&LineItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of distinct lines.
    pub fn line_count(&self) -> usize {
        self.items.len()
    }

    /// Sum of quantities across all lines.
    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Adds a line, or increments the existing line for the same product.
    ///
    /// ## Behavior
    /// - If the product is already in the cart: increase quantity
    /// - If the product is new: append the line
    /// - A merged line keeps its id; it picks up the incoming shipping source
    ///   only when it had none
    ///
    /// ## Errors
    /// - `InvalidQuantity` if `line.quantity < 1`
    /// - `QuantityTooLarge` if the merged quantity exceeds `MAX_ITEM_QUANTITY`
    /// - `CartTooLarge` when a new line would exceed `MAX_CART_ITEMS`
    pub fn add_item(&mut self, line: LineItem) -> CoreResult<&LineItem> {
        validate_line_item(&line)?;

        if let Some(index) = self
            .items
            .iter()
            .position(|i| i.product_id == line.product_id)
        {
            let merged = self.items[index].quantity + line.quantity;
            validate_quantity(merged)?;

            let existing = &mut self.items[index];
            existing.quantity = merged;
            if existing.shipping_source.is_none() {
                existing.shipping_source = line.shipping_source;
            }
            return Ok(&self.items[index]);
        }

        if self.items.len() >= MAX_CART_ITEMS {
            return Err(CoreError::CartTooLarge { max: MAX_CART_ITEMS });
        }
        if self.get(&line.id).is_some() {
            return Err(CoreError::DuplicateLine { item_id: line.id });
        }

        self.items.push(line);
        Ok(&self.items[self.items.len() - 1])
    }

    /// Removes a line. Removing an absent id is a no-op.
    pub fn remove_item(&mut self, item_id: &str) -> Option<LineItem> {
        let index = self.items.iter().position(|i| i.id == item_id)?;
        Some(self.items.remove(index))
    }

    /// Overwrites the quantity of a line in place.
    ///
    /// - `quantity < 1` removes the line
    /// - an absent `item_id` is a no-op
    /// - the line's id, product and shipping source are preserved
    ///
    /// Returns the updated line, or `None` if the line is gone.
    pub fn set_quantity(&mut self, item_id: &str, quantity: i64) -> CoreResult<Option<&LineItem>> {
        if quantity < 1 {
            self.remove_item(item_id);
            return Ok(None);
        }
        validate_quantity(quantity)?;

        match self.items.iter_mut().find(|i| i.id == item_id) {
            Some(line) => {
                line.quantity = quantity;
                Ok(Some(line))
            }
            None => Ok(None),
        }
    }

    /// Empties the cart.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    // =========================================================================
    // Derived Totals
    // =========================================================================

    /// Σ unit_price × quantity over all lines.
    pub fn subtotal(&self) -> Money {
        self.items.iter().map(LineItem::line_total).sum()
    }

    /// Σ (original − unit_price) × quantity over marked-down lines.
    pub fn total_savings(&self) -> Money {
        self.items.iter().map(LineItem::line_savings).sum()
    }

    /// Mean discount percentage over marked-down lines.
    pub fn average_discount(&self) -> u32 {
        discount::average_discount(
            self.items
                .iter()
                .filter_map(|i| i.original_unit_price.map(|o| (o, i.unit_price))),
        )
    }

    /// Lines routed through the drop-shipping supplier.
    pub fn drop_shipped(&self) -> impl Iterator<Item = &LineItem> {
        self.items.iter().filter(|i| i.is_drop_shipped())
    }

    pub fn has_drop_shipped(&self) -> bool {
        self.items.iter().any(LineItem::is_drop_shipped)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
