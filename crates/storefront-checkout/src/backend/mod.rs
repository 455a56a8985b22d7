//! # Storage Backends
//!
//! The seam between the stores and wherever the authoritative cart and
//! wishlist live.
//!
//! ## Implementations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │        CartStore / Wishlist                                            │
//! │               │                                                         │
//! │               ▼                                                         │
//! │   ┌───────────────────────┐                                            │
//! │   │ CartBackend (trait)   │  fetch · add · remove · set_quantity       │
//! │   │ WishlistBackend       │  fetch · add · remove                      │
//! │   └──────────┬────────────┘                                            │
//! │              │                                                          │
//! │      ┌───────┴────────────────┐                                         │
//! │      ▼                        ▼                                         │
//! │  http::HttpCartBackend    memory::InMemoryCartBackend                   │
//! │  REST API, no PATCH:      atomic set_quantity                           │
//! │  set_quantity is          under one lock                                │
//! │  DELETE + POST                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod http;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use storefront_core::{Cart, ShippingSourceRef};

use crate::error::CheckoutResult;

pub use http::{HttpCartBackend, HttpWishlistBackend};
pub use memory::{CatalogEntry, InMemoryCartBackend, InMemoryWishlistBackend};

/// Request to add a product to the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddLine {
    pub product_id: String,
    pub quantity: i64,
    /// Supplier variant for drop-shipped products.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_source: Option<ShippingSourceRef>,
}

impl AddLine {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        AddLine {
            product_id: product_id.into(),
            quantity,
            shipping_source: None,
        }
    }

    pub fn with_shipping_source(mut self, variant_id: impl Into<String>) -> Self {
        self.shipping_source = Some(ShippingSourceRef::new(variant_id));
        self
    }
}

/// Where the authoritative cart lives.
#[async_trait]
pub trait CartBackend: Send + Sync {
    /// Reads the whole cart.
    async fn fetch(&self) -> CheckoutResult<Cart>;

    /// Adds a line, or increments the existing line for the same product.
    async fn add(&self, line: &AddLine) -> CheckoutResult<()>;

    /// Removes a line. An unknown id is not an error.
    async fn remove(&self, item_id: &str) -> CheckoutResult<()>;

    /// Overwrites a line's quantity, keeping its product and shipping source.
    ///
    /// `quantity < 1` removes the line; an unknown id is a no-op.
    async fn set_quantity(&self, item_id: &str, quantity: i64) -> CheckoutResult<()>;

    /// Removes every line.
    async fn clear(&self) -> CheckoutResult<()> {
        let cart = self.fetch().await?;
        for item in cart.items() {
            self.remove(&item.id).await?;
        }
        Ok(())
    }
}

/// One saved-for-later product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistEntry {
    pub product_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_source: Option<ShippingSourceRef>,
}

/// Where the authoritative wishlist lives.
#[async_trait]
pub trait WishlistBackend: Send + Sync {
    async fn fetch(&self) -> CheckoutResult<Vec<WishlistEntry>>;

    /// Adding a product already on the list is not an error.
    async fn add(&self, product_id: &str) -> CheckoutResult<()>;

    /// Removing a product not on the list is not an error.
    async fn remove(&self, product_id: &str) -> CheckoutResult<()>;
}
