//! In-process backends.
//!
//! Used by tests and by front-ends that keep a guest cart locally. Unlike the
//! REST API, `set_quantity` here is a single atomic update under one lock.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use storefront_core::{Cart, LineItem, Money, ShippingSourceRef};

use super::{AddLine, CartBackend, WishlistBackend, WishlistEntry};
use crate::error::{CheckoutError, CheckoutResult};

/// Price and fulfillment data for one catalog product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub unit_price: Money,
    pub original_unit_price: Option<Money>,
    pub shipping_source: Option<ShippingSourceRef>,
}

impl CatalogEntry {
    pub fn new(unit_price: Money) -> Self {
        CatalogEntry {
            unit_price,
            original_unit_price: None,
            shipping_source: None,
        }
    }

    pub fn with_original_price(mut self, original: Money) -> Self {
        self.original_unit_price = Some(original);
        self
    }

    pub fn drop_shipped(mut self, variant_id: impl Into<String>) -> Self {
        self.shipping_source = Some(ShippingSourceRef::new(variant_id));
        self
    }
}

/// `CartBackend` held in memory.
#[derive(Debug, Default)]
pub struct InMemoryCartBackend {
    catalog: HashMap<String, CatalogEntry>,
    cart: Mutex<Cart>,
    writes: AtomicUsize,
}

impl InMemoryCartBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a product that `add` can price.
    pub fn with_product(mut self, product_id: impl Into<String>, entry: CatalogEntry) -> Self {
        self.catalog.insert(product_id.into(), entry);
        self
    }

    /// Number of write calls (add, remove, set_quantity, clear) received.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CartBackend for InMemoryCartBackend {
    async fn fetch(&self) -> CheckoutResult<Cart> {
        Ok(self.cart.lock().await.clone())
    }

    async fn add(&self, line: &AddLine) -> CheckoutResult<()> {
        self.record_write();
        let entry = self
            .catalog
            .get(&line.product_id)
            .ok_or_else(|| CheckoutError::Backend {
                status: 404,
                message: format!("Product {} not found", line.product_id),
            })?;

        let item = LineItem {
            id: Uuid::new_v4().to_string(),
            product_id: line.product_id.clone(),
            quantity: line.quantity,
            unit_price: entry.unit_price,
            original_unit_price: entry.original_unit_price,
            shipping_source: line
                .shipping_source
                .clone()
                .or_else(|| entry.shipping_source.clone()),
        };

        let mut cart = self.cart.lock().await;
        cart.add_item(item)?;
        Ok(())
    }

    async fn remove(&self, item_id: &str) -> CheckoutResult<()> {
        self.record_write();
        if self.cart.lock().await.remove_item(item_id).is_none() {
            debug!(item_id, "Remove of absent line ignored");
        }
        Ok(())
    }

    async fn set_quantity(&self, item_id: &str, quantity: i64) -> CheckoutResult<()> {
        self.record_write();
        self.cart.lock().await.set_quantity(item_id, quantity)?;
        Ok(())
    }

    async fn clear(&self) -> CheckoutResult<()> {
        self.record_write();
        self.cart.lock().await.clear();
        Ok(())
    }
}

/// `WishlistBackend` held in memory.
#[derive(Debug, Default)]
pub struct InMemoryWishlistBackend {
    catalog: HashMap<String, Option<ShippingSourceRef>>,
    entries: Mutex<Vec<WishlistEntry>>,
}

impl InMemoryWishlistBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a product, with its supplier variant when drop-shipped.
    pub fn with_product(mut self, product_id: impl Into<String>, variant_id: Option<&str>) -> Self {
        self.catalog
            .insert(product_id.into(), variant_id.map(ShippingSourceRef::new));
        self
    }
}

#[async_trait]
impl WishlistBackend for InMemoryWishlistBackend {
    async fn fetch(&self) -> CheckoutResult<Vec<WishlistEntry>> {
        Ok(self.entries.lock().await.clone())
    }

    async fn add(&self, product_id: &str) -> CheckoutResult<()> {
        let mut entries = self.entries.lock().await;
        if entries.iter().any(|e| e.product_id == product_id) {
            return Ok(());
        }
        entries.push(WishlistEntry {
            product_id: product_id.to_string(),
            shipping_source: self.catalog.get(product_id).cloned().flatten(),
        });
        Ok(())
    }

    async fn remove(&self, product_id: &str) -> CheckoutResult<()> {
        self.entries
            .lock()
            .await
            .retain(|e| e.product_id != product_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> InMemoryCartBackend {
        InMemoryCartBackend::new()
            .with_product("shirt", CatalogEntry::new(Money::from_cents(1_500)).drop_shipped("V-SHIRT"))
            .with_product("mug", CatalogEntry::new(Money::from_cents(900)))
    }

    #[tokio::test]
    async fn test_add_prices_from_catalog_and_merges() {
        let backend = backend();
        backend.add(&AddLine::new("shirt", 1)).await.unwrap();
        backend.add(&AddLine::new("shirt", 2)).await.unwrap();

        let cart = backend.fetch().await.unwrap();
        assert_eq!(cart.line_count(), 1);
        let line = &cart.items()[0];
        assert_eq!(line.quantity, 3);
        assert_eq!(line.unit_price.cents(), 1_500);
        assert_eq!(line.shipping_source.as_ref().unwrap().variant_id, "V-SHIRT");
    }

    #[tokio::test]
    async fn test_unknown_product_is_backend_404() {
        let err = backend().add(&AddLine::new("ghost", 1)).await.unwrap_err();
        assert!(matches!(err, CheckoutError::Backend { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_set_quantity_is_atomic_and_keeps_variant() {
        let backend = backend();
        backend.add(&AddLine::new("shirt", 1)).await.unwrap();
        let id = backend.fetch().await.unwrap().items()[0].id.clone();

        backend.set_quantity(&id, 5).await.unwrap();

        let cart = backend.fetch().await.unwrap();
        assert_eq!(cart.items()[0].id, id);
        assert_eq!(cart.items()[0].quantity, 5);
        assert!(cart.items()[0].is_drop_shipped());
    }

    #[tokio::test]
    async fn test_wishlist_add_is_idempotent() {
        let wishlist = InMemoryWishlistBackend::new().with_product("shirt", Some("V-SHIRT"));
        wishlist.add("shirt").await.unwrap();
        wishlist.add("shirt").await.unwrap();

        let entries = wishlist.fetch().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].shipping_source.as_ref().unwrap().variant_id, "V-SHIRT");

        wishlist.remove("shirt").await.unwrap();
        wishlist.remove("shirt").await.unwrap();
        assert!(wishlist.fetch().await.unwrap().is_empty());
    }
}
