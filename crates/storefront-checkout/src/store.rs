//! # Cart Store
//!
//! Front door for every cart mutation. Validates locally, writes to the
//! backend, then re-reads the authoritative cart and publishes it as a new
//! snapshot.
//!
//! ## Write, Then Re-read
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   add / remove / update_quantity / clear                                │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   1. local validation ──── fails ──► InvalidQuantity etc. (no request)  │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   2. backend write  ─────── fails ──┐                                   │
//! │        │                            │                                   │
//! │        ▼                            ▼                                   │
//! │   3. backend fetch (always, even after a failed write)                  │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   4. CartSnapshot { revision + 1 } ──► watch channel ──► resolver       │
//! │                                   └──► CartChanged event               │
//! │                                                                         │
//! │   Mutations are serialized: revision order == re-read order.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, instrument, warn};

use storefront_core::validation::{validate_item_id, validate_product_id, validate_quantity, validate_variant_id};
use storefront_core::{Cart, CoreError, Money, MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

use crate::backend::{AddLine, CartBackend};
use crate::error::{CheckoutError, CheckoutResult};
use crate::events::{CheckoutEvent, CheckoutEventEmitter, NoOpEmitter};

// =============================================================================
// Cart Snapshot
// =============================================================================

/// One authoritative read of the cart.
#[derive(Debug, Clone, PartialEq)]
pub struct CartSnapshot {
    /// Strictly increasing per store; 0 is the empty snapshot before any read.
    pub revision: u64,
    pub cart: Cart,
    pub fetched_at: DateTime<Utc>,
}

impl CartSnapshot {
    fn empty() -> Self {
        CartSnapshot {
            revision: 0,
            cart: Cart::new(),
            fetched_at: Utc::now(),
        }
    }
}

// =============================================================================
// Cart Store
// =============================================================================

/// Cart state of one session.
pub struct CartStore {
    backend: Arc<dyn CartBackend>,
    emitter: Arc<dyn CheckoutEventEmitter>,
    snapshot_tx: watch::Sender<Arc<CartSnapshot>>,
    /// Held across write + re-read.
    writes: Mutex<()>,
}

impl CartStore {
    pub fn new(backend: Arc<dyn CartBackend>) -> Self {
        Self::with_emitter(backend, Arc::new(NoOpEmitter))
    }

    pub fn with_emitter(
        backend: Arc<dyn CartBackend>,
        emitter: Arc<dyn CheckoutEventEmitter>,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(Arc::new(CartSnapshot::empty()));
        CartStore {
            backend,
            emitter,
            snapshot_tx,
            writes: Mutex::new(()),
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Arc<CartSnapshot> {
        self.snapshot_tx.borrow().clone()
    }

    /// Receiver that sees every new snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<CartSnapshot>> {
        self.snapshot_tx.subscribe()
    }

    pub fn subtotal(&self) -> Money {
        self.snapshot().cart.subtotal()
    }

    pub fn total_savings(&self) -> Money {
        self.snapshot().cart.total_savings()
    }

    /// Re-reads the cart without writing.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> CheckoutResult<Arc<CartSnapshot>> {
        let _guard = self.writes.lock().await;
        self.reread().await.map_err(|e| {
            self.report(&e);
            e
        })
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Adds `quantity` units of a product, merging into an existing line.
    pub async fn add(&self, product_id: &str, quantity: i64) -> CheckoutResult<Arc<CartSnapshot>> {
        self.add_line(AddLine::new(product_id, quantity)).await
    }

    /// Adds a line, carrying the supplier variant for drop-shipped products.
    ///
    /// ## Errors
    /// - `InvalidQuantity` when `quantity < 1`; nothing is sent.
    /// - `QuantityTooLarge` / `CartTooLarge` against the latest snapshot.
    #[instrument(skip(self, line), fields(product_id = %line.product_id, quantity = line.quantity))]
    pub async fn add_line(&self, line: AddLine) -> CheckoutResult<Arc<CartSnapshot>> {
        self.check(Self::validate_add(&self.snapshot().cart, &line))?;

        let backend = Arc::clone(&self.backend);
        self.write_then_reread("add", async move { backend.add(&line).await })
            .await
    }

    /// Removes a line. Removing an absent line is not an error.
    #[instrument(skip(self))]
    pub async fn remove(&self, item_id: &str) -> CheckoutResult<Arc<CartSnapshot>> {
        self.check(validate_item_id(item_id).map_err(CoreError::from))?;

        let backend = Arc::clone(&self.backend);
        let item_id = item_id.to_string();
        self.write_then_reread("remove", async move { backend.remove(&item_id).await })
            .await
    }

    /// Sets a line's quantity. `quantity < 1` removes the line.
    ///
    /// The line keeps its product and shipping source; an absent line is a
    /// no-op followed by the usual re-read.
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        item_id: &str,
        quantity: i64,
    ) -> CheckoutResult<Arc<CartSnapshot>> {
        if quantity < 1 {
            return self.remove(item_id).await;
        }

        self.check(validate_item_id(item_id).map_err(CoreError::from))?;
        self.check(validate_quantity(quantity))?;

        let backend = Arc::clone(&self.backend);
        let item_id = item_id.to_string();
        self.write_then_reread("update_quantity", async move {
            backend.set_quantity(&item_id, quantity).await
        })
        .await
    }

    /// Empties the cart. Confirmation is the caller's job.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> CheckoutResult<Arc<CartSnapshot>> {
        let backend = Arc::clone(&self.backend);
        self.write_then_reread("clear", async move { backend.clear().await })
            .await
    }

    /// Drops local cart state without touching the backend.
    ///
    /// Publishes an empty snapshot with the next revision.
    pub async fn reset_local(&self) {
        let _guard = self.writes.lock().await;
        let snapshot = self.publish(Cart::new());
        info!(revision = snapshot.revision, "Local cart state dropped");
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn validate_add(cart: &Cart, line: &AddLine) -> CheckoutResult<()> {
        validate_product_id(&line.product_id).map_err(CoreError::from)?;
        validate_quantity(line.quantity)?;
        if let Some(source) = &line.shipping_source {
            validate_variant_id(&source.variant_id).map_err(CoreError::from)?;
        }

        match cart.find_by_product(&line.product_id) {
            Some(existing) if existing.quantity + line.quantity > MAX_ITEM_QUANTITY => {
                Err(CoreError::QuantityTooLarge {
                    requested: existing.quantity + line.quantity,
                    max: MAX_ITEM_QUANTITY,
                }
                .into())
            }
            None if cart.line_count() >= MAX_CART_ITEMS => Err(CoreError::CartTooLarge {
                max: MAX_CART_ITEMS,
            }
            .into()),
            _ => Ok(()),
        }
    }

    /// Reports a local validation failure.
    fn check<E: Into<CheckoutError>>(&self, result: Result<(), E>) -> CheckoutResult<()> {
        result.map_err(|e| {
            let err = e.into();
            debug!(error = %err, "Rejected before reaching the backend");
            self.report(&err);
            err
        })
    }

    async fn write_then_reread<F>(&self, op: &'static str, write: F) -> CheckoutResult<Arc<CartSnapshot>>
    where
        F: Future<Output = CheckoutResult<()>>,
    {
        let _guard = self.writes.lock().await;

        let written = write.await;
        let reread = self.reread().await;

        match (written, reread) {
            (Ok(()), Ok(snapshot)) => {
                debug!(op, revision = snapshot.revision, "Cart write committed");
                Ok(snapshot)
            }
            (Err(e), reread) => {
                warn!(op, error = %e, "Cart write failed");
                if let Err(read_err) = reread {
                    debug!(op, error = %read_err, "Re-read after failed write also failed");
                }
                self.report(&e);
                Err(e)
            }
            (Ok(()), Err(e)) => {
                warn!(op, error = %e, "Cart re-read failed after write");
                self.report(&e);
                Err(e)
            }
        }
    }

    async fn reread(&self) -> CheckoutResult<Arc<CartSnapshot>> {
        let cart = self.backend.fetch().await?;
        Ok(self.publish(cart))
    }

    fn publish(&self, cart: Cart) -> Arc<CartSnapshot> {
        let revision = self.snapshot_tx.borrow().revision + 1;
        let snapshot = Arc::new(CartSnapshot {
            revision,
            cart,
            fetched_at: Utc::now(),
        });
        self.snapshot_tx.send_replace(Arc::clone(&snapshot));

        self.emitter.emit(CheckoutEvent::CartChanged {
            revision,
            line_count: snapshot.cart.line_count(),
            total_quantity: snapshot.cart.total_quantity(),
        });
        snapshot
    }

    fn report(&self, err: &CheckoutError) {
        self.emitter.emit_error(err);
    }
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("revision", &self.snapshot_tx.borrow().revision)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{CatalogEntry, InMemoryCartBackend};
    use crate::events::BroadcastEmitter;
    use crate::error::ErrorCode;

    fn store() -> (CartStore, Arc<InMemoryCartBackend>) {
        let backend = Arc::new(
            InMemoryCartBackend::new()
                .with_product(
                    "shirt",
                    CatalogEntry::new(Money::from_cents(8_000))
                        .with_original_price(Money::from_cents(10_000))
                        .drop_shipped("V-SHIRT"),
                )
                .with_product("mug", CatalogEntry::new(Money::from_cents(1_200))),
        );
        (CartStore::new(backend.clone()), backend)
    }

    #[tokio::test]
    async fn test_add_rereads_and_bumps_revision() {
        let (store, _) = store();
        let first = store.add("mug", 2).await.unwrap();
        let second = store.add("shirt", 1).await.unwrap();

        assert_eq!(first.revision, 1);
        assert_eq!(second.revision, 2);
        assert_eq!(store.subtotal().cents(), 2 * 1_200 + 8_000);
        assert_eq!(store.total_savings().cents(), 2_000);
    }

    #[tokio::test]
    async fn test_invalid_quantity_never_reaches_backend() {
        let (store, backend) = store();
        for qty in [0, -3] {
            let err = store.add("mug", qty).await.unwrap_err();
            assert_eq!(err.code(), ErrorCode::InvalidQuantity);
        }
        assert_eq!(backend.write_count(), 0);
        assert_eq!(store.snapshot().revision, 0);
    }

    #[tokio::test]
    async fn test_merged_quantity_limit_checked_locally() {
        let (store, backend) = store();
        store.add("mug", 990).await.unwrap();
        let err = store.add("mug", 10).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::LimitExceeded);
        assert_eq!(backend.write_count(), 1);
    }

    #[tokio::test]
    async fn test_remove_absent_line_is_idempotent() {
        let (store, _) = store();
        store.add("mug", 1).await.unwrap();
        let before = store.snapshot().cart.clone();

        store.remove("no-such-line").await.unwrap();
        store.remove("no-such-line").await.unwrap();

        assert_eq!(store.snapshot().cart, before);
    }

    #[tokio::test]
    async fn test_update_quantity_below_one_removes() {
        let (store, _) = store();
        let snap = store.add("mug", 3).await.unwrap();
        let id = snap.cart.items()[0].id.clone();

        let snap = store.update_quantity(&id, 0).await.unwrap();
        assert!(snap.cart.is_empty());
    }

    #[tokio::test]
    async fn test_update_quantity_keeps_shipping_source() {
        let (store, _) = store();
        let snap = store.add("shirt", 1).await.unwrap();
        let id = snap.cart.items()[0].id.clone();

        let snap = store.update_quantity(&id, 4).await.unwrap();
        let line = snap.cart.get(&id).unwrap();
        assert_eq!(line.quantity, 4);
        assert_eq!(line.shipping_source.as_ref().unwrap().variant_id, "V-SHIRT");
    }

    #[tokio::test]
    async fn test_failed_write_still_rereads_and_emits_failure() {
        let backend = Arc::new(InMemoryCartBackend::new());
        let emitter = Arc::new(BroadcastEmitter::new(16));
        let mut events = emitter.subscribe();
        let store = CartStore::with_emitter(backend, emitter.clone());

        let err = store.add("unknown", 1).await.unwrap_err();
        assert!(matches!(err, CheckoutError::Backend { status: 404, .. }));
        assert_eq!(store.snapshot().revision, 1);

        assert!(matches!(
            events.recv().await.unwrap(),
            CheckoutEvent::CartChanged { revision: 1, .. }
        ));
        assert!(matches!(
            events.recv().await.unwrap(),
            CheckoutEvent::Failure {
                code: ErrorCode::BackendError,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_subscribers_see_new_snapshots() {
        let (store, _) = store();
        let mut rx = store.subscribe();

        store.add("mug", 1).await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().revision, 1);
    }

    #[tokio::test]
    async fn test_reset_local_publishes_empty_cart() {
        let (store, backend) = store();
        store.add("mug", 1).await.unwrap();

        store.reset_local().await;

        let snap = store.snapshot();
        assert!(snap.cart.is_empty());
        assert_eq!(snap.revision, 2);
        assert_eq!(backend.fetch().await.unwrap().line_count(), 1);
    }
}
