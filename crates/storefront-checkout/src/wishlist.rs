//! # Wishlist
//!
//! Saved-for-later products, with the same write-then-re-read consistency as
//! the cart.
//!
//! `move_to_cart` adds to the cart first and only then removes the product
//! from the wishlist, so a failed add leaves the wishlist untouched.

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use storefront_core::validation::validate_product_id;
use storefront_core::CoreError;

use crate::backend::{AddLine, WishlistBackend, WishlistEntry};
use crate::error::CheckoutResult;
use crate::events::{CheckoutEventEmitter, NoOpEmitter};
use crate::store::{CartSnapshot, CartStore};

/// Wishlist state of one session.
pub struct Wishlist {
    backend: Arc<dyn WishlistBackend>,
    emitter: Arc<dyn CheckoutEventEmitter>,
    entries: RwLock<Vec<WishlistEntry>>,
}

impl Wishlist {
    pub fn new(backend: Arc<dyn WishlistBackend>) -> Self {
        Self::with_emitter(backend, Arc::new(NoOpEmitter))
    }

    pub fn with_emitter(
        backend: Arc<dyn WishlistBackend>,
        emitter: Arc<dyn CheckoutEventEmitter>,
    ) -> Self {
        Wishlist {
            backend,
            emitter,
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Entries as of the last re-read.
    pub async fn entries(&self) -> Vec<WishlistEntry> {
        self.entries.read().await.clone()
    }

    pub async fn contains(&self, product_id: &str) -> bool {
        self.entries
            .read()
            .await
            .iter()
            .any(|e| e.product_id == product_id)
    }

    pub async fn refresh(&self) -> CheckoutResult<Vec<WishlistEntry>> {
        let result = self.reread().await;
        self.reported(result)
    }

    /// Saves a product. Saving it twice is not an error.
    #[instrument(skip(self))]
    pub async fn add(&self, product_id: &str) -> CheckoutResult<Vec<WishlistEntry>> {
        self.reported(validate_product_id(product_id).map_err(|e| CoreError::from(e).into()))?;

        let written = self.backend.add(product_id).await;
        self.finish("add", written).await
    }

    /// Removes a product. Removing an absent product is not an error.
    #[instrument(skip(self))]
    pub async fn remove(&self, product_id: &str) -> CheckoutResult<Vec<WishlistEntry>> {
        self.reported(validate_product_id(product_id).map_err(|e| CoreError::from(e).into()))?;

        let written = self.backend.remove(product_id).await;
        self.finish("remove", written).await
    }

    /// Moves one unit of a saved product into the cart.
    ///
    /// The product's supplier variant travels with it.
    #[instrument(skip(self, cart))]
    pub async fn move_to_cart(
        &self,
        product_id: &str,
        cart: &CartStore,
    ) -> CheckoutResult<Arc<CartSnapshot>> {
        let source = self
            .entries
            .read()
            .await
            .iter()
            .find(|e| e.product_id == product_id)
            .and_then(|e| e.shipping_source.clone());

        let mut line = AddLine::new(product_id, 1);
        line.shipping_source = source;

        let snapshot = cart.add_line(line).await?;
        self.remove(product_id).await?;

        info!(product_id, revision = snapshot.revision, "Moved wishlist item to cart");
        Ok(snapshot)
    }

    /// Drops local state without touching the backend.
    pub async fn reset_local(&self) {
        self.entries.write().await.clear();
    }

    async fn finish(
        &self,
        op: &'static str,
        written: CheckoutResult<()>,
    ) -> CheckoutResult<Vec<WishlistEntry>> {
        let reread = self.reread().await;
        match (written, reread) {
            (Ok(()), reread) => self.reported(reread),
            (Err(e), reread) => {
                warn!(op, error = %e, "Wishlist write failed");
                if let Err(read_err) = reread {
                    debug!(op, error = %read_err, "Re-read after failed write also failed");
                }
                self.reported(Err(e))
            }
        }
    }

    async fn reread(&self) -> CheckoutResult<Vec<WishlistEntry>> {
        let entries = self.backend.fetch().await?;
        *self.entries.write().await = entries.clone();
        Ok(entries)
    }

    fn reported<T>(&self, result: CheckoutResult<T>) -> CheckoutResult<T> {
        if let Err(e) = &result {
            self.emitter.emit_error(e);
        }
        result
    }
}

impl std::fmt::Debug for Wishlist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wishlist").finish_non_exhaustive()
    }
}
