//! # Checkout Session
//!
//! Explicit context object for one signed-in shopper. Owns the cart store,
//! the wishlist, the shipping resolver, the selected destination and the
//! applied promo. Front-ends hold a session and pass it around; nothing here
//! is global.
//!
//! ## Ownership
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          CheckoutSession                                │
//! │                                                                         │
//! │   Arc<CartStore> ──── snapshots (watch) ────┐                          │
//! │   Option<Arc<Wishlist>>                     │                          │
//! │                                             ▼                          │
//! │   destination (watch) ─────────────► resolver driver task              │
//! │                                             │                          │
//! │   Arc<ShippingResolver> ◄───────────────────┘                          │
//! │                                                                         │
//! │   PromoTable + applied promo ─┐                                        │
//! │   FlatRatePolicy ─────────────┼──► summary() ──► CheckoutSummary       │
//! │   cart snapshot + state ──────┘     (pure projection, recomputed)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, instrument};

use storefront_core::discount::{AppliedPromo, PromoOutcome, PromoTable};
use storefront_core::shipping::{FlatRatePolicy, ResolutionState};
use storefront_core::summary::{project, CheckoutSummary};
use storefront_core::{CountryCode, Destination, DEFAULT_ORIGIN_COUNTRY};

use crate::backend::{CartBackend, HttpCartBackend, HttpWishlistBackend, WishlistBackend};
use crate::config::CheckoutConfig;
use crate::error::{CheckoutError, CheckoutResult};
use crate::events::{CheckoutEventEmitter, NoOpEmitter};
use crate::freight::{FreightProvider, HttpFreightProvider};
use crate::resolver::{ResolverHandle, ShippingResolver};
use crate::store::CartStore;
use crate::wishlist::Wishlist;

// =============================================================================
// Session
// =============================================================================

/// One shopper's checkout context.
pub struct CheckoutSession {
    store: Arc<CartStore>,
    wishlist: Option<Arc<Wishlist>>,
    resolver: Arc<ShippingResolver>,
    destination_tx: watch::Sender<Destination>,
    promos: PromoTable,
    applied_promo: Mutex<Option<AppliedPromo>>,
    policy: FlatRatePolicy,
    driver: Mutex<Option<ResolverHandle>>,
}

impl CheckoutSession {
    /// Builds a session against the HTTP storefront API and freight
    /// provider described by `config`.
    pub fn from_config(
        config: &CheckoutConfig,
        emitter: Arc<dyn CheckoutEventEmitter>,
    ) -> CheckoutResult<Self> {
        let cart = Arc::new(HttpCartBackend::new(&config.api)?);
        let wishlist = Arc::new(HttpWishlistBackend::new(&config.api)?);
        let freight = Arc::new(HttpFreightProvider::new(
            &config.freight,
            config.shipping.currency.clone(),
        )?);

        CheckoutSessionBuilder::new(cart, freight)
            .with_wishlist(wishlist)
            .with_emitter(emitter)
            .with_origin(config.origin()?)
            .with_freight_timeout(config.freight_timeout())
            .with_policy(config.flat_rate_policy())
            .with_promos(config.promo_table()?)
            .with_destination(config.checkout.default_destination)
            .build()
    }

    pub fn store(&self) -> &Arc<CartStore> {
        &self.store
    }

    pub fn resolver(&self) -> &Arc<ShippingResolver> {
        &self.resolver
    }

    /// The wishlist, when the session was built with one.
    pub fn wishlist(&self) -> Option<&Arc<Wishlist>> {
        self.wishlist.as_ref()
    }

    // =========================================================================
    // Shipping
    // =========================================================================

    /// Starts re-resolving shipping whenever the cart or destination changes.
    ///
    /// Calling it again while running does nothing.
    pub fn start(&self) {
        let mut driver = lock(&self.driver);
        if driver.is_none() {
            *driver = Some(
                self.resolver
                    .spawn_driver(self.store.subscribe(), self.destination_tx.subscribe()),
            );
            debug!("Shipping driver started");
        }
    }

    /// Stops the driver started by [`start`](Self::start).
    pub async fn shutdown(&self) {
        let handle = lock(&self.driver).take();
        if let Some(handle) = handle {
            handle.shutdown().await;
        }
    }

    pub fn destination(&self) -> Destination {
        *self.destination_tx.borrow()
    }

    /// Changes the destination. A running driver re-resolves; the
    /// in-flight resolution for the old destination is superseded.
    pub fn set_destination(&self, destination: Destination) {
        let changed = self.destination_tx.send_if_modified(|current| {
            if *current == destination {
                return false;
            }
            *current = destination;
            true
        });
        if changed {
            info!(%destination, "Destination changed");
        }
    }

    /// Resolves shipping now for the latest cart snapshot and destination.
    ///
    /// Also serves as the user's retry after a failure.
    pub async fn resolve_shipping(&self) -> CheckoutResult<ResolutionState> {
        let snapshot = self.store.snapshot();
        self.resolver.resolve(&snapshot.cart, self.destination()).await
    }

    /// Overrides the selected carrier.
    pub fn select_option(&self, carrier_id: &str) -> CheckoutResult<ResolutionState> {
        self.resolver.select_option(carrier_id)
    }

    // =========================================================================
    // Promo Codes
    // =========================================================================

    /// Evaluates a promo code against the current subtotal.
    ///
    /// An applied code replaces any previous one. A rejected code leaves the
    /// previous one in place.
    #[instrument(skip(self))]
    pub fn apply_promo_code(&self, code: &str) -> PromoOutcome {
        let outcome = self.promos.apply(code, self.store.subtotal());
        match &outcome {
            PromoOutcome::Applied { promo, discount } => {
                info!(code = %promo.code, discount = %discount, "Promo code applied");
                *lock(&self.applied_promo) = Some(promo.clone());
            }
            PromoOutcome::Rejected { code, reason } => {
                debug!(code = %code, reason = %reason, "Promo code rejected");
            }
        }
        outcome
    }

    pub fn clear_promo(&self) {
        *lock(&self.applied_promo) = None;
    }

    pub fn applied_promo(&self) -> Option<AppliedPromo> {
        lock(&self.applied_promo).clone()
    }

    // =========================================================================
    // Summary
    // =========================================================================

    /// Projects the latest snapshot, resolution state and promo into the
    /// payable breakdown.
    pub fn summary(&self) -> CheckoutSummary {
        let snapshot = self.store.snapshot();
        let state = self.resolver.state();
        let promo = self.applied_promo();
        project(&snapshot.cart, &self.policy, &state, promo.as_ref())
    }

    /// Drops all local state of the signed-in user.
    ///
    /// The remote cart is kept; only this session forgets it.
    pub async fn logout(&self) {
        self.clear_promo();
        self.resolver.reset();
        self.store.reset_local().await;
        if let Some(wishlist) = &self.wishlist {
            wishlist.reset_local().await;
        }
        info!("Checkout session logged out");
    }
}

impl std::fmt::Debug for CheckoutSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutSession")
            .field("destination", &self.destination())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// =============================================================================
// Builder Pattern
// =============================================================================

/// Builder for a `CheckoutSession` with explicit backends.
pub struct CheckoutSessionBuilder {
    cart: Arc<dyn CartBackend>,
    freight: Arc<dyn FreightProvider>,
    wishlist: Option<Arc<dyn WishlistBackend>>,
    emitter: Option<Arc<dyn CheckoutEventEmitter>>,
    origin: Option<CountryCode>,
    freight_timeout: Duration,
    policy: FlatRatePolicy,
    promos: PromoTable,
    destination: Destination,
}

impl CheckoutSessionBuilder {
    pub fn new(cart: Arc<dyn CartBackend>, freight: Arc<dyn FreightProvider>) -> Self {
        CheckoutSessionBuilder {
            cart,
            freight,
            wishlist: None,
            emitter: None,
            origin: None,
            freight_timeout: Duration::from_secs(10),
            policy: FlatRatePolicy::default(),
            promos: PromoTable::default(),
            destination: Destination::default(),
        }
    }

    pub fn with_wishlist(mut self, wishlist: Arc<dyn WishlistBackend>) -> Self {
        self.wishlist = Some(wishlist);
        self
    }

    pub fn with_emitter(mut self, emitter: Arc<dyn CheckoutEventEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    pub fn with_origin(mut self, origin: CountryCode) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn with_freight_timeout(mut self, timeout: Duration) -> Self {
        self.freight_timeout = timeout;
        self
    }

    pub fn with_policy(mut self, policy: FlatRatePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_promos(mut self, promos: PromoTable) -> Self {
        self.promos = promos;
        self
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn build(self) -> CheckoutResult<CheckoutSession> {
        if self.freight_timeout.is_zero() {
            return Err(CheckoutError::InvalidConfig(
                "freight timeout must be greater than 0".into(),
            ));
        }

        let origin = match self.origin {
            Some(origin) => origin,
            None => DEFAULT_ORIGIN_COUNTRY.parse()?,
        };
        let emitter = self.emitter.unwrap_or_else(|| Arc::new(NoOpEmitter));

        let store = Arc::new(CartStore::with_emitter(self.cart, Arc::clone(&emitter)));
        let wishlist = self
            .wishlist
            .map(|backend| Arc::new(Wishlist::with_emitter(backend, Arc::clone(&emitter))));
        let resolver = Arc::new(ShippingResolver::with_emitter(
            self.freight,
            origin,
            self.freight_timeout,
            emitter,
        ));
        let (destination_tx, _) = watch::channel(self.destination);

        Ok(CheckoutSession {
            store,
            wishlist,
            resolver,
            destination_tx,
            promos: self.promos,
            applied_promo: Mutex::new(None),
            policy: self.policy,
            driver: Mutex::new(None),
        })
    }
}
