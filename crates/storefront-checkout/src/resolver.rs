//! # Shipping Rate Resolver
//!
//! Turns (cart snapshot, destination) into priced delivery options and keeps
//! the resolution state in step with both.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │           nothing drop-shipped                                          │
//! │   ┌──────┐ ◄───────────────────────────────────────────┐                │
//! │   │ Idle │                                             │                │
//! │   └──┬───┘                                             │                │
//! │      │ trigger (gen = N)                               │                │
//! │      ▼                                                 │                │
//! │   ┌───────────┐  ok, ≥1 option   ┌────────────────┐    │                │
//! │   │ Resolving │ ───────────────► │ Resolved       │ ───┤                │
//! │   │  gen = N  │                  │ first option,  │    │ new trigger    │
//! │   └─────┬─────┘                  │ or kept        │    │ (gen = N + 1)  │
//! │         │                        │ override       │    │                │
//! │         │ 0 options / error /    └────────────────┘    │                │
//! │         │ timeout / no variant                         │                │
//! │         ▼                                              │                │
//! │   ┌────────────────┐                                   │                │
//! │   │ Failed(reason) │ ──────────────────────────────────┘                │
//! │   └────────────────┘                                                    │
//! │                                                                         │
//! │   LAST TRIGGER WINS: a result whose generation is no longer current    │
//! │   is dropped on arrival (StaleResolutionDiscarded, never shown).       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The generation counter and the state are only changed together, under the
//! state channel's lock, so a late result can never overwrite a newer state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use storefront_core::shipping::{FailureReason, FreightRequest, ResolutionKey, ResolutionState};
use storefront_core::{Cart, CoreError, CountryCode, Destination};

use crate::error::{CheckoutError, CheckoutResult};
use crate::events::{CheckoutEvent, CheckoutEventEmitter, NoOpEmitter};
use crate::freight::FreightProvider;
use crate::store::CartSnapshot;

// =============================================================================
// Resolver
// =============================================================================

/// Shipping resolution for one session.
pub struct ShippingResolver {
    provider: Arc<dyn FreightProvider>,
    emitter: Arc<dyn CheckoutEventEmitter>,
    origin: CountryCode,
    timeout: Duration,
    generation: AtomicU64,
    state_tx: watch::Sender<ResolutionState>,
    /// Carrier the user picked explicitly, kept while it is still offered.
    user_override: Mutex<Option<String>>,
}

impl ShippingResolver {
    pub fn new(provider: Arc<dyn FreightProvider>, origin: CountryCode, timeout: Duration) -> Self {
        Self::with_emitter(provider, origin, timeout, Arc::new(NoOpEmitter))
    }

    pub fn with_emitter(
        provider: Arc<dyn FreightProvider>,
        origin: CountryCode,
        timeout: Duration,
        emitter: Arc<dyn CheckoutEventEmitter>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ResolutionState::Idle);
        ShippingResolver {
            provider,
            emitter,
            origin,
            timeout,
            generation: AtomicU64::new(0),
            state_tx,
            user_override: Mutex::new(None),
        }
    }

    /// Current state.
    pub fn state(&self) -> ResolutionState {
        self.state_tx.borrow().clone()
    }

    /// Receiver that sees every committed state.
    pub fn subscribe(&self) -> watch::Receiver<ResolutionState> {
        self.state_tx.subscribe()
    }

    /// Generation of the most recent trigger.
    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Starts a new resolution for `cart` shipped to `destination` and waits
    /// for it.
    ///
    /// Any resolution still in flight is superseded. Provider failures are
    /// committed as `Failed` and returned as `Ok`.
    ///
    /// ## Errors
    /// `StaleResolutionDiscarded` when a newer trigger arrived before this
    /// one finished. The state then belongs to the newer trigger.
    #[instrument(skip(self, cart), fields(lines = cart.line_count()))]
    pub async fn resolve(
        &self,
        cart: &Cart,
        destination: Destination,
    ) -> CheckoutResult<ResolutionState> {
        match self.trigger(cart, destination)? {
            Triggered::Settled(state) => Ok(state),
            Triggered::Pending {
                generation,
                request,
            } => self.quote_and_commit(generation, request).await,
        }
    }

    /// Claims a generation for a new trigger without awaiting anything.
    ///
    /// Outcomes that need no provider call (nothing drop-shipped, no usable
    /// variant) are committed here. Triggers therefore take generations in
    /// the order they are raised, not the order their tasks first run.
    fn trigger(&self, cart: &Cart, destination: Destination) -> CheckoutResult<Triggered> {
        match FreightRequest::for_cart(cart, &self.origin, destination) {
            Ok(Some(request)) => Ok(Triggered::Pending {
                generation: self.begin(),
                request,
            }),
            Ok(None) => Ok(Triggered::Settled(self.go_idle(false))),
            Err(CoreError::NoShippableVariant) => {
                let generation = self.begin();
                warn!(generation, "Drop-shipped lines carry no usable variant id");
                let state = self.commit(
                    generation,
                    ResolutionState::Failed {
                        generation,
                        reason: FailureReason::NoShippableVariant,
                    },
                    Some(CheckoutError::NoShippableVariant),
                )?;
                Ok(Triggered::Settled(state))
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Asks the provider for options and commits them under `generation`.
    async fn quote_and_commit(
        &self,
        generation: u64,
        request: FreightRequest,
    ) -> CheckoutResult<ResolutionState> {
        debug!(
            generation,
            variants = request.lines.len(),
            quantity = request.total_quantity(),
            "Requesting freight options"
        );

        let (next, failure) =
            match tokio::time::timeout(self.timeout, self.provider.quote(&request)).await {
                Ok(Ok(options)) => {
                    let preferred = self.preferred_carrier();
                    let next =
                        ResolutionState::from_options(generation, options, preferred.as_deref());
                    let failure = next
                        .failure()
                        .map(|reason| CheckoutError::NoDeliveryOption(reason.message()));
                    (next, failure)
                }
                Ok(Err(e)) => {
                    warn!(generation, error = %e, "Freight quote failed");
                    let next = ResolutionState::Failed {
                        generation,
                        reason: failure_reason(&e),
                    };
                    (next, Some(e))
                }
                Err(_) => {
                    let after_secs = self.timeout.as_secs();
                    warn!(generation, after_secs, "Freight quote timed out");
                    let next = ResolutionState::Failed {
                        generation,
                        reason: FailureReason::Timeout { after_secs },
                    };
                    (next, Some(CheckoutError::Timeout(after_secs)))
                }
            };

        self.commit(generation, next, failure)
    }

    /// Overrides the auto-selected carrier.
    ///
    /// ## Errors
    /// `UnknownCarrier` unless the state is `Resolved` and `carrier_id` is
    /// among its options.
    pub fn select_option(&self, carrier_id: &str) -> CheckoutResult<ResolutionState> {
        let mut found = false;
        self.state_tx.send_if_modified(|state| {
            if let ResolutionState::Resolved {
                options, selected, ..
            } = state
            {
                if options.iter().any(|o| o.carrier_id == carrier_id) {
                    found = true;
                    *self.lock_override() = Some(carrier_id.to_string());
                    if selected != carrier_id {
                        *selected = carrier_id.to_string();
                        return true;
                    }
                }
            }
            false
        });

        if !found {
            return Err(CheckoutError::UnknownCarrier(carrier_id.to_string()));
        }

        info!(carrier_id, "Delivery option selected");
        let state = self.state();
        self.emit_state(&state);
        Ok(state)
    }

    /// Back to `Idle`, dropping any override and superseding anything in
    /// flight.
    pub fn reset(&self) {
        self.go_idle(true);
    }

    // =========================================================================
    // State Transitions
    // =========================================================================
    //
    // The override lock is only ever taken inside a state-channel closure or
    // on its own, never the other way round.

    /// Bumps the generation and enters `Resolving`.
    fn begin(&self) -> u64 {
        let mut generation = 0;
        self.state_tx.send_modify(|state| {
            generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *state = ResolutionState::Resolving { generation };
        });
        self.emit_state(&ResolutionState::Resolving { generation });
        generation
    }

    fn go_idle(&self, clear_override: bool) -> ResolutionState {
        let changed = self.state_tx.send_if_modified(|state| {
            self.generation.fetch_add(1, Ordering::SeqCst);
            if clear_override {
                *self.lock_override() = None;
            }
            let was_idle = matches!(state, ResolutionState::Idle);
            *state = ResolutionState::Idle;
            !was_idle
        });
        if changed {
            debug!("Resolver idle");
            self.emit_state(&ResolutionState::Idle);
        }
        ResolutionState::Idle
    }

    /// Commits `next` if `generation` is still current.
    ///
    /// `failure` is reported only when the commit happens; a superseded
    /// failure is never shown.
    fn commit(
        &self,
        generation: u64,
        next: ResolutionState,
        failure: Option<CheckoutError>,
    ) -> CheckoutResult<ResolutionState> {
        let mut superseded_by = None;
        let mut override_dropped = false;
        self.state_tx.send_if_modified(|state| {
            let current = self.generation.load(Ordering::SeqCst);
            if current != generation {
                superseded_by = Some(current);
                return false;
            }
            if let ResolutionState::Resolved { selected, .. } = &next {
                let mut user_override = self.lock_override();
                if user_override.as_deref().is_some_and(|c| c != selected) {
                    *user_override = None;
                    override_dropped = true;
                }
            }
            *state = next.clone();
            true
        });

        if let Some(current) = superseded_by {
            debug!(generation, current, "Discarding superseded freight result");
            let err = CheckoutError::StaleResolutionDiscarded {
                generation,
                current,
            };
            self.emitter.emit_error(&err);
            return Err(err);
        }

        if let ResolutionState::Resolved { selected, options, .. } = &next {
            info!(generation, options = options.len(), selected = %selected, "Shipping resolved");
            if override_dropped {
                debug!("Previous carrier no longer offered, override dropped");
            }
        }
        self.emit_state(&next);
        if let Some(err) = failure {
            self.emitter.emit_error(&err);
        }
        Ok(next)
    }

    fn emit_state(&self, state: &ResolutionState) {
        self.emitter.emit(CheckoutEvent::ShippingChanged {
            generation: state.generation(),
            status: state.status(),
        });
    }

    fn preferred_carrier(&self) -> Option<String> {
        self.lock_override().clone()
    }

    fn lock_override(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        // The guarded value is a plain Option; a poisoned lock still holds a
        // usable value.
        self.user_override
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // =========================================================================
    // Driver
    // =========================================================================

    /// Spawns the task that re-resolves whenever the cart or the destination
    /// changes.
    ///
    /// Triggers whose [`ResolutionKey`] equals the previous one are skipped.
    /// Each trigger claims its generation on the driver task, then waits for
    /// the provider on its own task, so a slow provider never delays the next
    /// trigger.
    pub fn spawn_driver(
        self: &Arc<Self>,
        mut snapshots: watch::Receiver<Arc<CartSnapshot>>,
        mut destinations: watch::Receiver<Destination>,
    ) -> ResolverHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let resolver = Arc::clone(self);

        let task = tokio::spawn(async move {
            let mut last_key: Option<ResolutionKey> = None;
            let mut initial = true;

            loop {
                if !initial {
                    tokio::select! {
                        changed = snapshots.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                        changed = destinations.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                        _ = shutdown_rx.recv() => {
                            break;
                        }
                    }
                }
                initial = false;

                let snapshot = snapshots.borrow_and_update().clone();
                let destination = *destinations.borrow_and_update();

                let key = ResolutionKey::for_cart(&snapshot.cart, destination);
                if key.is_some() && key == last_key {
                    debug!(revision = snapshot.revision, "Cart change does not affect shipping");
                    continue;
                }
                last_key = key;

                debug!(revision = snapshot.revision, %destination, "Shipping re-triggered");
                match resolver.trigger(&snapshot.cart, destination) {
                    Ok(Triggered::Pending {
                        generation,
                        request,
                    }) => {
                        let resolver = Arc::clone(&resolver);
                        tokio::spawn(async move {
                            // Superseded and failed outcomes are already
                            // logged and emitted by the commit.
                            let _ = resolver.quote_and_commit(generation, request).await;
                        });
                    }
                    Ok(Triggered::Settled(_)) => {}
                    Err(e) => debug!(error = %e, "Shipping trigger not started"),
                }
            }

            debug!("Shipping driver stopped");
        });

        ResolverHandle { shutdown_tx, task }
    }
}

impl std::fmt::Debug for ShippingResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShippingResolver")
            .field("origin", &self.origin)
            .field("timeout", &self.timeout)
            .field("generation", &self.current_generation())
            .finish_non_exhaustive()
    }
}

/// Outcome of claiming a generation for a trigger.
enum Triggered {
    /// Committed without a provider call.
    Settled(ResolutionState),
    /// Waiting on the provider.
    Pending {
        generation: u64,
        request: FreightRequest,
    },
}

/// Maps a provider error to the reason recorded in `Failed`.
fn failure_reason(err: &CheckoutError) -> FailureReason {
    match err {
        CheckoutError::NoShippableVariant | CheckoutError::Core(CoreError::NoShippableVariant) => {
            FailureReason::NoShippableVariant
        }
        CheckoutError::NetworkFailure(message) => FailureReason::Network {
            message: message.clone(),
        },
        CheckoutError::Timeout(after_secs) => FailureReason::Timeout {
            after_secs: *after_secs,
        },
        CheckoutError::NoDeliveryOption(message) | CheckoutError::Backend { message, .. } => {
            FailureReason::NoDeliveryOption {
                message: Some(message.clone()),
            }
        }
        CheckoutError::Decode(_) => FailureReason::NoDeliveryOption { message: None },
        other => FailureReason::NoDeliveryOption {
            message: Some(other.to_string()),
        },
    }
}

// =============================================================================
// Driver Handle
// =============================================================================

/// Handle for stopping a running driver.
#[derive(Debug)]
pub struct ResolverHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl ResolverHandle {
    /// Stops the driver and waits for it. Resolutions already started still
    /// finish on their own tasks.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedFreightProvider;
    use storefront_core::{LineItem, Money};

    fn drop_shipped_cart() -> Cart {
        Cart::from_items(vec![
            LineItem::new("l1", "shirt", 2, Money::from_cents(1_500)).with_shipping_source("A"),
            LineItem::new("l2", "hat", 1, Money::from_cents(900)).with_shipping_source("B"),
        ])
        .unwrap()
    }

    fn resolver(provider: Arc<ScriptedFreightProvider>) -> ShippingResolver {
        ShippingResolver::new(provider, "CN".parse().unwrap(), Duration::from_secs(10))
    }

    #[tokio::test]
    async fn test_no_drop_shipped_items_stays_idle() {
        let provider = Arc::new(ScriptedFreightProvider::new());
        let resolver = resolver(provider.clone());
        let cart = Cart::from_items(vec![LineItem::new("l1", "mug", 1, Money::from_cents(900))]).unwrap();

        let state = resolver.resolve(&cart, Destination::Fr).await.unwrap();
        assert_eq!(state, ResolutionState::Idle);
        assert!(provider.requests().is_empty());
    }

    #[tokio::test]
    async fn test_blank_variant_fails_without_request() {
        let provider = Arc::new(ScriptedFreightProvider::new());
        let resolver = resolver(provider.clone());
        let cart = Cart::from_items(vec![
            LineItem::new("l1", "shirt", 1, Money::from_cents(900)).with_shipping_source("  "),
        ])
        .unwrap();

        let state = resolver.resolve(&cart, Destination::Fr).await.unwrap();
        assert_eq!(state.failure(), Some(&FailureReason::NoShippableVariant));
        assert!(provider.requests().is_empty());
    }

    #[tokio::test]
    async fn test_first_option_selected_and_override_kept() {
        let provider = Arc::new(ScriptedFreightProvider::new());
        provider.push_options(&[("cj-packet", 457), ("dhl", 1_290), ("ups", 2_100)]);
        provider.push_options(&[("cj-packet", 480), ("ups", 2_300)]);
        let resolver = resolver(provider.clone());
        let cart = drop_shipped_cart();

        let state = resolver.resolve(&cart, Destination::Fr).await.unwrap();
        assert_eq!(state.selected_option().unwrap().carrier_id, "cj-packet");

        resolver.select_option("ups").unwrap();
        let state = resolver.resolve(&cart, Destination::Fr).await.unwrap();
        assert_eq!(state.selected_option().unwrap().carrier_id, "ups");
        assert_eq!(state.selected_option().unwrap().freight.cents(), 2_300);
    }

    #[tokio::test]
    async fn test_override_dropped_when_carrier_disappears() {
        let provider = Arc::new(ScriptedFreightProvider::new());
        provider.push_options(&[("cj-packet", 457), ("dhl", 1_290)]);
        provider.push_options(&[("usps", 700), ("cj-packet", 500)]);
        provider.push_options(&[("cj-packet", 500), ("dhl", 1_000)]);
        let resolver = resolver(provider);
        let cart = drop_shipped_cart();

        resolver.resolve(&cart, Destination::Fr).await.unwrap();
        resolver.select_option("dhl").unwrap();

        let state = resolver.resolve(&cart, Destination::Fr).await.unwrap();
        assert_eq!(state.selected_option().unwrap().carrier_id, "usps");

        let state = resolver.resolve(&cart, Destination::Fr).await.unwrap();
        assert_eq!(state.selected_option().unwrap().carrier_id, "cj-packet");
    }

    #[tokio::test]
    async fn test_select_unknown_carrier_is_rejected() {
        let provider = Arc::new(ScriptedFreightProvider::new());
        provider.push_options(&[("cj-packet", 457)]);
        let resolver = resolver(provider);

        assert!(matches!(
            resolver.select_option("dhl"),
            Err(CheckoutError::UnknownCarrier(_))
        ));

        resolver.resolve(&drop_shipped_cart(), Destination::Fr).await.unwrap();
        assert!(matches!(
            resolver.select_option("dhl"),
            Err(CheckoutError::UnknownCarrier(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_options_fail_with_no_delivery_option() {
        let provider = Arc::new(ScriptedFreightProvider::new());
        provider.push_options(&[]);
        let resolver = resolver(provider);

        let state = resolver.resolve(&drop_shipped_cart(), Destination::Fr).await.unwrap();
        assert_eq!(
            state.failure(),
            Some(&FailureReason::NoDeliveryOption { message: None })
        );
    }

    #[tokio::test]
    async fn test_provider_message_is_kept() {
        let provider = Arc::new(ScriptedFreightProvider::new());
        provider.push_error(CheckoutError::NoDeliveryOption("Destination not served".into()));
        let resolver = resolver(provider);

        let state = resolver.resolve(&drop_shipped_cart(), Destination::Au).await.unwrap();
        assert_eq!(state.failure().unwrap().message(), "Destination not served");
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_provider_times_out() {
        let provider = Arc::new(ScriptedFreightProvider::new());
        let _gate = provider.push_gated(&[("cj-packet", 457)]);
        let resolver = resolver(provider);

        let state = resolver.resolve(&drop_shipped_cart(), Destination::Fr).await.unwrap();
        assert_eq!(
            state.failure(),
            Some(&FailureReason::Timeout { after_secs: 10 })
        );
    }

    #[tokio::test]
    async fn test_generations_follow_trigger_order() {
        let provider = Arc::new(ScriptedFreightProvider::new());
        // Answers go out in call order: the US quote is requested first.
        provider.push_options(&[("usps", 900)]);
        provider.push_options(&[("colissimo", 600)]);
        let resolver = resolver(provider);
        let cart = drop_shipped_cart();

        let Triggered::Pending {
            generation: first,
            request: fr_request,
        } = resolver.trigger(&cart, Destination::Fr).unwrap()
        else {
            panic!("expected a pending trigger");
        };
        let Triggered::Pending {
            generation: second,
            request: us_request,
        } = resolver.trigger(&cart, Destination::Us).unwrap()
        else {
            panic!("expected a pending trigger");
        };
        assert!(second > first);
        assert_eq!(resolver.state(), ResolutionState::Resolving { generation: second });

        // The later trigger is quoted first; the earlier one still loses.
        let state = resolver.quote_and_commit(second, us_request).await.unwrap();
        assert_eq!(state.selected_option().unwrap().carrier_id, "usps");

        assert!(matches!(
            resolver.quote_and_commit(first, fr_request).await,
            Err(CheckoutError::StaleResolutionDiscarded { .. })
        ));
        assert_eq!(resolver.state().selected_option().unwrap().carrier_id, "usps");
    }

    #[tokio::test]
    async fn test_override_cleared_in_same_commit_as_state() {
        let provider = Arc::new(ScriptedFreightProvider::new());
        provider.push_options(&[("cj-packet", 457), ("dhl", 1_290)]);
        provider.push_options(&[("usps", 700)]);
        let resolver = resolver(provider);
        let cart = drop_shipped_cart();

        resolver.resolve(&cart, Destination::Fr).await.unwrap();
        resolver.select_option("dhl").unwrap();
        assert_eq!(resolver.preferred_carrier().as_deref(), Some("dhl"));

        let mut states = resolver.subscribe();
        resolver.resolve(&cart, Destination::Fr).await.unwrap();
        assert!(states.has_changed().unwrap());
        let committed = states.borrow_and_update().clone();
        assert_eq!(committed.selected_option().unwrap().carrier_id, "usps");
        assert_eq!(resolver.preferred_carrier(), None);
    }

    #[tokio::test]
    async fn test_failed_select_leaves_override_untouched() {
        let provider = Arc::new(ScriptedFreightProvider::new());
        provider.push_options(&[("cj-packet", 457), ("dhl", 1_290)]);
        let resolver = resolver(provider);

        resolver.resolve(&drop_shipped_cart(), Destination::Fr).await.unwrap();
        resolver.select_option("dhl").unwrap();
        assert!(resolver.select_option("fedex").is_err());

        assert_eq!(resolver.preferred_carrier().as_deref(), Some("dhl"));
        assert_eq!(resolver.state().selected_option().unwrap().carrier_id, "dhl");
    }

    #[tokio::test]
    async fn test_reset_clears_override() {
        let provider = Arc::new(ScriptedFreightProvider::new());
        provider.push_options(&[("cj-packet", 457), ("dhl", 1_290)]);
        let resolver = resolver(provider);

        resolver.resolve(&drop_shipped_cart(), Destination::Fr).await.unwrap();
        resolver.select_option("dhl").unwrap();
        resolver.reset();

        assert_eq!(resolver.state(), ResolutionState::Idle);
        assert_eq!(resolver.preferred_carrier(), None);
    }

    #[test]
    fn test_failure_reason_mapping() {
        assert_eq!(
            failure_reason(&CheckoutError::NetworkFailure("reset".into())),
            FailureReason::Network {
                message: "reset".into()
            }
        );
        assert_eq!(
            failure_reason(&CheckoutError::Backend {
                status: 502,
                message: "bad gateway".into()
            }),
            FailureReason::NoDeliveryOption {
                message: Some("bad gateway".into())
            }
        );
        assert_eq!(
            failure_reason(&CheckoutError::Decode("eof".into())),
            FailureReason::NoDeliveryOption { message: None }
        );
    }
}
