//! End-to-end checkout behaviour over the in-memory backend and a scripted
//! freight provider.

use std::sync::Arc;
use std::time::Duration;

use storefront_checkout::backend::{CatalogEntry, InMemoryCartBackend};
use storefront_checkout::testing::ScriptedFreightProvider;
use storefront_checkout::{
    BroadcastEmitter, CheckoutError, CheckoutEvent, CheckoutSession, CheckoutSessionBuilder,
    ErrorCode, ShippingResolver,
};
use storefront_core::discount::{PromoRule, PromoTable};
use storefront_core::shipping::{FreightLine, ResolutionState};
use storefront_core::summary::ShippingBasis;
use storefront_core::{Cart, Destination, LineItem, Money};

fn backend() -> Arc<InMemoryCartBackend> {
    Arc::new(
        InMemoryCartBackend::new()
            .with_product(
                "shirt",
                CatalogEntry::new(Money::from_cents(1_500)).drop_shipped("A"),
            )
            .with_product(
                "hat",
                CatalogEntry::new(Money::from_cents(900)).drop_shipped("B"),
            )
            .with_product("mug", CatalogEntry::new(Money::from_cents(1_200))),
    )
}

fn session(
    backend: Arc<InMemoryCartBackend>,
    provider: Arc<ScriptedFreightProvider>,
) -> CheckoutSession {
    CheckoutSessionBuilder::new(backend, provider)
        .with_destination(Destination::Fr)
        .build()
        .unwrap()
}

async fn wait_for_state<F>(session: &CheckoutSession, predicate: F) -> ResolutionState
where
    F: Fn(&ResolutionState) -> bool,
{
    let mut rx = session.resolver().subscribe();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            {
                let state = rx.borrow_and_update();
                if predicate(&state) {
                    return state.clone();
                }
            }
            rx.changed().await.unwrap();
        }
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn test_three_options_first_auto_selected() {
    let provider = Arc::new(ScriptedFreightProvider::new());
    provider.push_options(&[("cj-packet", 457), ("dhl", 1_290), ("ups", 2_100)]);
    let session = session(backend(), provider.clone());

    session.store().add("shirt", 2).await.unwrap();
    session.store().add("hat", 1).await.unwrap();
    let state = session.resolve_shipping().await.unwrap();

    assert_eq!(state.options().len(), 3);
    assert_eq!(state.selected_option().unwrap().carrier_id, "cj-packet");

    let request = &provider.requests()[0];
    assert_eq!(request.destination, Destination::Fr);
    assert_eq!(request.origin.as_str(), "CN");
    assert_eq!(
        request.lines,
        vec![
            FreightLine { variant_id: "A".into(), quantity: 2 },
            FreightLine { variant_id: "B".into(), quantity: 1 },
        ]
    );

    let summary = session.summary();
    assert_eq!(summary.shipping.cents(), 457);
    assert_eq!(summary.total.cents(), 3_900 + 457);
}

#[tokio::test]
async fn test_destination_change_discards_late_result() {
    let provider = Arc::new(ScriptedFreightProvider::new());
    let fr_gate = provider.push_gated(&[("fr-post", 700)]);
    let us_gate = provider.push_gated(&[("usps", 1_100)]);

    let resolver = Arc::new(ShippingResolver::new(
        provider.clone(),
        "CN".parse().unwrap(),
        Duration::from_secs(10),
    ));
    let cart = Cart::from_items(vec![
        LineItem::new("l1", "shirt", 1, Money::from_cents(1_500)).with_shipping_source("A"),
    ])
    .unwrap();

    let fr = {
        let resolver = resolver.clone();
        let cart = cart.clone();
        tokio::spawn(async move { resolver.resolve(&cart, Destination::Fr).await })
    };
    provider.wait_for_requests(1).await;

    let us = {
        let resolver = resolver.clone();
        let cart = cart.clone();
        tokio::spawn(async move { resolver.resolve(&cart, Destination::Us).await })
    };
    provider.wait_for_requests(2).await;

    // US answers first, then the superseded FR request.
    us_gate.open();
    let us_state = us.await.unwrap().unwrap();
    assert_eq!(us_state.selected_option().unwrap().carrier_id, "usps");

    fr_gate.open();
    let fr_result = fr.await.unwrap();
    assert!(matches!(
        fr_result,
        Err(CheckoutError::StaleResolutionDiscarded { .. })
    ));

    assert_eq!(resolver.state(), us_state);
}

#[tokio::test]
async fn test_late_result_from_old_destination_never_commits() {
    let provider = Arc::new(ScriptedFreightProvider::new());
    let fr_gate = provider.push_gated(&[("fr-post", 700)]);
    let us_gate = provider.push_gated(&[("usps", 1_100)]);
    let events = Arc::new(BroadcastEmitter::new(64));
    let mut rx = events.subscribe();

    let session = CheckoutSessionBuilder::new(backend(), provider.clone())
        .with_emitter(events.clone())
        .with_destination(Destination::Fr)
        .build()
        .unwrap();
    session.store().add("shirt", 1).await.unwrap();
    session.start();
    provider.wait_for_requests(1).await;

    session.set_destination(Destination::Us);
    provider.wait_for_requests(2).await;

    // FR completes after the switch: dropped on arrival.
    fr_gate.open();
    us_gate.open();

    let state = wait_for_state(&session, |s| s.selected_option().is_some()).await;
    assert_eq!(state.selected_option().unwrap().carrier_id, "usps");
    assert_eq!(provider.requests()[1].destination, Destination::Us);

    // The discard shows up only as a debug event, never as a failure.
    let discarded = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match rx.recv().await.unwrap() {
                CheckoutEvent::ResolutionDiscarded { .. } => return true,
                CheckoutEvent::Failure { .. } => return false,
                _ => {}
            }
        }
    })
    .await
    .unwrap();
    assert!(discarded);
    assert_eq!(session.summary().shipping.cents(), 1_100);

    session.shutdown().await;
}

#[tokio::test]
async fn test_total_clamps_to_zero() {
    let mut promos = PromoTable::empty();
    promos
        .insert("BIGSPENDER", PromoRule::Fixed { amount: Money::from_cents(50_000) })
        .unwrap();
    let session = CheckoutSessionBuilder::new(backend(), Arc::new(ScriptedFreightProvider::new()))
        .with_promos(promos)
        .build()
        .unwrap();

    session.store().add("mug", 1).await.unwrap();
    assert!(session.apply_promo_code("bigspender").is_applied());

    let summary = session.summary();
    assert_eq!(summary.total, Money::zero());
    assert!(summary.anomalous);
}

#[tokio::test]
async fn test_update_quantity_keeps_variant_in_freight_payload() {
    let provider = Arc::new(ScriptedFreightProvider::new());
    provider.push_options(&[("cj-packet", 457)]);
    let session = session(backend(), provider.clone());

    let snapshot = session.store().add("shirt", 1).await.unwrap();
    let item_id = snapshot.cart.items()[0].id.clone();
    session.store().update_quantity(&item_id, 3).await.unwrap();

    session.resolve_shipping().await.unwrap();

    assert_eq!(
        provider.requests()[0].lines,
        vec![FreightLine { variant_id: "A".into(), quantity: 3 }]
    );
}

#[tokio::test]
async fn test_invalid_quantity_is_local_and_non_fatal() {
    let backend = backend();
    let events = Arc::new(BroadcastEmitter::new(16));
    let mut rx = events.subscribe();
    let session = CheckoutSessionBuilder::new(backend.clone(), Arc::new(ScriptedFreightProvider::new()))
        .with_emitter(events.clone())
        .build()
        .unwrap();

    let err = session.store().add("mug", 0).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidQuantity);
    assert_eq!(backend.write_count(), 0);

    match rx.recv().await.unwrap() {
        CheckoutEvent::Failure { code, retryable, .. } => {
            assert_eq!(code, ErrorCode::InvalidQuantity);
            assert!(!retryable);
        }
        other => panic!("expected failure event, got {:?}", other),
    }

    // The cart stays usable.
    session.store().add("mug", 1).await.unwrap();
    assert_eq!(session.store().snapshot().cart.total_quantity(), 1);
}

#[tokio::test]
async fn test_failed_resolution_falls_back_to_flat_rate_estimate() {
    let provider = Arc::new(ScriptedFreightProvider::new());
    provider.push_options(&[]);
    let session = session(backend(), provider);

    session.store().add("shirt", 1).await.unwrap();
    session.resolve_shipping().await.unwrap();

    let summary = session.summary();
    assert_eq!(summary.shipping.cents(), 499);
    assert!(summary.shipping_basis.is_estimate());
    assert!(matches!(summary.shipping_basis, ShippingBasis::Estimate { .. }));
    assert_eq!(summary.total.cents(), 1_500 + 499);
}

#[tokio::test]
async fn test_non_shipping_change_does_not_retrigger() {
    let provider = Arc::new(ScriptedFreightProvider::new());
    provider.push_options(&[("cj-packet", 457)]);
    provider.push_options(&[("cj-packet", 480)]);
    let session = session(backend(), provider.clone());

    session.store().add("shirt", 1).await.unwrap();
    session.start();
    wait_for_state(&session, |s| s.selected_option().is_some()).await;

    // Removing an absent line publishes a new snapshot with the same key.
    session.store().remove("no-such-line").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(provider.requests().len(), 1);

    // Adding an item re-triggers.
    session.store().add("mug", 1).await.unwrap();
    provider.wait_for_requests(2).await;

    session.shutdown().await;
}
