//! Test doubles for the freight provider.
//!
//! `ScriptedFreightProvider` answers each `quote` with the next scripted
//! step. A gated step holds its answer until the test opens the gate, which
//! is how out-of-order completion is simulated.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::{oneshot, Notify};

use storefront_core::shipping::FreightRequest;
use storefront_core::{EtaRange, Money, ShippingOption};

use crate::error::{CheckoutError, CheckoutResult};
use crate::freight::FreightProvider;

enum Step {
    Ready(CheckoutResult<Vec<ShippingOption>>),
    Gated {
        gate: oneshot::Receiver<()>,
        result: CheckoutResult<Vec<ShippingOption>>,
    },
}

/// Opens one gated step.
#[derive(Debug)]
pub struct FreightGate(oneshot::Sender<()>);

impl FreightGate {
    /// Lets the held answer through.
    pub fn open(self) {
        let _ = self.0.send(());
    }
}

/// `FreightProvider` that replays a script and records every request.
#[derive(Default)]
pub struct ScriptedFreightProvider {
    script: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<FreightRequest>>,
    received: Notify,
}

/// Builds an option with a 7-12 day ETA in USD.
pub fn option(carrier_id: &str, freight_cents: i64) -> ShippingOption {
    ShippingOption {
        carrier_id: carrier_id.to_string(),
        carrier_name: None,
        freight: Money::from_cents(freight_cents),
        eta: Some(EtaRange::new(7, 12)),
        currency: "USD".to_string(),
    }
}

fn options(specs: &[(&str, i64)]) -> Vec<ShippingOption> {
    specs.iter().map(|(id, cents)| option(id, *cents)).collect()
}

impl ScriptedFreightProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next quote answers immediately with these `(carrier, cents)` options.
    pub fn push_options(&self, specs: &[(&str, i64)]) {
        self.push(Step::Ready(Ok(options(specs))));
    }

    /// Next quote fails with `err`.
    pub fn push_error(&self, err: CheckoutError) {
        self.push(Step::Ready(Err(err)));
    }

    /// Next quote answers with these options once the returned gate opens.
    ///
    /// Dropping the gate without opening it also releases the answer.
    pub fn push_gated(&self, specs: &[(&str, i64)]) -> FreightGate {
        let (tx, gate) = oneshot::channel();
        self.push(Step::Gated {
            gate,
            result: Ok(options(specs)),
        });
        FreightGate(tx)
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<FreightRequest> {
        lock(&self.requests).clone()
    }

    /// Waits until at least `count` requests have arrived.
    pub async fn wait_for_requests(&self, count: usize) {
        loop {
            let notified = self.received.notified();
            if lock(&self.requests).len() >= count {
                return;
            }
            notified.await;
        }
    }

    fn push(&self, step: Step) {
        lock(&self.script).push_back(step);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl FreightProvider for ScriptedFreightProvider {
    async fn quote(&self, request: &FreightRequest) -> CheckoutResult<Vec<ShippingOption>> {
        let step = lock(&self.script).pop_front();
        lock(&self.requests).push(request.clone());
        self.received.notify_waiters();

        match step {
            Some(Step::Ready(result)) => result,
            Some(Step::Gated { gate, result }) => {
                let _ = gate.await;
                result
            }
            None => Err(CheckoutError::NetworkFailure(
                "no scripted freight response".to_string(),
            )),
        }
    }
}
