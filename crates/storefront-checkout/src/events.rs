//! # Checkout Events
//!
//! The single structured channel that the cart store and the shipping
//! resolver report to. Any UI layer subscribes here instead of sprinkling
//! its own retry and logging calls around each screen.
//!
//! ## Event Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  CartStore ─────────┐                                                   │
//! │  (after re-read)    │                                                   │
//! │                     ├──► CheckoutEventEmitter ──► web / mobile / CLI   │
//! │  ShippingResolver ──┤        │                                          │
//! │  (state changes)    │        ├── NoOpEmitter      (tests, headless)    │
//! │                     │        └── BroadcastEmitter (tokio broadcast)    │
//! │  Wishlist ──────────┘                                                   │
//! │                                                                         │
//! │  "cart_changed"         { revision, line_count, total_quantity }        │
//! │  "shipping_changed"     { generation, status }                          │
//! │  "failure"              { code, message, retryable }                    │
//! │  "resolution_discarded" { generation, current }   (debug consumers)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use tokio::sync::broadcast;

use storefront_core::shipping::ResolutionStatus;

use crate::error::{CheckoutError, ErrorCode};

/// Something the UI may want to react to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckoutEvent {
    /// A fresh authoritative cart was read after a mutation or refresh.
    CartChanged {
        revision: u64,
        line_count: usize,
        total_quantity: i64,
    },

    /// Shipping resolution moved to a new state.
    ShippingChanged {
        generation: Option<u64>,
        status: ResolutionStatus,
    },

    /// Inline, non-blocking failure.
    Failure {
        code: ErrorCode,
        message: String,
        retryable: bool,
    },

    /// A superseded resolution result was dropped on arrival.
    ResolutionDiscarded { generation: u64, current: u64 },
}

impl CheckoutEvent {
    /// Builds the event for an error.
    ///
    /// `StaleResolutionDiscarded` maps to `ResolutionDiscarded` so it never
    /// reaches a user-facing failure banner.
    pub fn from_error(err: &CheckoutError) -> Self {
        match err {
            CheckoutError::StaleResolutionDiscarded {
                generation,
                current,
            } => CheckoutEvent::ResolutionDiscarded {
                generation: *generation,
                current: *current,
            },
            other => {
                let msg = other.to_user_message();
                CheckoutEvent::Failure {
                    code: msg.code,
                    message: msg.message,
                    retryable: msg.retryable,
                }
            }
        }
    }
}

// =============================================================================
// Event Emitter Trait
// =============================================================================

/// Sink for checkout events.
pub trait CheckoutEventEmitter: Send + Sync {
    fn emit(&self, event: CheckoutEvent);

    /// Emits the event for an error.
    fn emit_error(&self, err: &CheckoutError) {
        self.emit(CheckoutEvent::from_error(err));
    }
}

/// No-op event emitter for testing.
pub struct NoOpEmitter;

impl CheckoutEventEmitter for NoOpEmitter {
    fn emit(&self, _event: CheckoutEvent) {}
}

/// Fans events out to any number of subscribers.
///
/// Slow subscribers lag and lose the oldest events rather than blocking the
/// store or the resolver.
#[derive(Debug, Clone)]
pub struct BroadcastEmitter {
    tx: broadcast::Sender<CheckoutEvent>,
}

impl BroadcastEmitter {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        BroadcastEmitter { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CheckoutEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastEmitter {
    fn default() -> Self {
        Self::new(64)
    }
}

impl CheckoutEventEmitter for BroadcastEmitter {
    fn emit(&self, event: CheckoutEvent) {
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }
}
