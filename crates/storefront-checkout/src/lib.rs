//! # storefront-checkout: Cart Store & Shipping Resolution
//!
//! Async layer of the storefront checkout. Talks to the storefront REST API
//! and the drop-shipping supplier's freight API, and keeps the cart, the
//! wishlist and the shipping resolution consistent with each other.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         CheckoutSession                                 │
//! │                                                                         │
//! │   UI action ──► CartStore ──► CartBackend ──► GET/POST/DELETE /cart    │
//! │                    │  (write, then re-read)                             │
//! │                    │                                                    │
//! │                    ▼ CartSnapshot (watch)                               │
//! │   destination ──► resolver driver ──► ShippingResolver                 │
//! │                                          │  (last trigger wins)        │
//! │                                          ▼                              │
//! │                                    FreightProvider ──► POST freight    │
//! │                                                                         │
//! │   summary() = project(snapshot, resolution, promo, flat-rate policy)   │
//! │                                                                         │
//! │   every failure ──► CheckoutEventEmitter ──► inline, non-blocking      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`session`] - `CheckoutSession` context object and its builder
//! - [`store`] - `CartStore` with snapshots
//! - [`resolver`] - `ShippingResolver` state machine and driver task
//! - [`wishlist`] - `Wishlist` and move-to-cart
//! - [`backend`] - Cart and wishlist backends (HTTP, in-memory)
//! - [`freight`] - Freight provider client
//! - [`events`] - Structured event channel
//! - [`config`] - Endpoints, timeouts, shipping policy, promo table
//! - [`error`] - Checkout error types
//! - [`testing`] - Scripted freight provider for tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use storefront_checkout::{BroadcastEmitter, CheckoutConfig, CheckoutSession};
//!
//! let config = CheckoutConfig::load_or_default(None);
//! let events = Arc::new(BroadcastEmitter::default());
//! let session = CheckoutSession::from_config(&config, events.clone())?;
//!
//! session.start();
//! session.store().refresh().await?;
//! session.set_destination(Destination::Us);
//!
//! let summary = session.summary();
//! println!("Total: {}", summary.total);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod backend;
pub mod config;
pub mod error;
pub mod events;
pub mod freight;
pub mod resolver;
pub mod session;
pub mod store;
pub mod testing;
pub mod wishlist;

mod wire;

// =============================================================================
// Re-exports
// =============================================================================

pub use backend::{AddLine, CartBackend, WishlistBackend, WishlistEntry};
pub use config::CheckoutConfig;
pub use error::{CheckoutError, CheckoutResult, ErrorCode, UserMessage};
pub use events::{BroadcastEmitter, CheckoutEvent, CheckoutEventEmitter, NoOpEmitter};
pub use freight::{FreightProvider, HttpFreightProvider};
pub use resolver::{ResolverHandle, ShippingResolver};
pub use session::{CheckoutSession, CheckoutSessionBuilder};
pub use store::{CartSnapshot, CartStore};
pub use wishlist::Wishlist;
