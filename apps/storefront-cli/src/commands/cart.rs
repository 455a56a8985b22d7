//! # Cart Commands
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  cart          GET /cart                                                │
//! │  add           POST /cart, then GET /cart                               │
//! │  remove        DELETE /cart/:id, then GET /cart                         │
//! │  set-quantity  (adapter) GET, DELETE, POST, then GET /cart              │
//! │  clear         DELETE each line, then GET /cart                         │
//! │                                                                         │
//! │  Each prints the re-read cart and its summary.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use anyhow::bail;
use tracing::debug;

use storefront_checkout::{AddLine, CheckoutSession};

use crate::render::Output;

pub async fn show(session: &CheckoutSession, output: &Output) -> anyhow::Result<()> {
    let snapshot = session.store().refresh().await?;
    output.cart(&snapshot, &session.summary());
    Ok(())
}

pub async fn add(
    session: &CheckoutSession,
    output: &Output,
    product_id: &str,
    quantity: i64,
    variant: Option<String>,
) -> anyhow::Result<()> {
    debug!(product_id, quantity, "add command");
    // Merge limits are checked against the current cart.
    session.store().refresh().await?;

    let mut line = AddLine::new(product_id, quantity);
    if let Some(variant) = variant {
        line = line.with_shipping_source(variant);
    }

    let snapshot = session.store().add_line(line).await?;
    output.cart(&snapshot, &session.summary());
    Ok(())
}

pub async fn remove(session: &CheckoutSession, output: &Output, item_id: &str) -> anyhow::Result<()> {
    let snapshot = session.store().remove(item_id).await?;
    output.cart(&snapshot, &session.summary());
    Ok(())
}

pub async fn set_quantity(
    session: &CheckoutSession,
    output: &Output,
    item_id: &str,
    quantity: i64,
) -> anyhow::Result<()> {
    let snapshot = session.store().update_quantity(item_id, quantity).await?;
    output.cart(&snapshot, &session.summary());
    Ok(())
}

pub async fn clear(session: &CheckoutSession, output: &Output, confirmed: bool) -> anyhow::Result<()> {
    if !confirmed {
        bail!("refusing to empty the cart without --yes");
    }
    let snapshot = session.store().clear().await?;
    output.message(&format!("Cart emptied (revision {})", snapshot.revision));
    Ok(())
}
