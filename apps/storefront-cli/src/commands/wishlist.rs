//! Wishlist commands.

use anyhow::Context;

use storefront_checkout::CheckoutSession;

use crate::render::Output;
use crate::WishlistAction;

pub async fn run(
    session: &CheckoutSession,
    output: &Output,
    action: WishlistAction,
) -> anyhow::Result<()> {
    let wishlist = session
        .wishlist()
        .context("this session has no wishlist backend")?;

    match action {
        WishlistAction::List => {
            let entries = wishlist.refresh().await?;
            output.wishlist(&entries);
        }
        WishlistAction::Add { product_id } => {
            let entries = wishlist.add(&product_id).await?;
            output.wishlist(&entries);
        }
        WishlistAction::Remove { product_id } => {
            let entries = wishlist.remove(&product_id).await?;
            output.wishlist(&entries);
        }
        WishlistAction::Move { product_id } => {
            // Picks up the saved variant before moving.
            wishlist.refresh().await?;
            session.store().refresh().await?;
            let snapshot = wishlist.move_to_cart(&product_id, session.store()).await?;
            output.cart(&snapshot, &session.summary());
        }
    }
    Ok(())
}
