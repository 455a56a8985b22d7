//! # Quote Command
//!
//! Reads the cart, resolves shipping for the requested country and prints
//! the options next to the payable total. A failed resolution still prints a
//! total, with the flat-rate estimate as shipping.

use tracing::{debug, warn};

use storefront_checkout::CheckoutSession;
use storefront_core::Destination;

use crate::render::Output;

pub async fn run(
    session: &CheckoutSession,
    output: &Output,
    country: Destination,
    promo: Option<&str>,
    carrier: Option<&str>,
) -> anyhow::Result<()> {
    session.store().refresh().await?;
    session.set_destination(country);

    let mut state = session.resolve_shipping().await?;
    debug!(status = %state.status(), "Shipping resolution finished");

    if let Some(carrier) = carrier {
        match session.select_option(carrier) {
            Ok(selected) => state = selected,
            // Not fatal: the default carrier stays selected.
            Err(e) => {
                warn!(carrier, "Carrier override rejected");
                output.error(&e);
            }
        }
    }

    if let Some(code) = promo {
        output.promo(&session.apply_promo_code(code));
    }

    output.quote(&state, &session.summary());
    Ok(())
}
