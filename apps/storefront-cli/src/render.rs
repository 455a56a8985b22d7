//! Text and JSON output.

use serde::Serialize;
use serde_json::json;

use storefront_checkout::{CartSnapshot, CheckoutError, WishlistEntry};
use storefront_core::discount::PromoOutcome;
use storefront_core::shipping::ResolutionState;
use storefront_core::summary::{CheckoutSummary, ShippingBasis};

/// Where command results go.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    json: bool,
}

impl Output {
    pub fn new(json: bool) -> Self {
        Output { json }
    }

    pub fn cart(&self, snapshot: &CartSnapshot, summary: &CheckoutSummary) {
        if self.json {
            return self.print_json(&json!({
                "revision": snapshot.revision,
                "fetchedAt": snapshot.fetched_at,
                "cart": snapshot.cart,
                "summary": summary,
            }));
        }

        if snapshot.cart.is_empty() {
            println!("Cart is empty");
        } else {
            println!("{:<38} {:<20} {:>4} {:>10}", "LINE", "PRODUCT", "QTY", "TOTAL");
            for item in snapshot.cart.items() {
                let marker = if item.is_drop_shipped() { " *" } else { "" };
                println!(
                    "{:<38} {:<20} {:>4} {:>10}{}",
                    item.id,
                    item.product_id,
                    item.quantity,
                    item.line_total(),
                    marker
                );
            }
            if snapshot.cart.has_drop_shipped() {
                println!("  * ships from supplier");
            }
        }
        println!();
        self.print_summary(summary);
    }

    pub fn quote(&self, state: &ResolutionState, summary: &CheckoutSummary) {
        if self.json {
            return self.print_json(&json!({ "shipping": state, "summary": summary }));
        }

        let selected = state.selected_option().map(|o| o.carrier_id.as_str());
        for option in state.options() {
            let mark = if Some(option.carrier_id.as_str()) == selected { ">" } else { " " };
            let eta = option
                .eta
                .map(|e| e.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{} {:<24} {:>10} {:<4} {}",
                mark, option.carrier_id, option.freight, option.currency, eta
            );
        }
        if let Some(reason) = state.failure() {
            println!("Shipping: {}", reason);
        }
        println!();
        self.print_summary(summary);
    }

    pub fn promo(&self, outcome: &PromoOutcome) {
        if self.json {
            return self.print_json(outcome);
        }
        match outcome {
            PromoOutcome::Applied { promo, discount } => {
                println!("Promo {} applied: -{}", promo.code, discount)
            }
            PromoOutcome::Rejected { code, reason } => println!("Promo {}: {}", code, reason),
        }
    }

    pub fn wishlist(&self, entries: &[WishlistEntry]) {
        if self.json {
            return self.print_json(&entries);
        }
        if entries.is_empty() {
            println!("Wishlist is empty");
        }
        for entry in entries {
            match &entry.shipping_source {
                Some(source) => println!("{} (variant {})", entry.product_id, source.variant_id),
                None => println!("{}", entry.product_id),
            }
        }
    }

    pub fn message(&self, text: &str) {
        if self.json {
            return self.print_json(&json!({ "message": text }));
        }
        println!("{}", text);
    }

    /// Prints a checkout error as an inline message.
    pub fn error(&self, err: &CheckoutError) {
        let msg = err.to_user_message();
        if self.json {
            return self.print_json(&json!({ "error": msg }));
        }
        let hint = if msg.retryable { " (try again)" } else { "" };
        eprintln!("error: {}{}", msg.message, hint);
    }

    /// Prints any command failure.
    pub fn failure(&self, err: &anyhow::Error) {
        match err.downcast_ref::<CheckoutError>() {
            Some(checkout) => self.error(checkout),
            None if self.json => self.print_json(&json!({ "error": { "message": err.to_string() } })),
            None => eprintln!("error: {:#}", err),
        }
    }

    fn print_summary(&self, summary: &CheckoutSummary) {
        println!("Subtotal:      {:>10}", summary.subtotal);
        if summary.total_savings.is_positive() {
            println!(
                "You save:      {:>10}  (avg {}% off)",
                summary.total_savings, summary.average_discount
            );
        }
        let basis = match &summary.shipping_basis {
            ShippingBasis::FlatRate => "flat rate".to_string(),
            ShippingBasis::Carrier { carrier_id } => carrier_id.clone(),
            ShippingBasis::Pending => "estimate, resolving".to_string(),
            ShippingBasis::Estimate { reason } => format!("estimate, unconfirmed: {}", reason),
        };
        println!("Shipping:      {:>10}  ({})", summary.shipping, basis);
        if let Some(code) = &summary.promo_code {
            println!("Promo {:<8} {:>10}", code, format!("-{}", summary.promo_discount));
        }
        println!("Total:         {:>10}", summary.total);
        if summary.anomalous {
            println!("  (discount exceeds order value; total clamped to 0)");
        }
    }

    fn print_json<T: Serialize + ?Sized>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("error: failed to encode output: {}", e),
        }
    }
}
