//! Helpers shared by the JSON clients.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};

use storefront_core::{Money, MAX_UNIT_PRICE};

use crate::error::{CheckoutError, CheckoutResult};

/// Error payload shape used by both the storefront API and the freight
/// provider: `{ "message": "..." }` or `{ "error": "..." }`.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default, alias = "error")]
    pub message: Option<String>,
}

impl ErrorBody {
    /// Extracts a non-blank message from a raw body, if there is one.
    pub fn message_from(text: &str) -> Option<String> {
        serde_json::from_str::<ErrorBody>(text)
            .ok()
            .and_then(|body| body.message)
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
    }
}

/// Accepts ids sent either as JSON strings or as integers.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

/// Converts a wire amount to `Money`, rejecting amounts above `MAX_UNIT_PRICE`.
pub(crate) fn decimal_to_money(amount: Decimal, field: &str) -> CheckoutResult<Money> {
    Money::from_decimal(amount)
        .filter(|money| *money <= MAX_UNIT_PRICE)
        .ok_or_else(|| CheckoutError::Decode(format!("{} out of range: {}", field, amount)))
}
