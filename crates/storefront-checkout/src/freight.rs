//! # Freight Provider
//!
//! Client for the drop-shipping supplier's carrier-rate API.
//!
//! ## Wire Format
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  POST {freight.endpoint}                                                │
//! │  CJ-Access-Token: <token>                                               │
//! │                                                                         │
//! │  ► { "startCountryCode": "CN",                                          │
//! │      "endCountryCode":   "FR",                                          │
//! │      "products": [ { "vid": "A", "quantity": 2 },                       │
//! │                    { "vid": "B", "quantity": 1 } ] }                    │
//! │                                                                         │
//! │  ◄ { "freightOptions": [ { "carrierId": "CJPacket", "freight": 4.57,    │
//! │                            "etaRange": "7-12", "currency": "USD" } ] }  │
//! │    or the supplier's envelope:                                          │
//! │    { "result": true, "data": [ { "logisticName": "CJPacket",            │
//! │                                  "logisticPrice": 4.57,                 │
//! │                                  "logisticAging": "7-12" } ] }          │
//! │    or an error payload:                                                 │
//! │    { "result": false, "message": "..." }  /  { "error": "..." }         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! An empty option list is returned as-is; turning it into a failure is the
//! resolver's decision.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use storefront_core::shipping::FreightRequest;
use storefront_core::{EtaRange, ShippingOption};

use crate::config::FreightSettings;
use crate::error::{CheckoutError, CheckoutResult};
use crate::wire::{decimal_to_money, string_or_number, ErrorBody};

const ACCESS_TOKEN_HEADER: &str = "cj-access-token";

/// Prices a freight request.
#[async_trait]
pub trait FreightProvider: Send + Sync {
    /// Returns the options in the provider's order.
    ///
    /// Error payloads come back as `CheckoutError::NoDeliveryOption` carrying
    /// the provider's message.
    async fn quote(&self, request: &FreightRequest) -> CheckoutResult<Vec<ShippingOption>>;
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FreightBody<'a> {
    start_country_code: &'a str,
    end_country_code: &'a str,
    products: Vec<FreightProductBody<'a>>,
}

#[derive(Debug, Serialize)]
struct FreightProductBody<'a> {
    vid: &'a str,
    quantity: i64,
}

impl<'a> From<&'a FreightRequest> for FreightBody<'a> {
    fn from(request: &'a FreightRequest) -> Self {
        FreightBody {
            start_country_code: request.origin.as_str(),
            end_country_code: request.destination.code(),
            products: request
                .lines
                .iter()
                .map(|line| FreightProductBody {
                    vid: &line.variant_id,
                    quantity: line.quantity,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FreightResponse {
    #[serde(default, alias = "data")]
    freight_options: Option<Vec<FreightOptionDto>>,
    #[serde(default, alias = "success")]
    result: Option<bool>,
    #[serde(default, alias = "error")]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FreightOptionDto {
    #[serde(deserialize_with = "string_or_number", alias = "logisticName")]
    carrier_id: String,
    #[serde(default)]
    carrier_name: Option<String>,
    #[serde(alias = "logisticPrice")]
    freight: Decimal,
    #[serde(default, alias = "logisticAging")]
    eta_range: Option<String>,
    #[serde(default)]
    min_days: Option<u32>,
    #[serde(default)]
    max_days: Option<u32>,
    #[serde(default)]
    currency: Option<String>,
}

impl FreightOptionDto {
    fn into_option(self, default_currency: &str) -> CheckoutResult<ShippingOption> {
        let freight = decimal_to_money(self.freight, "freight")?;
        if freight.is_negative() {
            return Err(CheckoutError::Decode(format!(
                "negative freight {} for carrier {}",
                freight, self.carrier_id
            )));
        }

        let eta = match (self.min_days, self.max_days) {
            (Some(min), Some(max)) => Some(EtaRange::new(min, max)),
            (Some(days), None) | (None, Some(days)) => Some(EtaRange::new(days, days)),
            (None, None) => self.eta_range.as_deref().and_then(|s| s.parse().ok()),
        };

        Ok(ShippingOption {
            carrier_id: self.carrier_id,
            carrier_name: self.carrier_name,
            freight,
            eta,
            currency: self
                .currency
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| default_currency.to_string()),
        })
    }
}

impl FreightResponse {
    fn into_options(self, default_currency: &str) -> CheckoutResult<Vec<ShippingOption>> {
        let message = self
            .message
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());

        let options = match (self.result, self.freight_options) {
            (Some(false), _) | (_, None) => {
                return Err(CheckoutError::NoDeliveryOption(
                    message.unwrap_or_else(|| {
                        storefront_core::shipping::NO_DELIVERY_OPTION_MESSAGE.to_string()
                    }),
                ))
            }
            (_, Some(options)) => options,
        };

        let mut parsed = Vec::with_capacity(options.len());
        for dto in options {
            match dto.into_option(default_currency) {
                Ok(option) => parsed.push(option),
                Err(e) => warn!(error = %e, "Skipping unusable freight option"),
            }
        }
        Ok(parsed)
    }
}

// =============================================================================
// HTTP Provider
// =============================================================================

/// `FreightProvider` over the supplier's HTTP API.
#[derive(Clone)]
pub struct HttpFreightProvider {
    client: reqwest::Client,
    endpoint: url::Url,
    default_currency: String,
}

impl HttpFreightProvider {
    /// Builds the client. `default_currency` is used for options that omit one.
    pub fn new(settings: &FreightSettings, default_currency: impl Into<String>) -> CheckoutResult<Self> {
        let endpoint = url::Url::parse(&settings.endpoint)?;

        let mut headers = HeaderMap::new();
        if let Some(token) = &settings.token {
            let value = HeaderValue::from_str(token.expose_secret())
                .map_err(|e| CheckoutError::InvalidConfig(format!("invalid freight token: {}", e)))?;
            headers.insert(HeaderName::from_static(ACCESS_TOKEN_HEADER), value);
        }

        // The resolver enforces the user-facing bound; this only stops a
        // dangling connection from living forever.
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(settings.timeout_secs.saturating_mul(3)))
            .build()?;

        Ok(HttpFreightProvider {
            client,
            endpoint,
            default_currency: default_currency.into(),
        })
    }
}

impl std::fmt::Debug for HttpFreightProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFreightProvider")
            .field("endpoint", &self.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl FreightProvider for HttpFreightProvider {
    #[instrument(
        skip(self, request),
        fields(destination = %request.destination, lines = request.lines.len())
    )]
    async fn quote(&self, request: &FreightRequest) -> CheckoutResult<Vec<ShippingOption>> {
        let body = FreightBody::from(request);
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = ErrorBody::message_from(&text);
            debug!(status = status.as_u16(), ?message, "Freight provider returned error status");
            return Err(match message {
                Some(message) if status.is_client_error() => CheckoutError::NoDeliveryOption(message),
                Some(message) => CheckoutError::Backend {
                    status: status.as_u16(),
                    message,
                },
                None => CheckoutError::Backend {
                    status: status.as_u16(),
                    message: "Freight provider error".to_string(),
                },
            });
        }

        let parsed: FreightResponse = serde_json::from_str(&text)?;
        let options = parsed.into_options(&self.default_currency)?;
        debug!(count = options.len(), "Freight options received");
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_core::shipping::FreightLine;
    use storefront_core::Destination;

    fn request() -> FreightRequest {
        FreightRequest {
            origin: "CN".parse().unwrap(),
            destination: Destination::Fr,
            lines: vec![
                FreightLine { variant_id: "A".into(), quantity: 2 },
                FreightLine { variant_id: "B".into(), quantity: 1 },
            ],
        }
    }

    #[test]
    fn test_request_body_shape() {
        let request = request();
        let json = serde_json::to_value(FreightBody::from(&request)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "startCountryCode": "CN",
                "endCountryCode": "FR",
                "products": [
                    {"vid": "A", "quantity": 2},
                    {"vid": "B", "quantity": 1}
                ]
            })
        );
    }

    #[test]
    fn test_parses_freight_options() {
        let response: FreightResponse = serde_json::from_str(
            r#"{"freightOptions": [
                {"carrierId": "cj-packet", "freight": 4.57, "etaRange": "7-12", "currency": "EUR"},
                {"carrierId": 42, "freight": "12", "minDays": 3, "maxDays": 5}
            ]}"#,
        )
        .unwrap();
        let options = response.into_options("USD").unwrap();

        assert_eq!(options.len(), 2);
        assert_eq!(options[0].freight.cents(), 457);
        assert_eq!(options[0].eta, Some(EtaRange::new(7, 12)));
        assert_eq!(options[0].currency, "EUR");
        assert_eq!(options[1].carrier_id, "42");
        assert_eq!(options[1].eta, Some(EtaRange::new(3, 5)));
        assert_eq!(options[1].currency, "USD");
    }

    #[test]
    fn test_parses_supplier_envelope() {
        let response: FreightResponse = serde_json::from_str(
            r#"{"code": 200, "result": true, "message": "Success", "data": [
                {"logisticName": "CJPacket Ordinary", "logisticPrice": 3.1, "logisticAging": "10-20"}
            ]}"#,
        )
        .unwrap();
        let options = response.into_options("USD").unwrap();
        assert_eq!(options[0].carrier_id, "CJPacket Ordinary");
        assert_eq!(options[0].freight.cents(), 310);
    }

    #[test]
    fn test_error_payload_becomes_no_delivery_option() {
        let response: FreightResponse =
            serde_json::from_str(r#"{"result": false, "message": "Unsupported country"}"#).unwrap();
        match response.into_options("USD") {
            Err(CheckoutError::NoDeliveryOption(msg)) => assert_eq!(msg, "Unsupported country"),
            other => panic!("expected NoDeliveryOption, got {:?}", other),
        }

        let response: FreightResponse = serde_json::from_str(r#"{"error": ""}"#).unwrap();
        match response.into_options("USD") {
            Err(CheckoutError::NoDeliveryOption(msg)) => {
                assert_eq!(msg, "No delivery option available")
            }
            other => panic!("expected NoDeliveryOption, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_list_is_not_an_error_here() {
        let response: FreightResponse = serde_json::from_str(r#"{"freightOptions": []}"#).unwrap();
        assert!(response.into_options("USD").unwrap().is_empty());
    }

    #[test]
    fn test_negative_freight_is_skipped() {
        let response: FreightResponse = serde_json::from_str(
            r#"{"freightOptions": [
                {"carrierId": "bad", "freight": -1},
                {"carrierId": "good", "freight": 2}
            ]}"#,
        )
        .unwrap();
        let options = response.into_options("USD").unwrap();
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].carrier_id, "good");
    }
}
