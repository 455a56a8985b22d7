//! # HTTP Backends
//!
//! Clients for the storefront REST API.
//!
//! ## Endpoints
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  GET    /cart                  → [{ id, productId, quantity, price,    │
//! │                                     originalPrice?, shippingSource? }]  │
//! │  POST   /cart                  ← { productId, quantity,                │
//! │                                     shippingSource? }                   │
//! │  DELETE /cart/:itemId          (404 counts as removed)                 │
//! │                                                                         │
//! │  GET    /wishlist              → [{ productId, shippingSource? }]      │
//! │  POST   /wishlist              ← { productId }                         │
//! │  DELETE /wishlist/:productId   (404 counts as removed)                 │
//! │                                                                         │
//! │  There is no PATCH. set_quantity is adapted as:                        │
//! │    GET /cart ─► capture line ─► DELETE /cart/:id ─► POST /cart         │
//! │    (re-added with the captured product id AND shipping source)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Prices arrive as JSON numbers or strings and are parsed with
//! `rust_decimal` before becoming integer cents.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument, warn};
use url::Url;

use storefront_core::{Cart, LineItem, ShippingSourceRef};

use super::{AddLine, CartBackend, WishlistBackend, WishlistEntry};
use crate::config::ApiSettings;
use crate::error::{CheckoutError, CheckoutResult};
use crate::wire::{decimal_to_money, string_or_number, ErrorBody};

// =============================================================================
// Wire Types
// =============================================================================

/// `GET /cart` and `GET /wishlist` answer with either a bare array or an
/// object wrapping it.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListBody<T> {
    Bare(Vec<T>),
    Wrapped {
        #[serde(alias = "data", alias = "cart", alias = "wishlist")]
        items: Vec<T>,
    },
}

impl<T> ListBody<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            ListBody::Bare(items) | ListBody::Wrapped { items } => items,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShippingSourceDto {
    #[serde(alias = "vid", alias = "cjVariantId")]
    variant_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LineItemDto {
    #[serde(deserialize_with = "string_or_number", alias = "_id")]
    id: String,
    #[serde(deserialize_with = "string_or_number")]
    product_id: String,
    quantity: i64,
    #[serde(alias = "unitPrice")]
    price: Decimal,
    #[serde(default, alias = "originalUnitPrice")]
    original_price: Option<Decimal>,
    #[serde(default)]
    shipping_source: Option<ShippingSourceDto>,
    /// Flat variant id, for payloads that do not nest it.
    #[serde(default, alias = "vid", alias = "cjVariantId")]
    variant_id: Option<String>,
}

impl LineItemDto {
    fn into_line_item(self) -> CheckoutResult<LineItem> {
        let unit_price = decimal_to_money(self.price, "price")?;
        let original_unit_price = self
            .original_price
            .map(|p| decimal_to_money(p, "originalPrice"))
            .transpose()?;

        let shipping_source = self
            .shipping_source
            .map(|s| s.variant_id)
            .or(self.variant_id)
            .map(ShippingSourceRef::new);

        Ok(LineItem {
            id: self.id,
            product_id: self.product_id,
            quantity: self.quantity,
            unit_price,
            original_unit_price,
            shipping_source,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WishlistEntryDto {
    #[serde(deserialize_with = "string_or_number")]
    product_id: String,
    #[serde(default)]
    shipping_source: Option<ShippingSourceDto>,
    #[serde(default, alias = "vid", alias = "cjVariantId")]
    variant_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AddLineBody<'a> {
    product_id: &'a str,
    quantity: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    shipping_source: Option<ShippingSourceDto>,
}

impl<'a> From<&'a AddLine> for AddLineBody<'a> {
    fn from(line: &'a AddLine) -> Self {
        AddLineBody {
            product_id: &line.product_id,
            quantity: line.quantity,
            shipping_source: line.shipping_source.as_ref().map(|s| ShippingSourceDto {
                variant_id: s.variant_id.clone(),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AddWishlistBody<'a> {
    product_id: &'a str,
}

// =============================================================================
// Shared HTTP Plumbing
// =============================================================================

/// Authenticated client bound to the API base URL.
#[derive(Clone)]
struct ApiClient {
    client: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    fn new(settings: &ApiSettings) -> CheckoutResult<Self> {
        let mut base = settings.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)?;

        let mut headers = HeaderMap::new();
        if let Some(token) = &settings.token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
                .map_err(|e| CheckoutError::InvalidConfig(format!("invalid API token: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(settings.request_timeout_secs))
            .build()?;

        Ok(ApiClient { client, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> CheckoutResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CheckoutError::InvalidConfig("API base URL cannot be a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> CheckoutResult<T> {
        let url = self.endpoint(segments)?;
        debug!(%url, "GET");
        let response = self.client.get(url).send().await?;
        handle_response(response).await
    }

    async fn post<B: Serialize + Sync>(&self, segments: &[&str], body: &B) -> CheckoutResult<()> {
        let url = self.endpoint(segments)?;
        debug!(%url, "POST");
        let response = self.client.post(url).json(body).send().await?;
        if response.status().is_success() {
            return Ok(());
        }
        Err(parse_error(response).await)
    }

    /// DELETE where 404 means "already gone".
    async fn delete(&self, segments: &[&str]) -> CheckoutResult<()> {
        let url = self.endpoint(segments)?;
        debug!(%url, "DELETE");
        let response = self.client.delete(url).send().await?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }

        Err(parse_error(response).await)
    }
}

async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> CheckoutResult<T> {
    if response.status().is_success() {
        return response
            .json()
            .await
            .map_err(|e| CheckoutError::Decode(format!("Failed to parse response: {}", e)));
    }
    Err(parse_error(response).await)
}

async fn parse_error(response: reqwest::Response) -> CheckoutError {
    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();

    let message = match ErrorBody::message_from(&text) {
        Some(message) => message,
        None if text.trim().is_empty() => "Unknown error".to_string(),
        None => text,
    };

    CheckoutError::Backend { status, message }
}

// =============================================================================
// Cart Backend
// =============================================================================

/// `CartBackend` over the storefront REST API.
#[derive(Clone)]
pub struct HttpCartBackend {
    api: ApiClient,
}

impl HttpCartBackend {
    pub fn new(settings: &ApiSettings) -> CheckoutResult<Self> {
        Ok(HttpCartBackend {
            api: ApiClient::new(settings)?,
        })
    }
}

impl std::fmt::Debug for HttpCartBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCartBackend")
            .field("base_url", &self.api.base_url.as_str())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CartBackend for HttpCartBackend {
    #[instrument(skip(self))]
    async fn fetch(&self) -> CheckoutResult<Cart> {
        let body: ListBody<LineItemDto> = self.api.get(&["cart"]).await?;
        let items = body
            .into_vec()
            .into_iter()
            .map(LineItemDto::into_line_item)
            .collect::<CheckoutResult<Vec<_>>>()?;
        Ok(Cart::from_items(items)?)
    }

    #[instrument(skip(self, line), fields(product_id = %line.product_id, quantity = line.quantity))]
    async fn add(&self, line: &AddLine) -> CheckoutResult<()> {
        self.api.post(&["cart"], &AddLineBody::from(line)).await
    }

    #[instrument(skip(self))]
    async fn remove(&self, item_id: &str) -> CheckoutResult<()> {
        self.api.delete(&["cart", item_id]).await
    }

    /// Legacy adapter: the API has no update endpoint.
    ///
    /// The line is captured first so the re-add carries the same product id
    /// and shipping source. If the re-add fails after the delete succeeded
    /// the line is gone; the error is returned and the caller's re-read shows
    /// the real state.
    #[instrument(skip(self))]
    async fn set_quantity(&self, item_id: &str, quantity: i64) -> CheckoutResult<()> {
        let cart = self.fetch().await?;
        let Some(line) = cart.get(item_id).cloned() else {
            debug!("Line not in cart, nothing to update");
            return Ok(());
        };

        if quantity < 1 {
            return self.remove(item_id).await;
        }
        if quantity == line.quantity {
            return Ok(());
        }

        self.remove(item_id).await?;

        let re_add = AddLine {
            product_id: line.product_id.clone(),
            quantity,
            shipping_source: line.shipping_source.clone(),
        };
        if let Err(e) = self.add(&re_add).await {
            error!(
                product_id = %line.product_id,
                previous_quantity = line.quantity,
                error = %e,
                "Re-add failed after removing line; line lost"
            );
            return Err(e);
        }
        Ok(())
    }
}

// =============================================================================
// Wishlist Backend
// =============================================================================

/// `WishlistBackend` over the storefront REST API.
#[derive(Clone)]
pub struct HttpWishlistBackend {
    api: ApiClient,
}

impl HttpWishlistBackend {
    pub fn new(settings: &ApiSettings) -> CheckoutResult<Self> {
        Ok(HttpWishlistBackend {
            api: ApiClient::new(settings)?,
        })
    }
}

#[async_trait]
impl WishlistBackend for HttpWishlistBackend {
    #[instrument(skip(self))]
    async fn fetch(&self) -> CheckoutResult<Vec<WishlistEntry>> {
        let body: ListBody<WishlistEntryDto> = self.api.get(&["wishlist"]).await?;
        Ok(body
            .into_vec()
            .into_iter()
            .map(|dto| WishlistEntry {
                product_id: dto.product_id,
                shipping_source: dto
                    .shipping_source
                    .map(|s| s.variant_id)
                    .or(dto.variant_id)
                    .map(ShippingSourceRef::new),
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn add(&self, product_id: &str) -> CheckoutResult<()> {
        match self
            .api
            .post(&["wishlist"], &AddWishlistBody { product_id })
            .await
        {
            Err(CheckoutError::Backend { status: 409, .. }) => {
                warn!("Product already on wishlist");
                Ok(())
            }
            other => other,
        }
    }

    #[instrument(skip(self))]
    async fn remove(&self, product_id: &str) -> CheckoutResult<()> {
        self.api.delete(&["wishlist", product_id]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_dto_accepts_numbers_and_nested_variant() {
        let json = r#"[
            {"id": 17, "productId": "p-1", "quantity": 2, "price": 19.99,
             "originalPrice": "24.99", "shippingSource": {"variantId": "V-A"}},
            {"_id": "l2", "productId": 5, "quantity": 1, "unitPrice": 3, "vid": "V-B"},
            {"id": "l3", "productId": "p-3", "quantity": 1, "price": 0.5}
        ]"#;
        let body: ListBody<LineItemDto> = serde_json::from_str(json).unwrap();
        let items: Vec<LineItem> = body
            .into_vec()
            .into_iter()
            .map(|d| d.into_line_item().unwrap())
            .collect();

        assert_eq!(items[0].id, "17");
        assert_eq!(items[0].unit_price.cents(), 1_999);
        assert_eq!(items[0].original_unit_price.unwrap().cents(), 2_499);
        assert_eq!(items[0].shipping_source.as_ref().unwrap().variant_id, "V-A");

        assert_eq!(items[1].product_id, "5");
        assert_eq!(items[1].shipping_source.as_ref().unwrap().variant_id, "V-B");

        assert_eq!(items[2].unit_price.cents(), 50);
        assert!(items[2].shipping_source.is_none());
    }

    #[test]
    fn test_wrapped_list_body() {
        let json = r#"{"items": [{"id": "l1", "productId": "p", "quantity": 1, "price": 1}]}"#;
        let body: ListBody<LineItemDto> = serde_json::from_str(json).unwrap();
        assert_eq!(body.into_vec().len(), 1);
    }

    #[test]
    fn test_add_body_carries_shipping_source() {
        let line = AddLine::new("p-1", 3).with_shipping_source("V-A");
        let json = serde_json::to_value(AddLineBody::from(&line)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "productId": "p-1",
                "quantity": 3,
                "shippingSource": {"variantId": "V-A"}
            })
        );

        let plain = serde_json::to_value(AddLineBody::from(&AddLine::new("p-2", 1))).unwrap();
        assert!(plain.get("shippingSource").is_none());
    }

    #[test]
    fn test_endpoint_escapes_item_ids() {
        let api = ApiClient::new(&ApiSettings {
            base_url: "https://shop.example.com/api".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            api.endpoint(&["cart", "a/b c"]).unwrap().as_str(),
            "https://shop.example.com/api/cart/a%2Fb%20c"
        );
    }
}
