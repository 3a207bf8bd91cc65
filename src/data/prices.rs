//! yugiohprices.com API client
//!
//! Fetches card price records and set card listings. The client owns no state
//! beyond its HTTP connection pool and never retries a failed request.

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use thiserror::Error;

use super::{PriceRecord, Prices};

/// Base URL for the yugiohprices.com API
pub const YGOPRICES_BASE_URL: &str = "http://yugiohprices.com/api";

/// Errors that can occur when fetching a resource
///
/// Every variant carries the resource path so callers can log it.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, DNS or timeout failure
    #[error("Request for {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-2xx status
    #[error("Request for {path} returned HTTP {status}")]
    HttpStatus { path: String, status: u16 },

    /// The body is not JSON or lacks a field this client inspects
    #[error("Failed to decode response for {path}: {reason}")]
    Decode { path: String, reason: String },
}

impl FetchError {
    /// Returns the resource path of the failed request
    pub fn path(&self) -> &str {
        match self {
            FetchError::Transport { path, .. }
            | FetchError::HttpStatus { path, .. }
            | FetchError::Decode { path, .. } => path,
        }
    }
}

/// Resource path for a card's price record
pub fn card_price_path(name: &str) -> String {
    format!("price_for_card/{}", urlencoding::encode(name))
}

/// Resource path for a set's card listing
pub fn set_data_path(set_name: &str) -> String {
    format!("set_data/{}", urlencoding::encode(set_name))
}

/// Client for the yugiohprices.com price and set endpoints
#[derive(Debug, Clone)]
pub struct PriceClient {
    http_client: Client,
    base_url: String,
}

impl Default for PriceClient {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceClient {
    /// Creates a new PriceClient pointing at the public API
    pub fn new() -> Self {
        Self::with_base_url(YGOPRICES_BASE_URL)
    }

    /// Creates a new PriceClient with a custom base URL
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Applies a request timeout by rebuilding the HTTP client
    ///
    /// Without a timeout a request waits until the transport gives up.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, reqwest::Error> {
        self.http_client = Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    /// Fetches one resource and parses its body as JSON
    ///
    /// # Arguments
    /// * `resource_path` - Path relative to the base URL, e.g. `price_for_card/Dark%20Magician`
    pub async fn fetch(&self, resource_path: &str) -> Result<Value, FetchError> {
        let url = format!("{}/{}", self.base_url, resource_path);
        log::debug!("GET {}", url);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                path: resource_path.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                path: resource_path.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| FetchError::Transport {
                path: resource_path.to_string(),
                source,
            })?;

        serde_json::from_slice(&body).map_err(|e| FetchError::Decode {
            path: resource_path.to_string(),
            reason: e.to_string(),
        })
    }

    /// Fetches the current price record for a card
    ///
    /// # Arguments
    /// * `name` - Card name, used verbatim as the record identity
    /// * `fetched_at` - Unix timestamp stamped onto the new record
    pub async fn fetch_card_price(
        &self,
        name: &str,
        fetched_at: i64,
    ) -> Result<PriceRecord, FetchError> {
        let path = card_price_path(name);
        let body = self.fetch(&path).await?;
        parse_price_record(&path, name, body, fetched_at)
    }

    /// Fetches the names of all cards in a set, in listing order
    pub async fn fetch_set_cards(&self, set_name: &str) -> Result<Vec<String>, FetchError> {
        let path = set_data_path(set_name);
        let body = self.fetch(&path).await?;
        parse_set_cards(&path, &body)
    }
}

/// Builds a PriceRecord from a price response body
///
/// Prices are looked up at `prices`, `data.prices`, and the live service's
/// `data[0].price_data.data.prices`, in that order.
pub fn parse_price_record(
    path: &str,
    identity: &str,
    body: Value,
    fetched_at: i64,
) -> Result<PriceRecord, FetchError> {
    let decode_error = |reason: &str| FetchError::Decode {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    let prices_value = ["/prices", "/data/prices", "/data/0/price_data/data/prices"]
        .iter()
        .find_map(|pointer| body.pointer(pointer))
        .ok_or_else(|| decode_error("missing prices object"))?;

    let field = |name: &str| {
        prices_value
            .get(name)
            .and_then(price_number)
            .ok_or_else(|| decode_error(&format!("missing or non-numeric price field '{}'", name)))
    };

    let prices = Prices {
        low: field("low")?,
        average: field("average")?,
        high: field("high")?,
    };

    let raw_fields = match body {
        Value::Object(map) => map,
        _ => return Err(decode_error("response body is not an object")),
    };

    Ok(PriceRecord {
        card_identity: identity.to_string(),
        prices,
        fetched_at,
        raw_fields,
    })
}

/// Accepts JSON numbers and numeric strings ("1.25"); NaN and infinities are rejected
fn price_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

/// Extracts card names from a set listing body
///
/// Accepts a top-level array or `data.cards`; entries are `{ "name": ... }`
/// objects or bare strings.
pub fn parse_set_cards(path: &str, body: &Value) -> Result<Vec<String>, FetchError> {
    let cards = body
        .as_array()
        .or_else(|| body.pointer("/data/cards").and_then(Value::as_array))
        .ok_or_else(|| FetchError::Decode {
            path: path.to_string(),
            reason: "missing card listing".to_string(),
        })?;

    cards
        .iter()
        .enumerate()
        .map(|(index, card)| {
            let name = match card {
                Value::String(name) => Some(name.as_str()),
                other => other.get("name").and_then(Value::as_str),
            };
            name.map(str::to_string).ok_or_else(|| FetchError::Decode {
                path: path.to_string(),
                reason: format!("card #{} has no name", index),
            })
        })
        .collect()
}
