use std::time::Duration;

use common::{Error, Result};
use serde::de::DeserializeOwned;
use tracing::{debug, error};

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared REST client with the response handling every exchange endpoint
/// goes through.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");
        Self { client }
    }

    /// GET `url` and decode the JSON body into `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, exchange: &str, url: &str) -> Result<T> {
        debug!("Fetching from {}: {}", exchange, url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(Error::HttpError)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("{} API error: {} - {}", exchange, status, error_text);
            return Err(Error::ExchangeError(format!(
                "{} API error: {} - {}",
                exchange, status, error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::ParseError(format!("Failed to parse {} response: {}", exchange, e)))
    }
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads a price that exchanges serve either as a JSON number or a string.
pub(crate) fn json_price(value: &serde_json::Value) -> Option<f64> {
    match value.as_f64() {
        Some(price) => Some(price),
        None => value.as_str().and_then(|s| s.parse().ok()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_price_accepts_numbers_and_strings() {
        assert_eq!(json_price(&json!(42000.5)), Some(42000.5));
        assert_eq!(json_price(&json!("42000.5")), Some(42000.5));
        assert_eq!(json_price(&json!("not a price")), None);
        assert_eq!(json_price(&json!(null)), None);
        assert_eq!(json_price(&json!({"amount": 1.0})), None);
    }
}
