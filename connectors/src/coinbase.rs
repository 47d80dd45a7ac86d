use std::sync::Arc;

use async_trait::async_trait;
use common::{
    models::{CurrencyPair, Exchange},
    Error, Result,
};
use futures_util::future::join_all;
use serde::Deserialize;
use tokio::sync::{mpsc, RwLock};
use tracing::error;

use crate::{ApiClient, ConnectorEvent, ExchangeConnector, UpdateMode};

const COINBASE_API_URL: &str = "https://api.coinbase.com/v2";
const COINBASE_EXCHANGE_API_URL: &str = "https://api.exchange.coinbase.com";

/// Coinbase spot prices over REST. No streaming endpoint is used, so the
/// coordinator polls this connector.
pub struct CoinbaseConnector {
    client: ApiClient,
    api_url: String,
    exchange_api_url: String,
    selected: Arc<RwLock<Vec<CurrencyPair>>>,
    events: mpsc::Sender<ConnectorEvent>,
}

impl CoinbaseConnector {
    pub fn new(events: mpsc::Sender<ConnectorEvent>) -> Self {
        Self::with_base_urls(events, COINBASE_API_URL, COINBASE_EXCHANGE_API_URL)
    }

    pub fn with_base_urls(
        events: mpsc::Sender<ConnectorEvent>,
        api_url: impl Into<String>,
        exchange_api_url: impl Into<String>,
    ) -> Self {
        Self {
            client: ApiClient::new(),
            api_url: api_url.into(),
            exchange_api_url: exchange_api_url.into(),
            selected: Arc::new(RwLock::new(Vec::new())),
            events,
        }
    }

    fn format_product_id(&self, pair: &CurrencyPair) -> String {
        format!("{}-{}", pair.base.code(), pair.quote.code())
    }

    async fn fetch_pair(&self, pair: &CurrencyPair) -> Result<f64> {
        let url = format!(
            "{}/prices/{}/spot",
            self.api_url,
            self.format_product_id(pair)
        );

        let response: CoinbaseResponse<CoinbaseSpotPrice> =
            self.client.get_json("Coinbase", &url).await?;

        response
            .data
            .amount
            .parse::<f64>()
            .map_err(|e| Error::ParseError(format!("Failed to parse price: {}", e)))
    }
}

#[derive(Debug, Deserialize)]
struct CoinbaseResponse<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct CoinbaseSpotPrice {
    amount: String,
}

#[async_trait]
impl ExchangeConnector for CoinbaseConnector {
    fn exchange(&self) -> Exchange {
        Exchange::Coinbase
    }

    fn update_mode(&self) -> UpdateMode {
        UpdateMode::Polling
    }

    async fn load_pairs(&self) -> Result<Vec<CurrencyPair>> {
        let url = format!("{}/products", self.exchange_api_url);

        #[derive(Debug, Deserialize)]
        struct Product {
            base_currency: String,
            quote_currency: String,
        }

        let products: Vec<Product> = self.client.get_json("Coinbase", &url).await?;

        let pairs = products
            .iter()
            .filter_map(|product| {
                CurrencyPair::from_codes(&product.base_currency, &product.quote_currency)
            })
            .filter(|pair| pair.base.is_crypto() && pair.base != pair.quote)
            .collect();

        Ok(pairs)
    }

    async fn set_selected_pairs(&self, pairs: Vec<CurrencyPair>) {
        *self.selected.write().await = pairs;
    }

    async fn fetch(&self) {
        let pairs = self.selected.read().await.clone();

        let results = join_all(pairs.iter().map(|pair| self.fetch_pair(pair))).await;
        for (pair, result) in pairs.iter().zip(results) {
            match result {
                Ok(price) => {
                    let _ = self
                        .events
                        .send(ConnectorEvent::PriceUpdated {
                            exchange: Exchange::Coinbase,
                            pair: pair.clone(),
                            price,
                        })
                        .await;
                }
                Err(e) => error!("Coinbase fetch failed for {}: {}", pair, e),
            }
        }

        let _ = self
            .events
            .send(ConnectorEvent::FetchCompleted {
                exchange: Exchange::Coinbase,
            })
            .await;
    }

    async fn stop(&self) {}
}
