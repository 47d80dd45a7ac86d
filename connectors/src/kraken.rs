use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{
    models::{Currency, CurrencyPair, Exchange},
    Error, Result,
};
use futures_util::future::join_all;
use serde::Deserialize;
use tokio::sync::{mpsc, RwLock};
use tracing::error;

use crate::{ApiClient, ConnectorEvent, ExchangeConnector, UpdateMode};

const KRAKEN_API_URL: &str = "https://api.kraken.com";

/// Kraken public ticker over REST. Pair symbols come from the AssetPairs
/// listing and must be sent back verbatim, so every discovered pair carries
/// Kraken's own code (e.g. "XXBTZUSD").
pub struct KrakenConnector {
    client: ApiClient,
    api_url: String,
    selected: Arc<RwLock<Vec<CurrencyPair>>>,
    events: mpsc::Sender<ConnectorEvent>,
}

impl KrakenConnector {
    pub fn new(events: mpsc::Sender<ConnectorEvent>) -> Self {
        Self::with_base_url(events, KRAKEN_API_URL)
    }

    pub fn with_base_url(
        events: mpsc::Sender<ConnectorEvent>,
        api_url: impl Into<String>,
    ) -> Self {
        Self {
            client: ApiClient::new(),
            api_url: api_url.into(),
            selected: Arc::new(RwLock::new(Vec::new())),
            events,
        }
    }

    async fn fetch_pair(&self, pair: &CurrencyPair) -> Result<f64> {
        let url = format!(
            "{}/0/public/Ticker?pair={}",
            self.api_url,
            pair.exchange_symbol()
        );

        let response: KrakenResponse<HashMap<String, KrakenTicker>> =
            self.client.get_json("Kraken", &url).await?;
        let tickers = kraken_result(response)?;

        let ticker = tickers
            .into_values()
            .next()
            .ok_or_else(|| Error::ParseError("Kraken ticker response was empty".into()))?;
        let last = ticker
            .c
            .first()
            .ok_or_else(|| Error::ParseError("Kraken ticker had no last trade".into()))?;

        last.parse::<f64>()
            .map_err(|e| Error::ParseError(format!("Failed to parse price: {}", e)))
    }
}

#[derive(Debug, Deserialize)]
struct KrakenResponse<T> {
    error: Vec<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct KrakenAssetPair {
    altname: String,
    base: String,
    quote: String,
}

#[derive(Debug, Deserialize)]
struct KrakenTicker {
    /// Last trade closed: [price, lot volume].
    c: Vec<String>,
}

fn kraken_result<T>(response: KrakenResponse<T>) -> Result<T> {
    if !response.error.is_empty() {
        return Err(Error::ExchangeError(format!(
            "Kraken API error: {}",
            response.error.join(", ")
        )));
    }
    response
        .result
        .ok_or_else(|| Error::ParseError("Kraken response missing result".into()))
}

#[async_trait]
impl ExchangeConnector for KrakenConnector {
    fn exchange(&self) -> Exchange {
        Exchange::Kraken
    }

    fn update_mode(&self) -> UpdateMode {
        UpdateMode::Polling
    }

    async fn load_pairs(&self) -> Result<Vec<CurrencyPair>> {
        let url = format!("{}/0/public/AssetPairs", self.api_url);

        let response: KrakenResponse<HashMap<String, KrakenAssetPair>> =
            self.client.get_json("Kraken", &url).await?;
        let assets = kraken_result(response)?;

        let pairs = assets
            .into_iter()
            // ".d" suffixed altnames are dark pool listings
            .filter(|(_, info)| !info.altname.ends_with(".d"))
            .filter_map(|(symbol, info)| {
                let base = Currency::from_code(&info.base)?;
                let quote = Currency::from_code(&info.quote)?;
                Some(CurrencyPair::with_code(base, quote, symbol))
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
                            exchange: Exchange::Kraken,
                            pair: pair.clone(),
                            price,
                        })
                        .await;
                }
                Err(e) => error!("Kraken fetch failed for {}: {}", pair, e),
            }
        }

        let _ = self
            .events
            .send(ConnectorEvent::FetchCompleted {
                exchange: Exchange::Kraken,
            })
            .await;
    }

    async fn stop(&self) {}
}
