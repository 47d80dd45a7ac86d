use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{
    models::{CurrencyPair, Exchange},
    Result,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info};

use crate::{http::json_price, ApiClient, ConnectorEvent, ExchangeConnector, UpdateMode};

const BINANCE_API_URL: &str = "https://api.binance.com";
const BINANCE_WS_URL: &str = "wss://stream.binance.com:9443/ws";

/// Binance trade streams over a single multiplexed websocket.
///
/// One socket carries every selected pair; a SUBSCRIBE frame names the
/// streams and trade events are routed back to pairs by symbol.
pub struct BinanceConnector {
    client: ApiClient,
    api_url: String,
    ws_url: String,
    selected: Arc<RwLock<Vec<CurrencyPair>>>,
    socket: Mutex<Option<JoinHandle<()>>>,
    events: mpsc::Sender<ConnectorEvent>,
}

impl BinanceConnector {
    pub fn new(events: mpsc::Sender<ConnectorEvent>) -> Self {
        Self::with_base_urls(events, BINANCE_API_URL, BINANCE_WS_URL)
    }

    pub fn with_base_urls(
        events: mpsc::Sender<ConnectorEvent>,
        api_url: impl Into<String>,
        ws_url: impl Into<String>,
    ) -> Self {
        Self {
            client: ApiClient::new(),
            api_url: api_url.into(),
            ws_url: ws_url.into(),
            selected: Arc::new(RwLock::new(Vec::new())),
            socket: Mutex::new(None),
            events,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
struct SymbolInfo {
    symbol: String,
    status: String,
    #[serde(rename = "baseAsset")]
    base_asset: String,
    #[serde(rename = "quoteAsset")]
    quote_asset: String,
}

async fn run_socket(
    ws_url: String,
    pairs: Vec<CurrencyPair>,
    events: mpsc::Sender<ConnectorEvent>,
) {
    let (stream, _) = match connect_async(ws_url.as_str()).await {
        Ok(connection) => connection,
        Err(e) => {
            error!("Binance websocket connect failed: {}", e);
            return;
        }
    };
    let (mut write, mut read) = stream.split();

    let params: Vec<String> = pairs
        .iter()
        .map(|pair| format!("{}@trade", pair.exchange_symbol().to_lowercase()))
        .collect();
    let subscribe = json!({
        "method": "SUBSCRIBE",
        "params": params,
        "id": 1,
    });
    if let Err(e) = write.send(Message::Text(subscribe.to_string())).await {
        error!("Binance subscribe failed: {}", e);
        return;
    }
    info!("Subscribed to {} Binance trade streams", params.len());

    let by_symbol: HashMap<String, CurrencyPair> = pairs
        .into_iter()
        .map(|pair| (pair.exchange_symbol().to_uppercase(), pair))
        .collect();

    while let Some(message) = read.next().await {
        match message {
            Ok(Message::Text(text)) => {
                // Subscribe acks ({"result":null,"id":1}) parse to None.
                if let Some((symbol, price)) = parse_trade(&text) {
                    match by_symbol.get(&symbol) {
                        Some(pair) => {
                            let update = ConnectorEvent::PriceUpdated {
                                exchange: Exchange::Binance,
                                pair: pair.clone(),
                                price,
                            };
                            if events.send(update).await.is_err() {
                                return;
                            }
                        }
                        None => {
                            debug!("Dropping Binance trade for unselected symbol {}", symbol)
                        }
                    }
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = write.send(Message::Pong(payload)).await;
            }
            Ok(Message::Close(_)) => {
                info!("Binance websocket closed");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                error!("Binance websocket error: {}", e);
                return;
            }
        }
    }
}

/// Extracts (symbol, price) from a trade event frame.
fn parse_trade(text: &str) -> Option<(String, f64)> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    if value["e"] != "trade" {
        return None;
    }
    let symbol = value["s"].as_str()?.to_string();
    let price = json_price(&value["p"])?;
    Some((symbol, price))
}

#[async_trait]
impl ExchangeConnector for BinanceConnector {
    fn exchange(&self) -> Exchange {
        Exchange::Binance
    }

    fn update_mode(&self) -> UpdateMode {
        UpdateMode::RealTime
    }

    async fn load_pairs(&self) -> Result<Vec<CurrencyPair>> {
        let url = format!("{}/api/v3/exchangeInfo", self.api_url);

        let info: ExchangeInfo = self.client.get_json("Binance", &url).await?;

        let pairs = info
            .symbols
            .into_iter()
            .filter(|symbol| symbol.status == "TRADING")
            .filter_map(|symbol| {
                let pair = CurrencyPair::from_codes(&symbol.base_asset, &symbol.quote_asset)?;
                Some(CurrencyPair::with_code(pair.base, pair.quote, symbol.symbol))
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

        let mut socket = self.socket.lock().await;
        if let Some(handle) = socket.take() {
            handle.abort();
        }
        if pairs.is_empty() {
            return;
        }

        let ws_url = self.ws_url.clone();
        let events = self.events.clone();
        *socket = Some(tokio::spawn(run_socket(ws_url, pairs, events)));
    }

    async fn stop(&self) {
        let mut socket = self.socket.lock().await;
        if let Some(handle) = socket.take() {
            handle.abort();
        }
        info!("Binance connector stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trade_frames_yield_symbol_and_price() {
        let frame = r#"{"e":"trade","E":1700000000000,"s":"BTCUSDT","t":1,"p":"43210.50000000","q":"0.001"}"#;
        assert_eq!(parse_trade(frame), Some(("BTCUSDT".to_string(), 43210.5)));
    }

    #[test]
    fn subscribe_acks_are_ignored() {
        assert_eq!(parse_trade(r#"{"result":null,"id":1}"#), None);
        assert_eq!(
            parse_trade(r#"{"e":"aggTrade","s":"BTCUSDT","p":"1.0"}"#),
            None
        );
        assert_eq!(parse_trade("garbage"), None);
    }
}
