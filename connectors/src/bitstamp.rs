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

const BITSTAMP_API_URL: &str = "https://www.bitstamp.net";
const BITSTAMP_WS_URL: &str = "wss://ws.bitstamp.net";

/// Bitstamp live trades over websockets, one socket per selected pair.
///
/// Each socket subscribes to the pair's `live_trades_*` channel and forwards
/// trade events as price updates. A socket that errors out stays down until
/// the next `fetch`; prices meanwhile keep coming from other exchanges.
pub struct BitstampConnector {
    client: ApiClient,
    api_url: String,
    ws_url: String,
    selected: Arc<RwLock<Vec<CurrencyPair>>>,
    sockets: Mutex<Vec<JoinHandle<()>>>,
    events: mpsc::Sender<ConnectorEvent>,
}

impl BitstampConnector {
    pub fn new(events: mpsc::Sender<ConnectorEvent>) -> Self {
        Self::with_base_urls(events, BITSTAMP_API_URL, BITSTAMP_WS_URL)
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
            sockets: Mutex::new(Vec::new()),
            events,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TradingPairInfo {
    name: String,
    url_symbol: String,
}

async fn run_socket(ws_url: String, pair: CurrencyPair, events: mpsc::Sender<ConnectorEvent>) {
    let (stream, _) = match connect_async(ws_url.as_str()).await {
        Ok(connection) => connection,
        Err(e) => {
            error!("Bitstamp websocket connect failed for {}: {}", pair, e);
            return;
        }
    };
    let (mut write, mut read) = stream.split();

    let subscribe = json!({
        "event": "bts:subscribe",
        "data": { "channel": format!("live_trades_{}", pair.exchange_symbol()) },
    });
    if let Err(e) = write.send(Message::Text(subscribe.to_string())).await {
        error!("Bitstamp subscribe failed for {}: {}", pair, e);
        return;
    }
    info!("Subscribed to Bitstamp trades for {}", pair);

    while let Some(message) = read.next().await {
        match message {
            Ok(Message::Text(text)) => {
                if let Some(price) = parse_trade_price(&text) {
                    let update = ConnectorEvent::PriceUpdated {
                        exchange: Exchange::Bitstamp,
                        pair: pair.clone(),
                        price,
                    };
                    if events.send(update).await.is_err() {
                        return;
                    }
                } else {
                    debug!("Ignoring Bitstamp frame for {}", pair);
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = write.send(Message::Pong(payload)).await;
            }
            Ok(Message::Close(_)) => {
                info!("Bitstamp websocket closed for {}", pair);
                return;
            }
            Ok(_) => {}
            Err(e) => {
                error!("Bitstamp websocket error for {}: {}", pair, e);
                return;
            }
        }
    }
}

/// Extracts the trade price from a raw frame. Subscription acks and other
/// channel events yield `None`.
fn parse_trade_price(text: &str) -> Option<f64> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    if value["event"] != "trade" {
        return None;
    }
    json_price(&value["data"]["price"])
}

#[async_trait]
impl ExchangeConnector for BitstampConnector {
    fn exchange(&self) -> Exchange {
        Exchange::Bitstamp
    }

    fn update_mode(&self) -> UpdateMode {
        UpdateMode::RealTime
    }

    async fn load_pairs(&self) -> Result<Vec<CurrencyPair>> {
        let url = format!("{}/api/v2/trading-pairs-info/", self.api_url);

        let infos: Vec<TradingPairInfo> = self.client.get_json("Bitstamp", &url).await?;

        let pairs = infos
            .into_iter()
            .filter_map(|info| {
                let (base, quote) = info.name.split_once('/')?;
                let pair = CurrencyPair::from_codes(base, quote)?;
                Some(CurrencyPair::with_code(pair.base, pair.quote, info.url_symbol))
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

        let mut sockets = self.sockets.lock().await;
        for socket in sockets.drain(..) {
            socket.abort();
        }
        for pair in pairs {
            let ws_url = self.ws_url.clone();
            let events = self.events.clone();
            sockets.push(tokio::spawn(run_socket(ws_url, pair, events)));
        }
    }

    async fn stop(&self) {
        let mut sockets = self.sockets.lock().await;
        for socket in sockets.drain(..) {
            socket.abort();
        }
        info!("Bitstamp connector stopped");
    }
}
