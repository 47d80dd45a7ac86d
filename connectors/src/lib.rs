pub mod binance;
pub mod bitstamp;
pub mod coinbase;
pub mod kraken;

mod http;

pub use http::ApiClient;

use async_trait::async_trait;
use common::{
    models::{CurrencyPair, Exchange},
    Result,
};
use tokio::sync::mpsc;

/// How a connector delivers prices once `fetch` has been called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Prices stream in continuously over sockets kept open by the connector.
    RealTime,
    /// Each `fetch` call performs one round of requests and then reports
    /// completion.
    Polling,
}

/// Messages connectors push towards the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectorEvent {
    /// A fresh price for one pair on one exchange.
    PriceUpdated {
        exchange: Exchange,
        pair: CurrencyPair,
        price: f64,
    },
    /// A polling round finished; failed pairs were logged and skipped.
    FetchCompleted { exchange: Exchange },
}

pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// Builds the channel all connectors report through.
pub fn event_channel() -> (
    mpsc::Sender<ConnectorEvent>,
    mpsc::Receiver<ConnectorEvent>,
) {
    mpsc::channel(DEFAULT_EVENT_BUFFER)
}

/// Trait defining the interface for exchange price sources
#[async_trait]
pub trait ExchangeConnector: Send + Sync {
    /// Stable identity of the exchange behind this connector
    fn exchange(&self) -> Exchange;

    /// Whether prices stream in over sockets or must be polled
    fn update_mode(&self) -> UpdateMode;

    /// Discover the pairs currently listed on the exchange
    async fn load_pairs(&self) -> Result<Vec<CurrencyPair>>;

    /// Replace the set of pairs subsequent fetches cover
    async fn set_selected_pairs(&self, pairs: Vec<CurrencyPair>);

    /// Start one round of price updates for the selected pairs
    async fn fetch(&self);

    /// Tear down sockets and drop in-flight work
    async fn stop(&self);
}
