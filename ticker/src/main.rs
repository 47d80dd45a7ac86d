mod config;
mod display;

use std::sync::Arc;

use aggregator::{CoordinatorConfig, PriceCoordinator};
use common::models::CurrencyPair;
use config::TickerConfig;
use connectors::{
    binance::BinanceConnector, bitstamp::BitstampConnector, coinbase::CoinbaseConnector,
    event_channel, kraken::KrakenConnector, ExchangeConnector,
};
use tokio::sync::watch;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!("Starting ticker");

    // Load configuration from environment
    let config = TickerConfig::from_env();
    info!(
        "Tracking {} pair(s), polling every {:?}",
        config.pairs.len(),
        config.poll_interval
    );

    // Create exchange connectors; the first registered has display priority
    let (events_tx, events_rx) = event_channel();
    let connectors: Vec<Arc<dyn ExchangeConnector>> = vec![
        Arc::new(BitstampConnector::new(events_tx.clone())),
        Arc::new(BinanceConnector::new(events_tx.clone())),
        Arc::new(CoinbaseConnector::new(events_tx.clone())),
        Arc::new(KrakenConnector::new(events_tx)),
    ];

    let mut coordinator = PriceCoordinator::new(
        connectors,
        events_rx,
        CoordinatorConfig {
            pairs: config.pairs.clone(),
            poll_interval: config.poll_interval,
            stream_debounce: config.stream_debounce,
        },
    );

    let updates = coordinator.subscribe();
    coordinator.start().await;

    // Placeholder line until the first prices land
    println!(
        "{}",
        display::render_line(&config.pairs, &coordinator.quotes().await)
    );

    tokio::select! {
        _ = run_display(&coordinator, &config.pairs, updates) => {}
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }

    coordinator.stop().await;

    Ok(())
}

async fn run_display(
    coordinator: &PriceCoordinator,
    selection: &[CurrencyPair],
    mut updates: watch::Receiver<u64>,
) {
    while updates.changed().await.is_ok() {
        let quotes = coordinator.quotes().await;
        println!("{}", display::render_line(selection, &quotes));
    }
}
