//! Integration tests for the REST backed connectors, driven against local
//! stub servers standing in for the exchange APIs.

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use common::models::{Currency, CurrencyPair, Exchange};
use connectors::{
    coinbase::CoinbaseConnector, event_channel, kraken::KrakenConnector, ConnectorEvent,
    ExchangeConnector,
};
use serde_json::json;
use tokio::sync::mpsc;

fn serve(app: Router) -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    listener.set_nonblocking(true).unwrap();
    tokio::spawn(async move {
        axum::Server::from_tcp(listener)
            .unwrap()
            .serve(app.into_make_service())
            .await
            .unwrap();
    });
    addr
}

fn drain(rx: &mut mpsc::Receiver<ConnectorEvent>) -> Vec<ConnectorEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn btc_usd() -> CurrencyPair {
    CurrencyPair::new(Currency::BTC, Currency::USD)
}

fn eth_usd() -> CurrencyPair {
    CurrencyPair::new(Currency::ETH, Currency::USD)
}

fn doge_usd() -> CurrencyPair {
    CurrencyPair::new(Currency::DOGE, Currency::USD)
}

async fn coinbase_spot(Path(product): Path<String>) -> Response {
    match product.as_str() {
        "BTC-USD" => Json(json!({"data": {"amount": "43210.50"}})).into_response(),
        "DOGE-USD" => Json(json!({"data": {"amount": "0.072511"}})).into_response(),
        _ => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

async fn coinbase_products() -> Json<serde_json::Value> {
    Json(json!([
        {"id": "BTC-USD", "base_currency": "BTC", "quote_currency": "USD"},
        {"id": "ETH-EUR", "base_currency": "ETH", "quote_currency": "EUR"},
        {"id": "USD-BTC", "base_currency": "USD", "quote_currency": "BTC"},
        {"id": "WOOF-USD", "base_currency": "WOOF", "quote_currency": "USD"},
        {"id": "BTC-BTC", "base_currency": "BTC", "quote_currency": "BTC"},
    ]))
}

fn coinbase_stub() -> SocketAddr {
    let app = Router::new()
        .route("/prices/:product/spot", get(coinbase_spot))
        .route("/products", get(coinbase_products));
    serve(app)
}

#[tokio::test]
async fn coinbase_round_reports_successes_then_completion() {
    let base = format!("http://{}", coinbase_stub());
    let (tx, mut rx) = event_channel();
    let connector = CoinbaseConnector::with_base_urls(tx, base.clone(), base);

    // ETH/USD answers 500; the other two succeed.
    connector
        .set_selected_pairs(vec![btc_usd(), eth_usd(), doge_usd()])
        .await;
    connector.fetch().await;

    let events = drain(&mut rx);
    assert!(matches!(
        events.last(),
        Some(ConnectorEvent::FetchCompleted {
            exchange: Exchange::Coinbase
        })
    ));

    let mut prices = HashMap::new();
    let mut completions = 0;
    for event in events {
        match event {
            ConnectorEvent::PriceUpdated {
                exchange,
                pair,
                price,
            } => {
                assert_eq!(exchange, Exchange::Coinbase);
                prices.insert(pair, price);
            }
            ConnectorEvent::FetchCompleted { .. } => completions += 1,
        }
    }

    assert_eq!(completions, 1);
    assert_eq!(prices.len(), 2);
    assert_eq!(prices.get(&btc_usd()), Some(&43210.5));
    assert_eq!(prices.get(&doge_usd()), Some(&0.072511));
}

#[tokio::test]
async fn coinbase_empty_selection_completes_immediately() {
    let base = format!("http://{}", coinbase_stub());
    let (tx, mut rx) = event_channel();
    let connector = CoinbaseConnector::with_base_urls(tx, base.clone(), base);

    connector.fetch().await;

    let events = drain(&mut rx);
    assert_eq!(
        events,
        vec![ConnectorEvent::FetchCompleted {
            exchange: Exchange::Coinbase
        }]
    );
}

#[tokio::test]
async fn coinbase_discovery_keeps_only_known_crypto_bases() {
    let base = format!("http://{}", coinbase_stub());
    let (tx, _rx) = event_channel();
    let connector = CoinbaseConnector::with_base_urls(tx, base.clone(), base);

    let mut pairs = connector.load_pairs().await.unwrap();
    pairs.sort();

    // Fiat-based, unknown-code and degenerate listings are all dropped.
    assert_eq!(
        pairs,
        vec![btc_usd(), CurrencyPair::new(Currency::ETH, Currency::EUR)]
    );
}

async fn kraken_asset_pairs() -> Json<serde_json::Value> {
    Json(json!({
        "error": [],
        "result": {
            "XXBTZUSD": {"altname": "XBTUSD", "base": "XXBT", "quote": "ZUSD"},
            "XXBTZUSD.d": {"altname": "XBTUSD.d", "base": "XXBT", "quote": "ZUSD"},
            "XWOOFZUSD": {"altname": "WOOFUSD", "base": "XWOOF", "quote": "ZUSD"},
            "ADAUSD": {"altname": "ADAUSD", "base": "ADA", "quote": "ZUSD"},
        }
    }))
}

async fn kraken_ticker(Query(params): Query<HashMap<String, String>>) -> Json<serde_json::Value> {
    if params.get("pair").map(String::as_str) == Some("XXBTZUSD") {
        Json(json!({
            "error": [],
            "result": {"XXBTZUSD": {"c": ["43210.50", "0.012"]}}
        }))
    } else {
        Json(json!({"error": ["EQuery:Unknown asset pair"], "result": null}))
    }
}

fn kraken_stub() -> SocketAddr {
    let app = Router::new()
        .route("/0/public/AssetPairs", get(kraken_asset_pairs))
        .route("/0/public/Ticker", get(kraken_ticker));
    serve(app)
}

#[tokio::test]
async fn kraken_discovery_maps_prefixed_codes_and_skips_dark_pools() {
    let base = format!("http://{}", kraken_stub());
    let (tx, _rx) = event_channel();
    let connector = KrakenConnector::with_base_url(tx, base);

    let mut pairs = connector.load_pairs().await.unwrap();
    pairs.sort();

    assert_eq!(
        pairs,
        vec![
            btc_usd(),
            CurrencyPair::new(Currency::ADA, Currency::USD),
        ]
    );
    // The exchange's own symbol survives for request building.
    assert_eq!(pairs[0].exchange_symbol(), "XXBTZUSD");
    assert_eq!(pairs[1].exchange_symbol(), "ADAUSD");
}

#[tokio::test]
async fn kraken_fetch_queries_by_exchange_symbol() {
    let base = format!("http://{}", kraken_stub());
    let (tx, mut rx) = event_channel();
    let connector = KrakenConnector::with_base_url(tx, base);

    // The stub only recognizes Kraken's native symbol, so a BASEQUOTE
    // fallback would come back as an API error and produce no update.
    connector
        .set_selected_pairs(vec![CurrencyPair::with_code(
            Currency::BTC,
            Currency::USD,
            "XXBTZUSD",
        )])
        .await;
    connector.fetch().await;

    let events = drain(&mut rx);
    assert_eq!(
        events,
        vec![
            ConnectorEvent::PriceUpdated {
                exchange: Exchange::Kraken,
                pair: btc_usd(),
                price: 43210.5,
            },
            ConnectorEvent::FetchCompleted {
                exchange: Exchange::Kraken
            },
        ]
    );
}

#[tokio::test]
async fn kraken_error_array_drops_the_pair_but_finishes_the_round() {
    let base = format!("http://{}", kraken_stub());
    let (tx, mut rx) = event_channel();
    let connector = KrakenConnector::with_base_url(tx, base);

    connector
        .set_selected_pairs(vec![CurrencyPair::with_code(
            Currency::ETH,
            Currency::USD,
            "XETHZUSD",
        )])
        .await;
    connector.fetch().await;

    let events = drain(&mut rx);
    assert_eq!(
        events,
        vec![ConnectorEvent::FetchCompleted {
            exchange: Exchange::Kraken
        }]
    );
}

#[tokio::test]
async fn kraken_load_surfaces_api_errors() {
    let app = Router::new().route(
        "/0/public/AssetPairs",
        get(|| async { Json(json!({"error": ["EGeneral:Internal error"], "result": null})) }),
    );
    let base = format!("http://{}", serve(app));
    let (tx, _rx) = event_channel();
    let connector = KrakenConnector::with_base_url(tx, base);

    let err = connector.load_pairs().await.unwrap_err();
    assert!(err.to_string().contains("EGeneral:Internal error"));
}
