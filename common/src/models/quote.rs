use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::exchange::Exchange;
use super::pair::CurrencyPair;

/// A single observed price for a pair on one exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub exchange: Exchange,
    pub pair: CurrencyPair,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

impl PriceQuote {
    pub fn new(exchange: Exchange, pair: CurrencyPair, price: f64) -> Self {
        Self {
            exchange,
            pair,
            price,
            timestamp: Utc::now(),
        }
    }
}
