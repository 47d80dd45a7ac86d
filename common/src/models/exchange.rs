use std::fmt;

use serde::{Deserialize, Serialize};

/// The exchanges the ticker can read prices from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exchange {
    Binance,
    Bitstamp,
    Coinbase,
    Kraken,
}

impl Exchange {
    pub fn id(&self) -> &'static str {
        match self {
            Exchange::Binance => "binance",
            Exchange::Bitstamp => "bitstamp",
            Exchange::Coinbase => "coinbase",
            Exchange::Kraken => "kraken",
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}
