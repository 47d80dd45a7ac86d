use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::currency::Currency;

/// An ordered base/quote currency combination, e.g. BTC priced in USD.
///
/// Exchanges may attach their own symbol for the pair (Kraken's "XXBTZUSD",
/// Bitstamp's "btcusd"). That symbol is carried along for request building
/// but never participates in identity: two pairs with the same base and
/// quote are the same pair no matter which exchange produced them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencyPair {
    pub base: Currency,
    pub quote: Currency,
    custom_code: Option<String>,
}

impl CurrencyPair {
    pub fn new(base: Currency, quote: Currency) -> Self {
        Self {
            base,
            quote,
            custom_code: None,
        }
    }

    /// Builds a pair carrying an exchange-specific symbol.
    pub fn with_code(base: Currency, quote: Currency, code: impl Into<String>) -> Self {
        Self {
            base,
            quote,
            custom_code: Some(code.into()),
        }
    }

    /// Resolves raw exchange-reported codes into a pair. Either code being
    /// unknown makes the whole pair unknown.
    pub fn from_codes(base: &str, quote: &str) -> Option<Self> {
        Some(Self::new(Currency::from_code(base)?, Currency::from_code(quote)?))
    }

    /// Symbol to use when talking to the exchange this pair came from.
    /// Falls back to the concatenated canonical codes ("BTCUSD").
    pub fn exchange_symbol(&self) -> String {
        match &self.custom_code {
            Some(code) => code.clone(),
            None => format!("{}{}", self.base.code(), self.quote.code()),
        }
    }
}

impl PartialEq for CurrencyPair {
    fn eq(&self, other: &Self) -> bool {
        self.base == other.base && self.quote == other.quote
    }
}

impl Eq for CurrencyPair {}

impl Hash for CurrencyPair {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.base.hash(state);
        self.quote.hash(state);
    }
}

impl Ord for CurrencyPair {
    fn cmp(&self, other: &Self) -> Ordering {
        self.base
            .cmp(&other.base)
            .then_with(|| self.quote.cmp(&other.quote))
    }
}

impl PartialOrd for CurrencyPair {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base.code(), self.quote.code())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn identity_ignores_the_exchange_symbol() {
        let plain = CurrencyPair::new(Currency::BTC, Currency::USD);
        let kraken = CurrencyPair::with_code(Currency::BTC, Currency::USD, "XXBTZUSD");
        let bitstamp = CurrencyPair::with_code(Currency::BTC, Currency::USD, "btcusd");

        assert_eq!(plain, kraken);
        assert_eq!(kraken, bitstamp);
        assert_eq!(plain.cmp(&kraken), Ordering::Equal);

        let mut set = HashSet::new();
        set.insert(kraken);
        assert!(set.contains(&plain));
        assert!(set.contains(&bitstamp));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn exchange_symbol_prefers_the_custom_code() {
        let plain = CurrencyPair::new(Currency::BTC, Currency::USD);
        assert_eq!(plain.exchange_symbol(), "BTCUSD");

        let custom = CurrencyPair::with_code(Currency::BTC, Currency::USD, "XXBTZUSD");
        assert_eq!(custom.exchange_symbol(), "XXBTZUSD");
    }

    #[test]
    fn from_codes_requires_both_sides_to_resolve() {
        let pair = CurrencyPair::from_codes("xbt", "usd").unwrap();
        assert_eq!(pair.base, Currency::BTC);
        assert_eq!(pair.quote, Currency::USD);

        assert!(CurrencyPair::from_codes("BTC", "NOPE").is_none());
        assert!(CurrencyPair::from_codes("NOPE", "USD").is_none());
    }

    #[test]
    fn pairs_sort_by_base_then_quote() {
        let mut pairs = vec![
            CurrencyPair::new(Currency::ETH, Currency::USD),
            CurrencyPair::new(Currency::BCH, Currency::EUR),
            CurrencyPair::new(Currency::BTC, Currency::USD),
            CurrencyPair::new(Currency::BTC, Currency::EUR),
        ];
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                CurrencyPair::new(Currency::BTC, Currency::EUR),
                CurrencyPair::new(Currency::BTC, Currency::USD),
                CurrencyPair::new(Currency::BCH, Currency::EUR),
                CurrencyPair::new(Currency::ETH, Currency::USD),
            ]
        );
    }

    #[test]
    fn display_uses_a_slash() {
        let pair = CurrencyPair::with_code(Currency::DOGE, Currency::USD, "dogeusd");
        assert_eq!(pair.to_string(), "DOGE/USD");
    }
}
