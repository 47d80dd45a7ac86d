use std::collections::HashMap;

use common::models::{CurrencyPair, Exchange, PriceQuote};
use tracing::debug;

/// Merged per-pair prices across exchanges.
///
/// Exchange priority is fixed at construction, first registered wins. An
/// incoming price is kept when the pair has no quote yet, when it refreshes
/// the quote already displayed, or when it comes from a higher priority
/// exchange than the displayed one. Everything else is dropped, so the
/// outcome never depends on arrival order.
pub struct PriceTable {
    priorities: Vec<Exchange>,
    quotes: HashMap<CurrencyPair, PriceQuote>,
}

impl PriceTable {
    pub fn new(priorities: Vec<Exchange>) -> Self {
        Self {
            priorities,
            quotes: HashMap::new(),
        }
    }

    /// Applies one update and reports whether the displayed table changed.
    pub fn apply(&mut self, exchange: Exchange, pair: CurrencyPair, price: f64) -> bool {
        match self.quotes.get(&pair) {
            Some(current)
                if current.exchange != exchange
                    && self.priority(exchange) >= self.priority(current.exchange) =>
            {
                debug!(
                    "Keeping {} price for {} over lower priority {}",
                    current.exchange, pair, exchange
                );
                false
            }
            _ => {
                self.quotes
                    .insert(pair.clone(), PriceQuote::new(exchange, pair, price));
                true
            }
        }
    }

    /// Current quotes in display order.
    pub fn quotes(&self) -> Vec<PriceQuote> {
        let mut quotes: Vec<PriceQuote> = self.quotes.values().cloned().collect();
        quotes.sort_by(|a, b| a.pair.cmp(&b.pair));
        quotes
    }

    /// Displayed price for one pair, if any exchange has reported it.
    pub fn price(&self, pair: &CurrencyPair) -> Option<f64> {
        self.quotes.get(pair).map(|quote| quote.price)
    }

    /// Drops quotes for pairs outside the new selection.
    pub fn retain_pairs(&mut self, pairs: &[CurrencyPair]) {
        self.quotes.retain(|pair, _| pairs.contains(pair));
    }

    /// Drops every quote a stopped exchange contributed.
    pub fn remove_exchange(&mut self, exchange: Exchange) {
        self.quotes.retain(|_, quote| quote.exchange != exchange);
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    fn priority(&self, exchange: Exchange) -> usize {
        self.priorities
            .iter()
            .position(|&candidate| candidate == exchange)
            .unwrap_or(usize::MAX)
    }
}
