use std::time::Duration;

use common::models::{Currency, CurrencyPair};
use tracing::warn;

/// Ticker configuration sourced from the environment.
#[derive(Debug, Clone)]
pub struct TickerConfig {
    /// Pairs to track
    pub pairs: Vec<CurrencyPair>,
    /// Poll cadence for REST backed exchanges
    pub poll_interval: Duration,
    /// Quiet window for coalescing streamed updates
    pub stream_debounce: Duration,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            pairs: vec![CurrencyPair::new(Currency::BTC, local_quote())],
            poll_interval: Duration::from_secs(15),
            stream_debounce: Duration::from_millis(250),
        }
    }
}

impl TickerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let pairs = std::env::var("TICKER_PAIRS")
            .ok()
            .map(|raw| parse_pairs(&raw))
            .filter(|pairs| !pairs.is_empty())
            .unwrap_or(defaults.pairs);

        let poll_interval = std::env::var("TICKER_POLL_SECS")
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .map(|secs| Duration::from_secs(secs.max(1)))
            .unwrap_or(defaults.poll_interval);

        let stream_debounce = std::env::var("TICKER_DEBOUNCE_MS")
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.stream_debounce);

        Self {
            pairs,
            poll_interval,
            stream_debounce,
        }
    }
}

/// Parses a "BTC/USD,ETH/EUR" list. Entries that do not resolve are skipped
/// with a warning rather than failing startup.
fn parse_pairs(raw: &str) -> Vec<CurrencyPair> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match parse_pair(entry) {
            Some(pair) => Some(pair),
            None => {
                warn!("Ignoring unrecognized pair {:?}", entry);
                None
            }
        })
        .collect()
}

fn parse_pair(entry: &str) -> Option<CurrencyPair> {
    let (base, quote) = entry.split_once('/')?;
    let pair = CurrencyPair::from_codes(base, quote)?;
    if pair.base == pair.quote {
        return None;
    }
    Some(pair)
}

/// Quote currency implied by the process locale, dollar as the fallback.
fn local_quote() -> Currency {
    std::env::var("LC_ALL")
        .or_else(|_| std::env::var("LC_MONETARY"))
        .or_else(|_| std::env::var("LANG"))
        .ok()
        .and_then(|locale| Currency::from_locale(&locale))
        .unwrap_or(Currency::USD)
}
