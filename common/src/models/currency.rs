use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Defines the closed set of known currencies together with the static
/// lookup tables derived from it. Canonical codes are the variant names.
macro_rules! currencies {
    (
        physical { $($fiat:ident),* $(,)? }
        crypto { $($coin:ident),* $(,)? }
    ) => {
        /// A currency known to the ticker, either physical (fiat) or crypto.
        ///
        /// The set is fixed at compile time; codes that do not resolve to a
        /// variant are treated as unknown rather than invented on the fly.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum Currency {
            $($fiat,)*
            $($coin,)*
        }

        impl Currency {
            /// Physical (fiat) currencies.
            pub const PHYSICAL: &'static [Currency] = &[$(Currency::$fiat),*];

            /// Cryptocurrencies.
            pub const CRYPTO: &'static [Currency] = &[$(Currency::$coin),*];

            /// Canonical uppercase ticker code (e.g. "BTC").
            pub fn code(&self) -> &'static str {
                match self {
                    $(Currency::$fiat => stringify!($fiat),)*
                    $(Currency::$coin => stringify!($coin),)*
                }
            }
        }
    };
}

currencies! {
    physical {
        CAD, CNY, EUR, GBP, JPY, KRW, RUB, USD,
    }
    crypto {
        ADA, ADX, AION, AMP, ARDR, ARK, BAT, BCH, BCN, BNB, BNT, BQX, BTC,
        BTCD, BTG, BTM, BTS, CVC, DASH, DCR, DGB, DOGE, EMC2, EOS, ETC, ETH,
        ETP, FCT, FUN, GAME, GNO, GNT, GXS, HSR, ICN, IOTA, KMD, KNC, LRC,
        LSK, LTC, MAID, MANA, MCO, MLN, MTL, NAV, NEBL, NEO, NMC, NVC, NXT,
        OMG, POT, PPC, PPT, QASH, QTUM, RDN, REP, RIC, SALT, SAN, SC, SNGLS,
        SNT, STEEM, STORJ, STRAT, SUB, TRX, USDT, VEN, VTC, WAVES, WTC, XCP,
        XEM, XLM, XMR, XRP, XVG, XZC, ZEC,
    }
}

impl Currency {
    /// All known currencies, crypto first.
    pub fn all() -> impl Iterator<Item = Currency> {
        Self::CRYPTO.iter().chain(Self::PHYSICAL).copied()
    }

    /// Display glyph for the currency, if one exists.
    ///
    /// Cryptocurrencies without a dedicated glyph fall back to their code;
    /// fiat currencies are rendered by the display layer's own formatter.
    pub fn symbol(&self) -> Option<&'static str> {
        match self {
            Currency::RUB => Some("₽"),
            Currency::BTC | Currency::BCH => Some("₿"),
            Currency::DOGE => Some("Ð"),
            Currency::ETC => Some("⟠"),
            Currency::ETH => Some("Ξ"),
            Currency::LTC => Some("Ł"),
            Currency::NMC => Some("ℕ"),
            Currency::PPC => Some("Ᵽ"),
            Currency::REP => Some("Ɍ"),
            Currency::XMR => Some("ɱ"),
            Currency::XRP => Some("Ʀ"),
            Currency::ZEC => Some("ⓩ"),
            _ if self.is_crypto() => Some(self.code()),
            _ => None,
        }
    }

    pub fn is_crypto(&self) -> bool {
        Self::CRYPTO.contains(self)
    }

    pub fn is_bitcoin(&self) -> bool {
        *self == Currency::BTC
    }

    fn is_bitcoin_cash(&self) -> bool {
        *self == Currency::BCH
    }

    /// Resolves an exchange-reported code to a currency.
    ///
    /// Matching is case-insensitive. Codes of length >= 4 starting with 'X'
    /// or 'Z' are retried with the prefix stripped (Kraken marks crypto
    /// assets with X and physical ones with Z), and a small alias table
    /// covers legacy spellings. Unknown codes yield `None`.
    pub fn from_code(code: &str) -> Option<Currency> {
        let mut normalized = code.to_ascii_uppercase();
        if let Some(currency) = Self::find_by_code(&normalized) {
            return Some(currency);
        }

        if normalized.len() >= 4 && (normalized.starts_with('X') || normalized.starts_with('Z')) {
            normalized.remove(0);
            if let Some(currency) = Self::find_by_code(&normalized) {
                return Some(currency);
            }
        }

        match normalized.as_str() {
            "BCC" => Some(Currency::BCH),
            "RUR" => Some(Currency::RUB),
            "XBT" => Some(Currency::BTC),
            "XDG" => Some(Currency::DOGE),
            _ => {
                debug!("Unknown currency code {:?}", code);
                None
            }
        }
    }

    /// Derives the local fiat currency from a POSIX or BCP-47 locale string
    /// such as "en_US.UTF-8" or "de-DE".
    pub fn from_locale(locale: &str) -> Option<Currency> {
        let region = locale_region(locale)?.to_ascii_uppercase();
        let code = match region.as_str() {
            "US" => "USD",
            "CA" => "CAD",
            "CN" => "CNY",
            "GB" => "GBP",
            "JP" => "JPY",
            "KR" => "KRW",
            "RU" => "RUB",
            "AT" | "BE" | "CY" | "DE" | "EE" | "ES" | "FI" | "FR" | "GR" | "HR" | "IE"
            | "IT" | "LT" | "LU" | "LV" | "MT" | "NL" | "PT" | "SI" | "SK" => "EUR",
            _ => return None,
        };
        Self::from_code(code)
    }

    fn find_by_code(code: &str) -> Option<Currency> {
        Self::all().find(|currency| currency.code() == code)
    }
}

fn locale_region(locale: &str) -> Option<&str> {
    // "en_US.UTF-8" -> "en_US"; "C" and "POSIX" carry no region
    let base = locale.split(|c| c == '.' || c == '@').next()?;
    let mut parts = base.split(|c| c == '_' || c == '-');
    parts.next()?;
    let region = parts.next()?;
    if region.len() == 2 && region.bytes().all(|b| b.is_ascii_alphabetic()) {
        Some(region)
    } else {
        None
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Display order: Bitcoin first, Bitcoin Cash second, everything else by
/// ascending canonical code.
impl Ord for Currency {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.is_bitcoin(), other.is_bitcoin()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => match (self.is_bitcoin_cash(), other.is_bitcoin_cash()) {
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                _ => self.code().cmp(other.code()),
            },
        }
    }
}

impl PartialOrd for Currency {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
