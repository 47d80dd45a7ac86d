pub mod currency;
pub mod exchange;
pub mod pair;
pub mod quote;

pub use currency::Currency;
pub use exchange::Exchange;
pub use pair::CurrencyPair;
pub use quote::PriceQuote;
