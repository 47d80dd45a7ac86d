use common::models::{CurrencyPair, PriceQuote};

/// Formats the ticker line for the current selection, e.g.
/// `₿ 43210.50 USD  Ξ 2301.25 USD`. Pairs come out in display order and a
/// pair with no quote yet renders a placeholder.
pub fn render_line(selection: &[CurrencyPair], quotes: &[PriceQuote]) -> String {
    let mut pairs: Vec<&CurrencyPair> = selection.iter().collect();
    pairs.sort();
    pairs.dedup();

    let segments: Vec<String> = pairs
        .into_iter()
        .map(|pair| {
            let glyph = pair.base.symbol().unwrap_or(pair.base.code());
            match quotes.iter().find(|quote| quote.pair == *pair) {
                Some(quote) => {
                    format!("{} {} {}", glyph, format_price(quote.price), pair.quote.code())
                }
                None => format!("{} -", glyph),
            }
        })
        .collect();

    if segments.is_empty() {
        return "-".to_string();
    }
    segments.join("  ")
}

/// Two decimals for prices at or above one unit, six below it so sub-cent
/// coins stay legible.
fn format_price(price: f64) -> String {
    if price >= 1.0 {
        format!("{:.2}", price)
    } else {
        format!("{:.6}", price)
    }
}
