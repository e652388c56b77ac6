// Convert venue wire strings into canonical symbols and percent rates.
// Every adapter goes through here so symbols line up across venues.

pub const CANONICAL_QUOTE: &str = "USDT";

// Quotes treated as the same instrument when comparing funding.
const KNOWN_QUOTES: [&str; 2] = ["USDT", "USDC"];
const SEPARATORS: [char; 3] = ['-', '_', '/'];

/// `"btc-usdc"` -> `"BTCUSDT"`, `"ETH"` -> `"ETHUSDT"`.
///
/// Returns `None` for input that has no base asset left after stripping.
pub fn canonical_symbol(raw: &str) -> Option<String> {
    let mut s: String = raw
        .trim()
        .chars()
        .filter(|c| !SEPARATORS.contains(c))
        .collect::<String>()
        .to_ascii_uppercase();

    for quote in KNOWN_QUOTES {
        if s.len() > quote.len() && s.ends_with(quote) {
            s.truncate(s.len() - quote.len());
            break;
        }
    }

    if s.is_empty() || KNOWN_QUOTES.contains(&s.as_str()) {
        return None;
    }
    s.push_str(CANONICAL_QUOTE);
    Some(s)
}

/// Symbol used when a stream market id has no known mapping.
pub fn placeholder_symbol(market_id: u32) -> String {
    format!("MARKET_{market_id}")
}

/// Raw fractional rate (e.g. `"0.0001"`) -> percent (`0.01`).
pub fn percent_from_fraction(raw: &str) -> Option<f64> {
    let value: f64 = raw.trim().parse().ok()?;
    let pct = value * 100.0;
    pct.is_finite().then_some(pct)
}
