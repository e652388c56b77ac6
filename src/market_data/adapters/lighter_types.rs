use std::collections::HashMap;

// Source: wss://mainnet.zklighter.elliot.ai/stream (channel market_stats/<id>)
// Example: {"type":"update/market_stats","channel":"market_stats:0",
//           "market_stats":{"market_id":0,"funding_rate":"0.0012", ...}}
#[derive(Debug, serde::Deserialize)]
pub struct WsFrame {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub market_index: Option<u32>,
    #[serde(default)]
    pub market_stats: Option<MarketStats>,
    // older frames carry the payload under "stats"
    #[serde(default)]
    pub stats: Option<MarketStats>,
}

#[derive(Debug, serde::Deserialize)]
pub struct MarketStats {
    #[serde(default)]
    pub market_id: Option<u32>,
    #[serde(default)]
    pub funding_rate: Option<RateValue>,
    #[serde(default)]
    pub current_funding_rate: Option<RateValue>,
}

// Rates arrive either as decimal strings or bare numbers.
#[derive(Debug, serde::Deserialize)]
#[serde(untagged)]
pub enum RateValue {
    Number(f64),
    Text(String),
}

impl RateValue {
    pub fn as_fraction(&self) -> Option<f64> {
        let v = match self {
            RateValue::Number(n) => *n,
            RateValue::Text(s) => s.trim().parse().ok()?,
        };
        v.is_finite().then_some(v)
    }
}

#[derive(Debug, serde::Serialize)]
pub struct SubscribeFrame {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub channel: String,
}

impl SubscribeFrame {
    pub fn market_stats(market_id: u32) -> Self {
        Self { kind: "subscribe", channel: format!("market_stats/{market_id}") }
    }
}

// Types for REST GET /v1/order-book
// { "order_books": [ { "id": 0, "symbol": "BTC-USDC" }, ... ] }
// or keyed by id: { "order_books": { "0": { "symbol": "BTC" }, ... } }
#[derive(Debug, serde::Deserialize)]
pub struct OrderBooksResponse {
    #[serde(default)]
    pub order_books: Option<OrderBooks>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(untagged)]
pub enum OrderBooks {
    List(Vec<OrderBookEntry>),
    Keyed(HashMap<String, OrderBookEntry>),
}

#[derive(Debug, serde::Deserialize)]
pub struct OrderBookEntry {
    #[serde(default, alias = "market_id")]
    pub id: Option<u32>,
    #[serde(default)]
    pub symbol: Option<String>,
}
