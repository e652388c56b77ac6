// Aster perpetuals: Binance-style premiumIndex endpoint, all symbols in one call.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, instrument};

use super::{http_client, PollAdapter};
use crate::engine::types::{RateRecord, Venue};
use crate::error::{AdapterError, AdapterResult};
use crate::market_data::normaliser::{canonical_symbol, percent_from_fraction};

// GET /fapi/v1/premiumIndex -> [{ "symbol": "BTCUSDT", "lastFundingRate": "0.00010000", ... }]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PremiumIndex {
    symbol: Option<String>,
    last_funding_rate: Option<String>,
}

pub struct AsterAdapter {
    pub url: String,
    client: reqwest::Client,
}

impl AsterAdapter {
    pub fn new(url: &str, timeout: Duration) -> Self {
        Self { url: url.to_string(), client: http_client(timeout) }
    }
}

/// Parse a premiumIndex payload. A body that is not an array is an error;
/// entries without a usable symbol or rate are skipped, as are zero rates
/// (Aster reports `0` for inactive contracts).
pub fn parse_premium_index(body: &str) -> AdapterResult<Vec<RateRecord>> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    let serde_json::Value::Array(items) = value else {
        return Err(AdapterError::Schema("premiumIndex: expected a JSON array".into()));
    };

    let records = items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<PremiumIndex>(item).ok())
        .filter_map(|entry| {
            let symbol = canonical_symbol(entry.symbol.as_deref()?)?;
            let rate = percent_from_fraction(entry.last_funding_rate.as_deref()?)?;
            (rate != 0.0).then(|| RateRecord::new(symbol, Venue::Aster, rate))
        })
        .collect();
    Ok(records)
}

#[async_trait::async_trait]
impl PollAdapter for AsterAdapter {
    fn venue(&self) -> Venue {
        Venue::Aster
    }

    #[instrument(level = "debug", skip(self), fields(venue = "Aster"))]
    async fn try_fetch(&self) -> AdapterResult<Vec<RateRecord>> {
        let res = self.client.get(&self.url).send().await?;
        if !res.status().is_success() {
            return Err(AdapterError::Status { venue: Venue::Aster, status: res.status().as_u16() });
        }
        let body = res.text().await?;
        let records = parse_premium_index(&body)?;
        debug!(count = records.len(), "parsed premiumIndex");
        Ok(records)
    }
}
