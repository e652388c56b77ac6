// Variational has no public funding feed; rates here are synthetic so the
// venue still participates in the table and the spread scan.

use std::time::Duration;

use rand::Rng;
use tracing::trace;

use super::PollAdapter;
use crate::engine::types::{RateRecord, Venue};
use crate::error::AdapterResult;
use crate::market_data::normaliser::canonical_symbol;

// Synthetic rates are uniform in [-SPAN/2, SPAN/2) percent.
const RATE_SPAN_PCT: f64 = 0.05;

pub struct VariationalAdapter {
    symbols: Vec<String>,
    latency: Duration,
}

impl VariationalAdapter {
    pub fn new(symbols: &[String], latency: Duration) -> Self {
        let symbols = symbols.iter().filter_map(|s| canonical_symbol(s)).collect();
        Self { symbols, latency }
    }

    fn sample(&self) -> Vec<RateRecord> {
        let mut rng = rand::thread_rng();
        self.symbols
            .iter()
            .map(|symbol| {
                let rate = (rng.gen::<f64>() - 0.5) * RATE_SPAN_PCT;
                RateRecord::new(symbol.clone(), Venue::Variational, rate)
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl PollAdapter for VariationalAdapter {
    fn venue(&self) -> Venue {
        Venue::Variational
    }

    async fn try_fetch(&self) -> AdapterResult<Vec<RateRecord>> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let records = self.sample();
        trace!(count = records.len(), "generated synthetic rates");
        Ok(records)
    }
}
