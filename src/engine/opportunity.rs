// Cross-venue spread scan over the rate table.

use chrono::{DateTime, Utc};
use itertools::Itertools;
use ordered_float::OrderedFloat;
use std::cmp::Ordering;
use tracing::{instrument, trace};

use crate::engine::types::{Opportunity, RateTable, Venue};

/// Every ordered (short, long) venue pair per symbol whose spread is strictly
/// above `threshold`, ranked by spread.
pub fn compute(table: &RateTable, threshold: f64) -> Vec<Opportunity> {
    compute_at(table, threshold, Utc::now())
}

/// Same as [`compute`] with an explicit timestamp, so the output is a pure
/// function of its arguments.
#[instrument(level = "trace", skip(table), fields(symbols = table.symbol_count()))]
pub fn compute_at(table: &RateTable, threshold: f64, computed_at: DateTime<Utc>) -> Vec<Opportunity> {
    let mut opportunities = Vec::new();

    for (symbol, row) in table.rows() {
        let quoted: Vec<(Venue, f64)> = row
            .iter()
            .filter_map(|(venue, rate)| rate.filter(|r| r.is_finite()).map(|r| (*venue, r)))
            .collect();
        if quoted.len() < 2 {
            continue;
        }

        // Ordered pairs: short A / long B and short B / long A are different trades.
        for pair in quoted.iter().permutations(2) {
            let (short_venue, short_rate) = *pair[0];
            let (long_venue, long_rate) = *pair[1];
            let spread = short_rate - long_rate;
            if spread > threshold {
                trace!(symbol, %short_venue, %long_venue, spread, "spread above threshold");
                opportunities.push(Opportunity {
                    id: Opportunity::make_id(symbol, short_venue, long_venue),
                    symbol: symbol.to_string(),
                    short_venue,
                    long_venue,
                    short_rate,
                    long_rate,
                    spread,
                    computed_at,
                });
            }
        }
    }

    opportunities.sort_by(rank);
    opportunities
}

// Spread descending, then symbol, then (short, long) by venue name.
fn rank(a: &Opportunity, b: &Opportunity) -> Ordering {
    OrderedFloat(b.spread)
        .cmp(&OrderedFloat(a.spread))
        .then_with(|| a.symbol.cmp(&b.symbol))
        .then_with(|| a.short_venue.as_str().cmp(b.short_venue.as_str()))
        .then_with(|| a.long_venue.as_str().cmp(b.long_venue.as_str()))
}
