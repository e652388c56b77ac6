use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use crate::engine::opportunity;
use crate::engine::types::{Opportunity, RateRecord, RateTable};

/// Sole owner of the rate table.
///
/// Readers get `Arc` clones of the table and of the ranked list; a merge
/// copies-on-write, so a snapshot taken before a merge is never mutated.
#[derive(Debug, Clone)]
pub struct RateAggregator {
    table: Arc<RateTable>,
    opportunities: Arc<Vec<Opportunity>>,
    last_updated: Option<DateTime<Utc>>,
    threshold: f64,
}

impl RateAggregator {
    pub fn new(threshold: f64) -> Self {
        Self {
            table: Arc::new(RateTable::new()),
            opportunities: Arc::new(Vec::new()),
            last_updated: None,
            threshold,
        }
    }

    /// Write every record into the table, then recompute the ranked list
    /// before returning it.
    #[instrument(level = "debug", skip_all, fields(records = batch.len()))]
    pub fn merge(&mut self, batch: Vec<RateRecord>) -> Arc<Vec<Opportunity>> {
        let table = Arc::make_mut(&mut self.table);
        for record in batch {
            let rate = Some(record.rate).filter(|r| r.is_finite());
            table.insert(&record.symbol, record.venue, rate);
        }

        let now = Utc::now();
        self.opportunities = Arc::new(opportunity::compute_at(&self.table, self.threshold, now));
        self.last_updated = Some(now);

        metrics::counter!("fundx_merges_total").increment(1);
        metrics::gauge!("fundx_opportunities").set(self.opportunities.len() as f64);
        debug!(
            symbols = self.table.symbol_count(),
            opportunities = self.opportunities.len(),
            "merged rate batch"
        );
        Arc::clone(&self.opportunities)
    }

    pub fn table(&self) -> Arc<RateTable> {
        Arc::clone(&self.table)
    }

    pub fn opportunities(&self) -> Arc<Vec<Opportunity>> {
        Arc::clone(&self.opportunities)
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    pub fn find(&self, id: &str) -> Option<Opportunity> {
        self.opportunities.iter().find(|o| o.id == id).cloned()
    }
}
