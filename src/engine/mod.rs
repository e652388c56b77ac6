// Rate table, spread scan and shared model types
pub mod types;        // venues, records, table, opportunities
pub mod opportunity;  // cross-venue spread computation
pub mod aggregator;   // owns the table, recomputes on merge

pub use aggregator::RateAggregator;
pub use types::*;
