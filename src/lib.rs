//! Cross-venue funding-rate aggregation and arbitrage detection.
//!
//! Poll and stream adapters feed normalised rate batches through a single
//! merge loop into the [`engine::RateAggregator`], which recomputes the ranked
//! opportunity list on every merge.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod execution;
pub mod market_data;
pub mod telemetry;

pub use config::AppConfig;
pub use engine::types::{ConnectionState, MarketSnapshot, Opportunity, RateRecord, RateTable, Venue};
pub use error::{AdapterError, EngineError, ExecutionError};
pub use market_data::router::{Engine, EngineHandle};
