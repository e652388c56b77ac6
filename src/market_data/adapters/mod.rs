// Shared traits + event for venue adapters

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::engine::types::{ConnectionState, RateRecord, Venue};
use crate::error::AdapterResult;

#[derive(Debug, Clone)]
pub enum MarketEvent {
    // One normalised batch, merged atomically by the aggregator
    Rates { records: Vec<RateRecord> },
}

/// Point-in-time HTTP source.
#[async_trait::async_trait]
pub trait PollAdapter: Send + Sync {
    fn venue(&self) -> Venue;

    /// One request/parse cycle. Implementations skip malformed records and
    /// only fail for transport errors or an unusable payload.
    async fn try_fetch(&self) -> AdapterResult<Vec<RateRecord>>;

    /// Never fails: a venue outage degrades to "no data this tick".
    async fn fetch(&self) -> Vec<RateRecord> {
        let venue = self.venue();
        match self.try_fetch().await {
            Ok(records) => {
                metrics::counter!("fundx_poll_records_total", "venue" => venue.as_str())
                    .increment(records.len() as u64);
                records
            }
            Err(e) => {
                metrics::counter!("fundx_poll_failures_total", "venue" => venue.as_str()).increment(1);
                warn!(%venue, error = %e, "poll fetch failed");
                Vec::new()
            }
        }
    }
}

/// Long-lived push source.
#[async_trait::async_trait]
pub trait StreamAdapter: Send + Sync {
    fn venue(&self) -> Venue;

    /// Run one connection session until it closes, errors, `cancel` fires or
    /// `disconnect` is called. Every decoded update is sent to `tx` as a full
    /// rate batch. A token cancelled before the call ends the session at once.
    async fn connect(&self, tx: mpsc::Sender<MarketEvent>, cancel: CancellationToken) -> AdapterResult<()>;

    /// Close the running session and return to `Idle`.
    fn disconnect(&self);

    /// Connection state transitions.
    fn state(&self) -> watch::Receiver<ConnectionState>;
}

pub mod aster;
pub mod hyperliquid;
pub mod hyperliquid_types;
pub mod lighter;
pub mod lighter_types;
pub mod variational;

pub use aster::AsterAdapter;
pub use hyperliquid::HyperliquidAdapter;
pub use lighter::LighterAdapter;
pub use variational::VariationalAdapter;

pub(crate) fn http_client(timeout: std::time::Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "falling back to default HTTP client");
            reqwest::Client::new()
        })
}
