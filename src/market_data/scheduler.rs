// Drives poll adapters on a fixed cadence and owns the stream adapter's lifetime.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::types::{ConnectionState, RateRecord};
use crate::market_data::adapters::{MarketEvent, PollAdapter, StreamAdapter};

// How long a stream session gets to close after `disconnect` before it is aborted.
const STREAM_STOP_GRACE: Duration = Duration::from_secs(5);

pub struct Scheduler {
    poll_adapters: Vec<Arc<dyn PollAdapter>>,
    stream: Option<Arc<dyn StreamAdapter>>,
    interval: Duration,
    fetch_timeout: Duration,
}

impl Scheduler {
    pub fn new(interval: Duration, fetch_timeout: Duration) -> Self {
        Self { poll_adapters: Vec::new(), stream: None, interval, fetch_timeout }
    }

    pub fn with_poll(mut self, adapter: Arc<dyn PollAdapter>) -> Self {
        self.poll_adapters.push(adapter);
        self
    }

    pub fn with_stream(mut self, adapter: Arc<dyn StreamAdapter>) -> Self {
        self.stream = Some(adapter);
        self
    }

    pub fn stream_state(&self) -> Option<watch::Receiver<ConnectionState>> {
        self.stream.as_ref().map(|s| s.state())
    }

    /// Fetch every poll venue concurrently and concatenate the results.
    /// A venue that errors, panics or exceeds the fetch timeout contributes
    /// nothing.
    pub async fn poll_once(&self) -> Vec<RateRecord> {
        // Dropping the set aborts fetches still in flight.
        let mut fetches = JoinSet::new();
        for adapter in &self.poll_adapters {
            let adapter = Arc::clone(adapter);
            let timeout = self.fetch_timeout;
            fetches.spawn(async move {
                let venue = adapter.venue();
                match tokio::time::timeout(timeout, adapter.fetch()).await {
                    Ok(records) => records,
                    Err(_) => {
                        metrics::counter!("fundx_poll_failures_total", "venue" => venue.as_str()).increment(1);
                        warn!(%venue, ?timeout, "poll fetch timed out");
                        Vec::new()
                    }
                }
            });
        }

        let mut records = Vec::new();
        while let Some(joined) = fetches.join_next().await {
            match joined {
                Ok(batch) => records.extend(batch),
                Err(e) => warn!(error = %e, "poll task aborted"),
            }
        }
        records
    }

    /// Start the stream once, then tick poll adapters (first tick immediately)
    /// until `shutdown` fires. The stream is disconnected on the way out.
    pub async fn run(self, tx: mpsc::Sender<MarketEvent>, shutdown: CancellationToken) {
        let stream_cancel = shutdown.child_token();
        let mut stream_task = self.stream.clone().map(|stream| {
            let tx = tx.clone();
            let cancel = stream_cancel.clone();
            tokio::spawn(async move {
                let venue = stream.venue();
                match stream.connect(tx, cancel).await {
                    Ok(()) => info!(%venue, "stream session ended"),
                    Err(e) => warn!(%venue, error = %e, "stream session ended with error"),
                }
            })
        });

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            poll_venues = self.poll_adapters.len(),
            interval_ms = self.interval.as_millis() as u64,
            "scheduler started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let records = tokio::select! {
                        _ = shutdown.cancelled() => break,
                        records = self.poll_once() => records,
                    };
                    if records.is_empty() {
                        debug!("poll tick produced no records");
                        continue;
                    }
                    debug!(records = records.len(), "poll tick");
                    if tx.send(MarketEvent::Rates { records }).await.is_err() {
                        warn!("merge loop closed, stopping scheduler");
                        break;
                    }
                }
            }
        }

        stream_cancel.cancel();
        if let Some(stream) = &self.stream {
            stream.disconnect();
        }
        if let Some(handle) = stream_task.as_mut() {
            if tokio::time::timeout(STREAM_STOP_GRACE, &mut *handle).await.is_err() {
                warn!("stream did not stop in time, aborting");
                handle.abort();
            }
        }
        info!("scheduler stopped");
    }
}
