// Router wires adapters -> merge loop -> aggregator and exposes the read side.
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::AppConfig;
use crate::engine::types::{ConnectionState, MarketSnapshot, Opportunity, RateTable, Venue};
use crate::engine::RateAggregator;
use crate::error::{EngineError, EngineResult};
use crate::execution::{ExecutionGateway, ExecutionReport, SimulatedExecutor, TradeParams, TradeRequest};
use crate::market_data::adapters::lighter::{LighterAdapter, LighterConfig};
use crate::market_data::adapters::{
    AsterAdapter, HyperliquidAdapter, MarketEvent, VariationalAdapter,
};
use crate::market_data::scheduler::Scheduler;

pub type SharedAggregator = Arc<RwLock<RateAggregator>>;

/// Single consumer of every adapter batch; the only writer of the table.
pub async fn run_merge_loop(mut rx: mpsc::Receiver<MarketEvent>, aggregator: SharedAggregator) {
    while let Some(event) = rx.recv().await {
        match event {
            MarketEvent::Rates { records } => {
                let count = records.len();
                let opportunities = aggregator.write().merge(records);
                debug!(records = count, opportunities = opportunities.len(), "merge applied");
            }
        }
    }
    debug!("merge loop drained");
}

/// Poll venues and the Lighter stream as configured.
pub fn build_scheduler(cfg: &AppConfig) -> Scheduler {
    let timeout = cfg.request_timeout();
    Scheduler::new(cfg.refresh_interval(), timeout)
        .with_poll(Arc::new(AsterAdapter::new(&cfg.venues.aster_url, timeout)))
        .with_poll(Arc::new(HyperliquidAdapter::new(&cfg.venues.hyperliquid_info_url, timeout)))
        .with_poll(Arc::new(VariationalAdapter::new(
            &cfg.venues.variational_symbols,
            Duration::from_millis(cfg.venues.variational_latency_ms),
        )))
        .with_stream(Arc::new(LighterAdapter::new(LighterConfig::from(cfg))))
}

/// Cloneable read/trade handle given to the presentation boundary.
#[derive(Clone)]
pub struct EngineHandle {
    aggregator: SharedAggregator,
    stream_state: watch::Receiver<ConnectionState>,
    gateway: Arc<ExecutionGateway>,
}

impl EngineHandle {
    pub fn snapshot(&self) -> MarketSnapshot {
        let agg = self.aggregator.read();
        MarketSnapshot {
            rates: agg.table(),
            opportunities: agg.opportunities(),
            last_updated: agg.last_updated(),
            stream_status: self.stream_status(),
        }
    }

    pub fn rates(&self) -> Arc<RateTable> {
        self.aggregator.read().table()
    }

    pub fn opportunities(&self) -> Arc<Vec<Opportunity>> {
        self.aggregator.read().opportunities()
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.aggregator.read().last_updated()
    }

    pub fn stream_status(&self) -> ConnectionState {
        *self.stream_state.borrow()
    }

    /// Resolve a symbol/venue-pair selection against the current ranked list.
    #[instrument(skip(self, params))]
    pub fn prepare_trade(
        &self,
        symbol: &str,
        short_venue: Venue,
        long_venue: Venue,
        params: TradeParams,
    ) -> EngineResult<TradeRequest> {
        let id = Opportunity::make_id(symbol, short_venue, long_venue);
        let opportunity = self
            .aggregator
            .read()
            .find(&id)
            .ok_or(EngineError::OpportunityNotFound(id))?;
        Ok(TradeRequest::new(opportunity, params)?)
    }

    pub async fn execute(&self, request: &TradeRequest) -> ExecutionReport {
        self.gateway.execute(request).await
    }
}

pub struct Engine {
    handle: EngineHandle,
    shutdown: CancellationToken,
    scheduler_task: JoinHandle<()>,
    merge_task: JoinHandle<()>,
}

impl Engine {
    /// Spawn the merge loop and the scheduler.
    pub fn start(scheduler: Scheduler, gateway: ExecutionGateway, threshold: f64, channel_capacity: usize) -> Self {
        let aggregator: SharedAggregator = Arc::new(RwLock::new(RateAggregator::new(threshold)));
        let stream_state = scheduler
            .stream_state()
            .unwrap_or_else(|| watch::channel(ConnectionState::Idle).1);

        let (tx, rx) = mpsc::channel::<MarketEvent>(channel_capacity);
        let shutdown = CancellationToken::new();

        let merge_task = tokio::spawn(run_merge_loop(rx, Arc::clone(&aggregator)));
        let scheduler_task = tokio::spawn(scheduler.run(tx, shutdown.clone()));
        info!(threshold, "engine started");

        Self {
            handle: EngineHandle { aggregator, stream_state, gateway: Arc::new(gateway) },
            shutdown,
            scheduler_task,
            merge_task,
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        let gateway = ExecutionGateway::simulated(SimulatedExecutor::from_settings(&cfg.execution));
        Self::start(
            build_scheduler(cfg),
            gateway,
            cfg.engine.min_spread_threshold_pct,
            cfg.engine.channel_capacity,
        )
    }

    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    /// Stop polling, disconnect the stream and let the merge loop drain.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.scheduler_task.await {
            warn!(error = %e, "scheduler task failed");
        }
        // scheduler dropped its sender; stream task drops the other on exit
        if let Err(e) = self.merge_task.await {
            warn!(error = %e, "merge task failed");
        }
        info!("engine stopped");
    }
}
