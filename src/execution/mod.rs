//! Two-leg trade dispatch.
//!
//! The engine only builds a [`TradeRequest`] from a live opportunity and hands
//! it to an [`ExecutionGateway`]. Each venue plugs in its own [`LegExecutor`];
//! the gateway runs both legs concurrently and always reports two independent
//! outcomes.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::engine::types::{Opportunity, Venue};
use crate::error::ExecutionError;

pub mod simulated;

pub use simulated::SimulatedExecutor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegSide {
    Short,
    Long,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeParams {
    /// USDC notional per leg.
    pub amount_per_leg: f64,
    pub leverage: u32,
    #[serde(default)]
    pub stop_loss_pct: Option<f64>,
    #[serde(default)]
    pub take_profit_pct: Option<f64>,
}

impl TradeParams {
    pub const MAX_LEVERAGE: u32 = 5;

    pub fn validate(&self) -> Result<(), ExecutionError> {
        if !self.amount_per_leg.is_finite() || self.amount_per_leg <= 0.0 {
            return Err(ExecutionError::InvalidParams(format!(
                "amount_per_leg must be positive, got {}",
                self.amount_per_leg
            )));
        }
        if !(1..=Self::MAX_LEVERAGE).contains(&self.leverage) {
            return Err(ExecutionError::InvalidParams(format!(
                "leverage must be 1..={}, got {}",
                Self::MAX_LEVERAGE,
                self.leverage
            )));
        }
        for (name, pct) in [("stop_loss_pct", self.stop_loss_pct), ("take_profit_pct", self.take_profit_pct)] {
            if let Some(p) = pct {
                if !p.is_finite() || p <= 0.0 {
                    return Err(ExecutionError::InvalidParams(format!("{name} must be positive, got {p}")));
                }
            }
        }
        Ok(())
    }
}

/// Everything needed to place both legs of one opportunity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRequest {
    pub opportunity: Opportunity,
    pub params: TradeParams,
}

impl TradeRequest {
    pub fn new(opportunity: Opportunity, params: TradeParams) -> Result<Self, ExecutionError> {
        params.validate()?;
        Ok(Self { opportunity, params })
    }

    /// `[short leg on short_venue, long leg on long_venue]`
    pub fn legs(&self) -> [LegOrder; 2] {
        [self.short_leg(), self.long_leg()]
    }

    pub fn short_leg(&self) -> LegOrder {
        self.leg(LegSide::Short, self.opportunity.short_venue)
    }

    pub fn long_leg(&self) -> LegOrder {
        self.leg(LegSide::Long, self.opportunity.long_venue)
    }

    fn leg(&self, side: LegSide, venue: Venue) -> LegOrder {
        LegOrder {
            venue,
            symbol: self.opportunity.symbol.clone(),
            side,
            amount: self.params.amount_per_leg,
            leverage: self.params.leverage,
            stop_loss_pct: self.params.stop_loss_pct,
            take_profit_pct: self.params.take_profit_pct,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegOrder {
    pub venue: Venue,
    pub symbol: String,
    pub side: LegSide,
    pub amount: f64,
    pub leverage: u32,
    pub stop_loss_pct: Option<f64>,
    pub take_profit_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegResult {
    pub venue: Venue,
    pub side: LegSide,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub short_leg: LegResult,
    pub long_leg: LegResult,
}

/// Places one leg on one venue and returns its transaction hash.
#[async_trait::async_trait]
pub trait LegExecutor: Send + Sync {
    async fn execute(&self, leg: &LegOrder) -> Result<String, ExecutionError>;
}

#[derive(Default, Clone)]
pub struct ExecutionGateway {
    executors: HashMap<Venue, Arc<dyn LegExecutor>>,
}

impl ExecutionGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_executor(mut self, venue: Venue, executor: Arc<dyn LegExecutor>) -> Self {
        self.executors.insert(venue, executor);
        self
    }

    /// The same simulated executor on every venue.
    pub fn simulated(executor: SimulatedExecutor) -> Self {
        let shared: Arc<dyn LegExecutor> = Arc::new(executor);
        Venue::ALL
            .into_iter()
            .fold(Self::new(), |gw, venue| gw.with_executor(venue, Arc::clone(&shared)))
    }

    #[instrument(skip_all, fields(id = %request.opportunity.id))]
    pub async fn execute(&self, request: &TradeRequest) -> ExecutionReport {
        let [short, long] = request.legs();
        let (short_leg, long_leg) = tokio::join!(self.run_leg(short), self.run_leg(long));
        ExecutionReport { short_leg, long_leg }
    }

    async fn run_leg(&self, leg: LegOrder) -> LegResult {
        info!(
            venue = %leg.venue,
            side = ?leg.side,
            symbol = %leg.symbol,
            amount = leg.amount,
            leverage = leg.leverage,
            stop_loss_pct = ?leg.stop_loss_pct,
            take_profit_pct = ?leg.take_profit_pct,
            "executing leg"
        );
        let outcome = match self.executors.get(&leg.venue) {
            Some(executor) => executor.execute(&leg).await,
            None => Err(ExecutionError::NoExecutor(leg.venue)),
        };
        match outcome {
            Ok(tx_hash) => LegResult {
                venue: leg.venue,
                side: leg.side,
                success: true,
                tx_hash: Some(tx_hash),
                error: None,
            },
            Err(e) => {
                warn!(venue = %leg.venue, side = ?leg.side, error = %e, "leg failed");
                LegResult {
                    venue: leg.venue,
                    side: leg.side,
                    success: false,
                    tx_hash: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}
