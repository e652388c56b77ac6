//! Runtime configuration.
//!
//! Loaded from an optional TOML file layered under `FUNDX_*` environment
//! variables (`__` separates sections, e.g. `FUNDX_ENGINE__REFRESH_INTERVAL_MS`).
//! Every field has a default, so an empty environment yields a working setup.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{EngineError, EngineResult};

pub const DEFAULT_CONFIG_PATH: &str = "fundx.toml";
pub const ENV_PREFIX: &str = "FUNDX";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineSettings,
    pub venues: VenueSettings,
    pub execution: ExecutionSettings,
    pub api: ApiSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Poll cadence for HTTP venues.
    pub refresh_interval_ms: u64,
    /// Opportunities must have a spread strictly above this (percent units).
    pub min_spread_threshold_pct: f64,
    /// Capacity of the adapter -> merge loop channel.
    pub channel_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 30_000,
            min_spread_threshold_pct: 0.005,
            channel_capacity: 1_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VenueSettings {
    pub aster_url: String,
    pub hyperliquid_info_url: String,
    pub lighter_ws_url: String,
    pub lighter_discovery_url: String,
    pub request_timeout_ms: u64,
    pub discovery_timeout_ms: u64,
    /// Lowest "highest id" used when planning stream subscriptions.
    pub subscription_floor: u32,
    /// Extra ids subscribed past the highest known market.
    pub subscription_margin: u32,
    pub variational_symbols: Vec<String>,
    pub variational_latency_ms: u64,
}

impl Default for VenueSettings {
    fn default() -> Self {
        Self {
            aster_url: "https://fapi.asterdex.com/fapi/v1/premiumIndex".into(),
            hyperliquid_info_url: "https://api.hyperliquid.xyz/info".into(),
            lighter_ws_url: "wss://mainnet.zklighter.elliot.ai/stream".into(),
            lighter_discovery_url: "https://mainnet.zklighter.elliot.ai/v1/order-book".into(),
            request_timeout_ms: 10_000,
            discovery_timeout_ms: 5_000,
            subscription_floor: 19,
            subscription_margin: 5,
            variational_symbols: ["BTCUSDT", "ETHUSDT", "XPLUSDT", "SOLUSDT", "ARBUSDT"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            variational_latency_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutionSettings {
    pub simulated_latency_ms: u64,
    /// Probability in [0, 1] that a simulated leg succeeds.
    pub success_probability: f64,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self { simulated_latency_ms: 2_000, success_probability: 1.0 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub bind: String,
    pub metrics_port: u16,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self { bind: "127.0.0.1:8080".into(), metrics_port: 9000 }
    }
}

/// Command-line values that win over the file and the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub min_spread_threshold_pct: Option<f64>,
    pub refresh_interval_ms: Option<u64>,
    pub bind: Option<String>,
}

impl AppConfig {
    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(t) = overrides.min_spread_threshold_pct {
            self.engine.min_spread_threshold_pct = t;
        }
        if let Some(ms) = overrides.refresh_interval_ms {
            self.engine.refresh_interval_ms = ms;
        }
        if let Some(bind) = overrides.bind {
            self.api.bind = bind;
        }
    }

    /// Read `path` (if it exists) and the environment. Callers apply any
    /// [`Overrides`] and then [`validate`](Self::validate).
    pub fn load(path: &str) -> EngineResult<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("venues.variational_symbols")
                    .try_parsing(true),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.engine.refresh_interval_ms == 0 {
            return Err(EngineError::InvalidConfig("engine.refresh_interval_ms must be > 0".into()));
        }
        if !self.engine.min_spread_threshold_pct.is_finite() {
            return Err(EngineError::InvalidConfig(
                "engine.min_spread_threshold_pct must be finite".into(),
            ));
        }
        if self.engine.channel_capacity == 0 {
            return Err(EngineError::InvalidConfig("engine.channel_capacity must be > 0".into()));
        }
        let p = self.execution.success_probability;
        if !(0.0..=1.0).contains(&p) {
            return Err(EngineError::InvalidConfig(format!(
                "execution.success_probability must be in [0, 1], got {p}"
            )));
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.engine.refresh_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.venues.request_timeout_ms)
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.venues.discovery_timeout_ms)
    }
}
