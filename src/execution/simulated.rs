// Stand-in executor: no venue integration, just latency and a coin flip.

use std::time::Duration;

use rand::Rng;

use super::{LegExecutor, LegOrder};
use crate::config::ExecutionSettings;
use crate::error::ExecutionError;

#[derive(Debug, Clone)]
pub struct SimulatedExecutor {
    latency: Duration,
    success_probability: f64,
}

impl SimulatedExecutor {
    /// A non-finite probability is treated as 0 (every leg rejected).
    pub fn new(latency: Duration, success_probability: f64) -> Self {
        let success_probability =
            if success_probability.is_finite() { success_probability.clamp(0.0, 1.0) } else { 0.0 };
        Self { latency, success_probability }
    }

    pub fn from_settings(settings: &ExecutionSettings) -> Self {
        Self::new(Duration::from_millis(settings.simulated_latency_ms), settings.success_probability)
    }

    fn roll(&self) -> Option<String> {
        let mut rng = rand::thread_rng();
        if !rng.gen_bool(self.success_probability) {
            return None;
        }
        let bytes: [u8; 32] = rng.gen();
        Some(format!("0x{}", bytes.iter().map(|b| format!("{b:02x}")).collect::<String>()))
    }
}

#[async_trait::async_trait]
impl LegExecutor for SimulatedExecutor {
    async fn execute(&self, leg: &LegOrder) -> Result<String, ExecutionError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.roll()
            .ok_or_else(|| ExecutionError::Rejected(format!("simulated rejection on {}", leg.venue)))
    }
}
