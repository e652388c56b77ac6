use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use fundx_rs::config::{AppConfig, Overrides, DEFAULT_CONFIG_PATH};
use fundx_rs::{api, telemetry, Engine, EngineHandle};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "fundx", about = "Cross-venue funding-rate arbitrage scanner")]
struct Args {
    /// Config file (TOML); missing file means defaults + environment.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Minimum spread in percent, overrides engine.min_spread_threshold_pct.
    #[arg(long)]
    threshold: Option<f64>,

    /// Poll cadence in milliseconds, overrides engine.refresh_interval_ms.
    #[arg(long)]
    refresh_ms: Option<u64>,

    /// API listen address, overrides api.bind.
    #[arg(long)]
    bind: Option<String>,

    /// Skip the HTTP API and log the top opportunities instead.
    #[arg(long)]
    headless: bool,
}

// Periodic log of the current view, used in headless mode
async fn log_summary(handle: EngineHandle, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        let snap = handle.snapshot();
        info!(
            stream = %snap.stream_status,
            symbols = snap.rates.symbol_count(),
            opportunities = snap.opportunities.len(),
            last_updated = ?snap.last_updated,
            "market summary"
        );
        for opp in snap.opportunities.iter().take(5) {
            info!(
                symbol = %opp.symbol,
                short = %opp.short_venue,
                long = %opp.long_venue,
                spread = %format!("{:.4}%", opp.spread),
                "opportunity"
            );
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok(); // load .env
    telemetry::init_tracing("info");

    let args = Args::parse();
    let mut cfg = AppConfig::load(&args.config).context("loading configuration")?;
    cfg.apply(Overrides {
        min_spread_threshold_pct: args.threshold,
        refresh_interval_ms: args.refresh_ms,
        bind: args.bind,
    });
    cfg.validate().context("validating configuration")?;

    telemetry::init_metrics(cfg.api.metrics_port)?;

    let engine = Engine::from_config(&cfg);
    let handle = engine.handle();

    if args.headless {
        let summary = tokio::spawn(log_summary(handle, cfg.refresh_interval()));
        tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
        summary.abort();
    } else {
        let listener = tokio::net::TcpListener::bind(&cfg.api.bind)
            .await
            .with_context(|| format!("binding {}", cfg.api.bind))?;
        info!(addr = %cfg.api.bind, "api listening");
        axum::serve(listener, api::router(handle))
            .with_graceful_shutdown(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "ctrl-c handler failed");
                }
            })
            .await
            .context("api server")?;
    }

    info!("shutting down");
    engine.shutdown().await;
    Ok(())
}
