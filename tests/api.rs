use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use fundx_rs::api::{self, StatusBody};
use fundx_rs::error::AdapterResult;
use fundx_rs::execution::{ExecutionGateway, ExecutionReport, SimulatedExecutor};
use fundx_rs::market_data::adapters::PollAdapter;
use fundx_rs::market_data::scheduler::Scheduler;
use fundx_rs::{ConnectionState, Engine, Opportunity, RateRecord, Venue};
use serde_json::{json, Value};
use tower::ServiceExt;

struct Static(Venue, Vec<(&'static str, f64)>);

#[async_trait::async_trait]
impl PollAdapter for Static {
    fn venue(&self) -> Venue {
        self.0
    }

    async fn try_fetch(&self) -> AdapterResult<Vec<RateRecord>> {
        Ok(self.1.iter().map(|(s, r)| RateRecord::new(*s, self.0, *r)).collect())
    }
}

async fn engine(venues: Vec<Static>) -> Engine {
    let expect_data = !venues.is_empty();
    let scheduler = venues.into_iter().fold(
        Scheduler::new(Duration::from_secs(3600), Duration::from_millis(200)),
        |s, v| s.with_poll(Arc::new(v)),
    );
    let gateway = ExecutionGateway::simulated(SimulatedExecutor::new(Duration::ZERO, 1.0));
    let engine = Engine::start(scheduler, gateway, 0.005, 16);

    if expect_data {
        let handle = engine.handle();
        tokio::time::timeout(Duration::from_secs(5), async {
            while handle.last_updated().is_none() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("first poll did not land");
    }
    engine
}

fn btc_venues() -> Vec<Static> {
    vec![
        Static(Venue::Aster, vec![("BTCUSDT", 0.02), ("ETHUSDT", 0.001)]),
        Static(Venue::Lighter, vec![("BTCUSDT", -0.01), ("ETHUSDT", 0.0005)]),
    ]
}

async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, Value) {
    let res = app.oneshot(Request::get(uri).body(Body::empty()).unwrap()).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn post_trade(app: axum::Router, body: Value) -> (StatusCode, Value) {
    let req = Request::post("/api/trades")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let res = app.oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn rates_and_opportunities_reflect_engine() {
    let engine = engine(btc_venues()).await;
    let app = api::router(engine.handle());

    let (status, rates) = get_json(app.clone(), "/api/rates").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rates["BTCUSDT"]["Aster"], json!(0.02));
    assert_eq!(rates["ETHUSDT"]["Lighter"], json!(0.0005));

    let (status, opps) = get_json(app, "/api/opportunities").await;
    assert_eq!(status, StatusCode::OK);
    let opps: Vec<Opportunity> = serde_json::from_value(opps).unwrap();
    assert_eq!(opps.len(), 1);
    assert_eq!(opps[0].id, "BTCUSDT-Aster-Lighter");

    engine.shutdown().await;
}

#[tokio::test]
async fn status_before_any_data() {
    let engine = engine(Vec::new()).await;
    let (status, body) = get_json(api::router(engine.handle()), "/api/status").await;

    assert_eq!(status, StatusCode::OK);
    let body: StatusBody = serde_json::from_value(body).unwrap();
    assert_eq!(body.stream_status, ConnectionState::Idle);
    assert_eq!(body.last_updated, None);
    assert_eq!(body.symbols, 0);
    assert_eq!(body.opportunities, 0);

    engine.shutdown().await;
}

#[tokio::test]
async fn trade_on_live_opportunity_reports_both_legs() {
    let engine = engine(btc_venues()).await;
    let body = json!({
        "symbol": "BTCUSDT",
        "short_venue": "Aster",
        "long_venue": "Lighter",
        "amount_per_leg": 250.0,
        "leverage": 2,
        "stop_loss_pct": 3.0
    });

    let (status, report) = post_trade(api::router(engine.handle()), body).await;

    assert_eq!(status, StatusCode::OK);
    let report: ExecutionReport = serde_json::from_value(report).unwrap();
    assert!(report.short_leg.success && report.long_leg.success);
    assert_eq!(report.short_leg.venue, Venue::Aster);
    assert_eq!(report.long_leg.venue, Venue::Lighter);
    assert!(report.short_leg.tx_hash.unwrap().starts_with("0x"));

    engine.shutdown().await;
}

#[tokio::test]
async fn trade_on_unknown_pair_is_404() {
    let engine = engine(btc_venues()).await;
    let body = json!({
        "symbol": "ETHUSDT",
        "short_venue": "Aster",
        "long_venue": "Lighter",
        "amount_per_leg": 100.0,
        "leverage": 1
    });

    let (status, err) = post_trade(api::router(engine.handle()), body).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(err["error"].as_str().unwrap().contains("ETHUSDT-Aster-Lighter"));

    engine.shutdown().await;
}

#[tokio::test]
async fn trade_with_bad_leverage_is_422() {
    let engine = engine(btc_venues()).await;
    let body = json!({
        "symbol": "BTCUSDT",
        "short_venue": "Aster",
        "long_venue": "Lighter",
        "amount_per_leg": 100.0,
        "leverage": 9
    });

    let (status, _) = post_trade(api::router(engine.handle()), body).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    engine.shutdown().await;
}
