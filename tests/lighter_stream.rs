use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use fundx_rs::error::AdapterError;
use fundx_rs::execution::{ExecutionGateway, SimulatedExecutor};
use fundx_rs::market_data::adapters::lighter::{LighterAdapter, LighterConfig};
use fundx_rs::market_data::adapters::{MarketEvent, StreamAdapter};
use fundx_rs::market_data::scheduler::Scheduler;
use fundx_rs::{ConnectionState, Engine, Venue};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

const DEAD_DISCOVERY: &str = "http://127.0.0.1:1/v1/order-book";

enum Finish {
    AwaitClient,
    CloseFromServer,
}

/// One-shot websocket venue: reads `expect_subs` subscribe frames, pushes
/// `frames`, then either waits for the client to leave or closes itself.
/// Resolves to the subscribed channel names.
async fn ws_venue(expect_subs: usize, frames: Vec<String>, finish: Finish) -> (String, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/stream", listener.local_addr().unwrap());

    let server = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();

        let mut channels = Vec::new();
        while channels.len() < expect_subs {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    let v: serde_json::Value = serde_json::from_str(&text).unwrap();
                    assert_eq!(v["type"], "subscribe");
                    channels.push(v["channel"].as_str().unwrap().to_string());
                }
                Some(Ok(_)) => {}
                other => panic!("client went away during subscribe: {other:?}"),
            }
        }

        for frame in frames {
            ws.send(Message::Text(frame)).await.unwrap();
        }

        match finish {
            Finish::AwaitClient => while let Some(Ok(msg)) = ws.next().await {
                if msg.is_close() {
                    break;
                }
            },
            Finish::CloseFromServer => {
                let _ = ws.close(None).await;
            }
        }
        channels
    });

    (url, server)
}

/// Accepts any number of websocket clients, completes the handshake and
/// then stays silent.
async fn silent_venue() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/stream", listener.local_addr().unwrap());
    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            tokio::spawn(async move {
                if let Ok(mut ws) = tokio_tungstenite::accept_async(tcp).await {
                    while let Some(Ok(_)) = ws.next().await {}
                }
            });
        }
    });
    url
}

async fn slow_discovery_venue(delay: Duration) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/v1/order-book", listener.local_addr().unwrap());
    let app = Router::new().route(
        "/v1/order-book",
        get(move || async move {
            tokio::time::sleep(delay).await;
            Json(json!({ "order_books": [] }))
        }),
    );
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    url
}

async fn wait_state(lighter: &LighterAdapter, want: ConnectionState) {
    let mut states = lighter.state();
    tokio::time::timeout(Duration::from_secs(5), states.wait_for(|s| *s == want))
        .await
        .expect("state not reached in time")
        .unwrap();
}

async fn discovery_venue(body: serde_json::Value) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/v1/order-book", listener.local_addr().unwrap());
    let app = Router::new().route("/v1/order-book", get(move || async move { Json(body) }));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    url
}

fn adapter(ws_url: &str, discovery_url: &str) -> Arc<LighterAdapter> {
    adapter_with_discovery_timeout(ws_url, discovery_url, Duration::from_millis(500))
}

fn adapter_with_discovery_timeout(ws_url: &str, discovery_url: &str, discovery_timeout: Duration) -> Arc<LighterAdapter> {
    Arc::new(LighterAdapter::new(LighterConfig {
        ws_url: ws_url.to_string(),
        discovery_url: discovery_url.to_string(),
        discovery_timeout,
        subscription_floor: 19,
        subscription_margin: 5,
    }))
}

fn stats_frame(market_id: u32, funding_rate: &str) -> String {
    json!({
        "type": "update/market_stats",
        "channel": format!("market_stats:{market_id}"),
        "market_stats": { "market_id": market_id, "funding_rate": funding_rate }
    })
    .to_string()
}

async fn next_batch(rx: &mut mpsc::Receiver<MarketEvent>) -> Vec<fundx_rs::RateRecord> {
    let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no batch in time")
        .expect("channel closed");
    let MarketEvent::Rates { records } = event;
    records
}

#[tokio::test]
async fn discovery_failure_still_subscribes_fallback_range() {
    let (url, server) = ws_venue(25, vec![stats_frame(37, "0.0001")], Finish::AwaitClient).await;
    let lighter = adapter(&url, DEAD_DISCOVERY);
    let (tx, mut rx) = mpsc::channel(16);

    let session = tokio::spawn({
        let lighter = Arc::clone(&lighter);
        async move { lighter.connect(tx, CancellationToken::new()).await }
    });

    let batch = next_batch(&mut rx).await;
    assert_eq!(lighter.current_state(), ConnectionState::Connected);
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].symbol, "MARKET_37");
    assert_eq!(batch[0].venue, Venue::Lighter);
    assert!((batch[0].rate - 0.01).abs() < 1e-12);

    lighter.disconnect();
    assert!(session.await.unwrap().is_ok());
    assert_eq!(lighter.current_state(), ConnectionState::Idle);

    let channels = server.await.unwrap();
    let expected: Vec<String> = (0..=24).map(|id| format!("market_stats/{id}")).collect();
    assert_eq!(channels, expected);
}

#[tokio::test]
async fn discovered_markets_extend_subscriptions() {
    let discovery = discovery_venue(json!({
        "order_books": [
            { "id": 0, "symbol": "BTC-USDC" },
            { "id": 42, "symbol": "HYPE" }
        ]
    }))
    .await;
    let frames = vec![stats_frame(42, "-0.0002"), stats_frame(0, "0.0003")];
    let (url, server) = ws_venue(48, frames, Finish::AwaitClient).await;
    let lighter = adapter(&url, &discovery);
    let (tx, mut rx) = mpsc::channel(16);

    let session = tokio::spawn({
        let lighter = Arc::clone(&lighter);
        async move { lighter.connect(tx, CancellationToken::new()).await }
    });

    let first = next_batch(&mut rx).await;
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].symbol, "HYPEUSDT");

    // each update carries the whole cache
    let second = next_batch(&mut rx).await;
    let symbols: Vec<&str> = second.iter().map(|r| r.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["BTCUSDT", "HYPEUSDT"]);

    assert_eq!(lighter.markets().get(&9).map(String::as_str), Some("LINKUSDT"));

    lighter.disconnect();
    assert!(session.await.unwrap().is_ok());
    assert_eq!(server.await.unwrap().len(), 48);
}

#[tokio::test]
async fn server_close_moves_to_error() {
    let (url, server) = ws_venue(25, Vec::new(), Finish::CloseFromServer).await;
    let lighter = adapter(&url, DEAD_DISCOVERY);
    let (tx, _rx) = mpsc::channel(16);

    let result = tokio::time::timeout(Duration::from_secs(5), lighter.connect(tx, CancellationToken::new()))
        .await
        .expect("session did not end");

    assert!(result.is_err());
    assert_eq!(lighter.current_state(), ConnectionState::Error);
    server.await.unwrap();
}

#[tokio::test]
async fn unreachable_endpoint_is_error() {
    let lighter = adapter("ws://127.0.0.1:1/stream", DEAD_DISCOVERY);
    let mut states = lighter.state();
    let (tx, _rx) = mpsc::channel(16);

    let err = lighter.connect(tx, CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, AdapterError::WebSocket(_)));
    assert_eq!(*states.borrow_and_update(), ConnectionState::Error);
}

#[tokio::test]
async fn engine_stopped_right_after_start_leaves_stream_idle() {
    let url = silent_venue().await;
    let lighter = adapter(&url, DEAD_DISCOVERY);
    let scheduler = Scheduler::new(Duration::from_secs(3600), Duration::from_millis(200)).with_stream(lighter.clone());
    let gateway = ExecutionGateway::simulated(SimulatedExecutor::new(Duration::ZERO, 1.0));

    let engine = Engine::start(scheduler, gateway, 0.005, 16);
    let handle = engine.handle();
    let started = std::time::Instant::now();
    engine.shutdown().await;

    assert!(started.elapsed() < Duration::from_secs(2), "shutdown took {:?}", started.elapsed());
    assert_eq!(lighter.current_state(), ConnectionState::Idle);
    assert_eq!(handle.stream_status(), ConnectionState::Idle);
}

#[tokio::test]
async fn disconnect_during_slow_discovery_ends_session() {
    let discovery = slow_discovery_venue(Duration::from_secs(30)).await;
    // an unreachable stream endpoint: reaching it would end in Error
    let lighter = adapter_with_discovery_timeout("ws://127.0.0.1:1/stream", &discovery, Duration::from_secs(60));
    let (tx, _rx) = mpsc::channel(16);

    let session = tokio::spawn({
        let lighter = Arc::clone(&lighter);
        async move { lighter.connect(tx, CancellationToken::new()).await }
    });
    wait_state(&lighter, ConnectionState::Connecting).await;
    lighter.disconnect();

    let result = tokio::time::timeout(Duration::from_secs(2), session)
        .await
        .expect("discovery kept the session alive")
        .unwrap();
    assert!(result.is_ok());
    assert_eq!(lighter.current_state(), ConnectionState::Idle);
}

#[tokio::test]
async fn cancelled_before_start_never_connects() {
    let lighter = adapter("ws://127.0.0.1:1/stream", DEAD_DISCOVERY);
    let cancel = CancellationToken::new();
    cancel.cancel();
    let (tx, _rx) = mpsc::channel(16);

    assert!(lighter.connect(tx, cancel).await.is_ok());
    assert_eq!(lighter.current_state(), ConnectionState::Idle);
}

#[tokio::test]
async fn aborted_session_returns_to_idle() {
    let url = silent_venue().await;
    let lighter = adapter(&url, DEAD_DISCOVERY);
    let (tx, _rx) = mpsc::channel(16);

    let session = tokio::spawn({
        let lighter = Arc::clone(&lighter);
        async move { lighter.connect(tx, CancellationToken::new()).await }
    });
    wait_state(&lighter, ConnectionState::Connected).await;

    session.abort();
    assert!(session.await.unwrap_err().is_cancelled());
    assert_eq!(lighter.current_state(), ConnectionState::Idle);
}
