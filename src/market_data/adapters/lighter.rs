// Lighter: websocket market_stats stream with REST market discovery.
//
// Lifecycle: Idle -> Connecting -> Connected -> (Error | Idle). One call to
// `connect` is one session; the adapter never reconnects on its own.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::time::Duration;

use ahash::AHashMap;
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

use super::lighter_types::{OrderBooks, OrderBooksResponse, SubscribeFrame, WsFrame};
use super::{http_client, MarketEvent, StreamAdapter};
use crate::config::AppConfig;
use crate::engine::types::{ConnectionState, RateRecord, Venue};
use crate::error::{AdapterError, AdapterResult};
use crate::market_data::normaliser::{canonical_symbol, placeholder_symbol};

/// Market ids known before any discovery call.
pub const STATIC_MARKETS: [(u32, &str); 10] = [
    (0, "BTCUSDT"),
    (1, "ETHUSDT"),
    (2, "XPLUSDT"),
    (3, "SOLUSDT"),
    (4, "MATICUSDT"),
    (5, "AVAXUSDT"),
    (6, "ARBUSDT"),
    (7, "OPUSDT"),
    (8, "BNBUSDT"),
    (9, "LINKUSDT"),
];

const STATS_UPDATE: &str = "update/market_stats";
const STATS_SUBSCRIBED: &str = "subscribed/market_stats";

/// Market id -> canonical symbol, seeded from [`STATIC_MARKETS`].
#[derive(Debug, Clone)]
pub struct MarketDirectory {
    markets: AHashMap<u32, String>,
}

impl MarketDirectory {
    pub fn with_fallback() -> Self {
        let markets = STATIC_MARKETS.iter().map(|(id, s)| (*id, s.to_string())).collect();
        Self { markets }
    }

    /// Overwrite key-by-key; ids absent from `fresh` keep their old symbol.
    pub fn merge(&mut self, fresh: AHashMap<u32, String>) {
        self.markets.extend(fresh);
    }

    pub fn resolve(&self, market_id: u32) -> String {
        self.markets.get(&market_id).cloned().unwrap_or_else(|| placeholder_symbol(market_id))
    }

    pub fn max_id(&self) -> Option<u32> {
        self.markets.keys().copied().max()
    }

    /// `0..=max(highest id, floor) + margin`
    pub fn subscription_ids(&self, floor: u32, margin: u32) -> RangeInclusive<u32> {
        let top = self.max_id().unwrap_or(0).max(floor);
        0..=top.saturating_add(margin)
    }

    pub(crate) fn len(&self) -> usize {
        self.markets.len()
    }

    pub fn to_map(&self) -> AHashMap<u32, String> {
        self.markets.clone()
    }
}

/// Decode a `/v1/order-book` body into id -> canonical symbol. Entries without
/// an id or a usable symbol are dropped.
pub fn parse_order_books(body: &str) -> AdapterResult<AHashMap<u32, String>> {
    let response: OrderBooksResponse = serde_json::from_str(body)?;
    let Some(books) = response.order_books else {
        return Err(AdapterError::Schema("order-book: missing order_books".into()));
    };

    let entries: Vec<(Option<u32>, Option<String>)> = match books {
        OrderBooks::List(list) => list.into_iter().map(|e| (e.id, e.symbol)).collect(),
        OrderBooks::Keyed(map) => map
            .into_iter()
            .map(|(key, e)| (key.parse().ok().or(e.id), e.symbol))
            .collect(),
    };

    Ok(entries
        .into_iter()
        .filter_map(|(id, symbol)| Some((id?, canonical_symbol(symbol.as_deref()?)?)))
        .collect())
}

/// Pull (market id, rate in percent) out of one stream frame. Anything that
/// is not a market_stats frame with an id and a rate yields `None`.
pub fn parse_market_stats(text: &str) -> Option<(u32, f64)> {
    let frame: WsFrame = serde_json::from_str(text).ok()?;
    let kind = frame.kind.as_deref()?;
    if kind != STATS_UPDATE && kind != STATS_SUBSCRIBED {
        return None;
    }

    let stats = frame.market_stats.or(frame.stats)?;
    let market_id = frame.market_index.or(stats.market_id)?;
    let fraction = stats
        .funding_rate
        .as_ref()
        .and_then(|r| r.as_fraction())
        .or_else(|| stats.current_funding_rate.as_ref().and_then(|r| r.as_fraction()))?;

    let pct = fraction * 100.0;
    pct.is_finite().then_some((market_id, pct))
}

#[derive(Debug, Clone)]
pub struct LighterConfig {
    pub ws_url: String,
    pub discovery_url: String,
    pub discovery_timeout: Duration,
    pub subscription_floor: u32,
    pub subscription_margin: u32,
}

impl From<&AppConfig> for LighterConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            ws_url: cfg.venues.lighter_ws_url.clone(),
            discovery_url: cfg.venues.lighter_discovery_url.clone(),
            discovery_timeout: cfg.discovery_timeout(),
            subscription_floor: cfg.venues.subscription_floor,
            subscription_margin: cfg.venues.subscription_margin,
        }
    }
}

pub struct LighterAdapter {
    config: LighterConfig,
    client: reqwest::Client,
    markets: RwLock<MarketDirectory>,
    // symbol -> last rate; emitted whole on every update
    cache: Mutex<BTreeMap<String, f64>>,
    state_tx: watch::Sender<ConnectionState>,
    // token of the current session, replaced on every `connect`
    session: Mutex<CancellationToken>,
}

// Drops back to Idle if a session future is dropped mid-flight (task abort).
// Sessions that ended in Error keep that state.
struct SessionGuard<'a>(&'a watch::Sender<ConnectionState>);

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.0.send_if_modified(|state| match state {
            ConnectionState::Connecting | ConnectionState::Connected => {
                *state = ConnectionState::Idle;
                true
            }
            _ => false,
        });
    }
}

impl LighterAdapter {
    pub fn new(config: LighterConfig) -> Self {
        let client = http_client(config.discovery_timeout);
        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        Self {
            config,
            client,
            markets: RwLock::new(MarketDirectory::with_fallback()),
            cache: Mutex::new(BTreeMap::new()),
            state_tx,
            session: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn current_state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Copy of the discovery map.
    pub fn markets(&self) -> AHashMap<u32, String> {
        self.markets.read().to_map()
    }

    fn set_state(&self, next: ConnectionState) {
        let prev = self.state_tx.send_replace(next);
        if prev != next {
            info!(venue = %Venue::Lighter, from = %prev, to = %next, "stream state changed");
        }
    }

    /// Best-effort discovery bounded by the configured timeout. On any error
    /// the current map is left untouched.
    #[instrument(level = "debug", skip(self), fields(url = %self.config.discovery_url))]
    pub async fn refresh_markets(&self) -> AdapterResult<usize> {
        let fetch = async {
            let res = self.client.get(&self.config.discovery_url).send().await?;
            if !res.status().is_success() {
                return Err(AdapterError::Status { venue: Venue::Lighter, status: res.status().as_u16() });
            }
            let body = res.text().await?;
            parse_order_books(&body)
        };
        let fresh = tokio::time::timeout(self.config.discovery_timeout, fetch)
            .await
            .map_err(|_| AdapterError::Timeout("market discovery"))??;

        let count = fresh.len();
        if count > 0 {
            let mut markets = self.markets.write();
            markets.merge(fresh);
            debug!(discovered = count, known = markets.len(), "market map updated");
        }
        Ok(count)
    }

    /// Decode one text frame, update the cache and return the full cache as
    /// a batch. Frames that are not usable market_stats return `None`.
    pub fn handle_text(&self, text: &str) -> Option<Vec<RateRecord>> {
        let Some((market_id, rate)) = parse_market_stats(text) else {
            trace!(frame = text, "ignoring frame");
            return None;
        };
        let symbol = self.markets.read().resolve(market_id);
        metrics::counter!("fundx_stream_messages_total").increment(1);

        let mut cache = self.cache.lock();
        cache.insert(symbol, rate);
        let observed_at = Utc::now();
        Some(
            cache
                .iter()
                .map(|(symbol, rate)| RateRecord {
                    symbol: symbol.clone(),
                    venue: Venue::Lighter,
                    rate: *rate,
                    observed_at,
                })
                .collect(),
        )
    }

    fn fail(&self, err: AdapterError) -> AdapterResult<()> {
        error!(venue = %Venue::Lighter, error = %err, "stream session failed");
        self.set_state(ConnectionState::Error);
        Err(err)
    }
}

#[async_trait::async_trait]
impl StreamAdapter for LighterAdapter {
    fn venue(&self) -> Venue {
        Venue::Lighter
    }

    async fn connect(&self, tx: mpsc::Sender<MarketEvent>, cancel: CancellationToken) -> AdapterResult<()> {
        // A child of the caller's token: a cancel issued before this point is
        // already visible, and `disconnect` only ever reaches this session.
        let token = {
            let mut guard = self.session.lock();
            *guard = cancel.child_token();
            guard.clone()
        };
        if token.is_cancelled() {
            debug!("stream cancelled before session start");
            self.set_state(ConnectionState::Idle);
            return Ok(());
        }
        let _session = SessionGuard(&self.state_tx);
        self.set_state(ConnectionState::Connecting);

        tokio::select! {
            _ = token.cancelled() => {
                self.set_state(ConnectionState::Idle);
                return Ok(());
            }
            res = self.refresh_markets() => match res {
                Ok(n) => info!(discovered = n, "lighter market discovery done"),
                Err(e) => warn!(error = %e, "lighter market discovery failed, keeping last-known map"),
            },
        }

        let opened = tokio::select! {
            _ = token.cancelled() => {
                self.set_state(ConnectionState::Idle);
                return Ok(());
            }
            res = tokio_tungstenite::connect_async(self.config.ws_url.as_str()) => res,
        };
        let (ws_stream, _response) = match opened {
            Ok(pair) => pair,
            Err(e) => return self.fail(e.into()),
        };
        self.set_state(ConnectionState::Connected);

        let (mut write, mut read) = ws_stream.split();

        // Subscriptions are rebuilt from the current map on every session.
        let ids = self
            .markets
            .read()
            .subscription_ids(self.config.subscription_floor, self.config.subscription_margin);
        let mut subscribed = 0u32;
        for id in ids {
            let frame = serde_json::to_string(&SubscribeFrame::market_stats(id))?;
            if let Err(e) = write.send(Message::Text(frame)).await {
                return self.fail(e.into());
            }
            subscribed += 1;
        }
        info!(subscribed, "lighter subscriptions sent");

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    let _ = write.close().await;
                    self.set_state(ConnectionState::Idle);
                    return Ok(());
                }
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(records) = self.handle_text(&text) {
                            if tx.send(MarketEvent::Rates { records }).await.is_err() {
                                debug!("merge loop gone, closing stream");
                                let _ = write.close().await;
                                self.set_state(ConnectionState::Idle);
                                return Ok(());
                            }
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "close frame from server");
                        return self.fail(AdapterError::Closed);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return self.fail(e.into()),
                    None => return self.fail(AdapterError::Closed),
                }
            }
        }
    }

    fn disconnect(&self) {
        self.session.lock().cancel();
    }

    fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }
}
