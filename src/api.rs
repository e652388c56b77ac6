//! Read-only JSON view of the engine plus trade submission.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::engine::types::{ConnectionState, Venue};
use crate::error::{EngineError, ExecutionError};
use crate::execution::TradeParams;
use crate::market_data::router::EngineHandle;

pub fn router(handle: EngineHandle) -> Router {
    Router::new()
        .route("/api/rates", get(rates))
        .route("/api/opportunities", get(opportunities))
        .route("/api/status", get(status))
        .route("/api/trades", post(trade))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(handle)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusBody {
    pub stream_status: ConnectionState,
    pub last_updated: Option<DateTime<Utc>>,
    pub symbols: usize,
    pub opportunities: usize,
}

#[derive(Debug, Deserialize)]
pub struct TradeBody {
    pub symbol: String,
    pub short_venue: Venue,
    pub long_venue: Venue,
    #[serde(flatten)]
    pub params: TradeParams,
}

async fn rates(State(handle): State<EngineHandle>) -> Response {
    Json(&*handle.rates()).into_response()
}

async fn opportunities(State(handle): State<EngineHandle>) -> Response {
    Json(&*handle.opportunities()).into_response()
}

async fn status(State(handle): State<EngineHandle>) -> Json<StatusBody> {
    let snap = handle.snapshot();
    Json(StatusBody {
        stream_status: snap.stream_status,
        last_updated: snap.last_updated,
        symbols: snap.rates.symbol_count(),
        opportunities: snap.opportunities.len(),
    })
}

async fn trade(State(handle): State<EngineHandle>, Json(body): Json<TradeBody>) -> Response {
    let request = match handle.prepare_trade(&body.symbol, body.short_venue, body.long_venue, body.params) {
        Ok(req) => req,
        Err(e) => return error_response(e),
    };
    Json(handle.execute(&request).await).into_response()
}

fn error_response(err: EngineError) -> Response {
    let status = match &err {
        EngineError::OpportunityNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::Execution(ExecutionError::InvalidParams(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(serde_json::json!({ "error": err.to_string() }))).into_response()
}
