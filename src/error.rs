use thiserror::Error;

use crate::engine::types::Venue;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{venue} returned HTTP {status}")]
    Status { venue: Venue, status: u16 },

    #[error("payload decode failed: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("unexpected payload shape: {0}")]
    Schema(String),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error("stream closed by remote")]
    Closed,
}

pub type AdapterResult<T> = Result<T, AdapterError>;

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("invalid trade parameters: {0}")]
    InvalidParams(String),

    #[error("no executor registered for {0}")]
    NoExecutor(Venue),

    #[error("order rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no current opportunity with id {0}")]
    OpportunityNotFound(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

pub type EngineResult<T> = Result<T, EngineError>;
