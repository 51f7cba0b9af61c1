use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GateError {
    #[error("access password required; unlock this client first")]
    Locked,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("request failed with status {status}: {body}")]
    Relay { status: u16, body: Value },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}
