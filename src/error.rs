//! Error types for the dashcam client.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DashcamError {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config: {0}")]
    Config(String),

    #[error("no camera selected")]
    NoCameraSelected,

    #[error("dashcam not reachable: {0}")]
    NotConnected(String),

    #[error("unknown camera id {0}")]
    UnknownCamera(u64),

    #[error("invalid IPv4 address: {0}")]
    InvalidIp(String),

    #[error("transfer stalled: {0}")]
    Stalled(String),

    #[error("not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, DashcamError>;
