use thiserror::Error;

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("Invalid caption payload: {0}")]
    InvalidPayload(String),

    #[error("{0}")]
    ParseError(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, OverlayError>;
