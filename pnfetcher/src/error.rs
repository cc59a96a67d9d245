use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("source store returned error: {0}")]
    Api(String),

    #[error("cursor protocol error: {0}")]
    Cursor(String),
}

pub type Result<T> = std::result::Result<T, SourceError>;
