use thiserror::Error;

#[derive(Error, Debug)]
pub enum CdLensError {
    #[error("API request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("API request still failing with status {status} after {retries} retries")]
    ApiAfterRetries { status: u16, retries: u32 },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Expected exactly one reference matching '{pattern}', but found {candidates}")]
    AmbiguousMainline { pattern: String, candidates: usize },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CdLensError>;
