//! Error types for claude-aloud.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AloudError>;

#[derive(Error, Debug)]
pub enum AloudError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{stage} failed with status {status}")]
    EngineStatus {
        stage: &'static str,
        status: reqwest::StatusCode,
    },

    #[error("Engine did not answer within {0:?}")]
    Timeout(std::time::Duration),

    #[error("Audio query is not a JSON object")]
    MalformedQuery,

    #[error("Audio playback error: {0}")]
    Playback(String),
}
