use thiserror::Error;

pub type Result<T> = std::result::Result<T, StagehandError>;

#[derive(Debug, Error)]
pub enum StagehandError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Session already closed: {0}")]
    SessionClosed(String),
}

impl From<reqwest::Error> for StagehandError {
    fn from(err: reqwest::Error) -> Self {
        StagehandError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for StagehandError {
    fn from(err: serde_json::Error) -> Self {
        StagehandError::Parse(err.to_string())
    }
}
