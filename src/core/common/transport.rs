use reqwest::StatusCode;

/// Outcome of a failed backend call.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Non-success HTTP status, `message` is the raw response text.
    #[error("{message}")]
    Failed { status: StatusCode, message: String },
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}
