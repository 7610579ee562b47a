use thiserror::Error;

/// Errors surfaced by the HTTP API client.
///
/// One enum at this crate's boundary; no bare `String` escapes across it.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Token registration or renewal failed. Fatal at startup.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The remote responded but violated the protocol this client assumes
    /// (bad status, empty response, `Success: false`).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// `get_metadata` found no entry with the requested id.
    #[error("document not found: {0}")]
    DocumentNotFound(String),

    #[error("http request failed")]
    Http(#[from] reqwest::Error),

    #[error("failed to parse response body")]
    Json(#[from] serde_json::Error),
}
