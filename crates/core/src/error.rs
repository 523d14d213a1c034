//! Error types for the skylog domain.
//!
//! One `thiserror` enum per collaborator, plus an umbrella `Error` for
//! callers that drive several of them at once (the CLI, for instance).

use thiserror::Error;

/// Any failure surfaced by a skylog collaborator.
#[derive(Debug, Error)]
pub enum Error {
    #[error("LLM provider: {0}")]
    Provider(#[from] ProviderError),

    #[error("flight store: {0}")]
    Store(#[from] StoreError),

    #[error("bad flight-log JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Chat-completion failures. Only `MalformedResponse` is worth retrying.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    /// The API answered 200 but with no choices or no content.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ProviderError {
    /// Whether re-issuing the identical request may succeed.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedResponse(_))
    }
}

/// Failures of the flight-log database.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("The query contains multiple statements")]
    MultiStatement,

    /// Engine error text from a failed statement.
    #[error("{0}")]
    Execution(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Invalid ingest payload: {0}")]
    InvalidPayload(String),

    #[error("Storage error: {0}")]
    Storage(String),
}
