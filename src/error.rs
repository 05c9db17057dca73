use thiserror::Error;

/// The only assistant failure that crosses the capability boundary. Transport
/// and vendor errors are converted to displayable text or placeholder records
/// at each call site.
#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("assistant is not initialized; call initialize first")]
    Uninitialized,
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database is not initialized; call initialize first")]
    Uninitialized,
    #[error("backend request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend returned {status}: {body}")]
    Backend {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("failed to decode backend payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("insert returned no row")]
    EmptyInsert,
    #[error("allocation exceeds the unallocated amount of its parent")]
    OverAllocated,
    #[error("no row matched {key}")]
    NotFound { key: String },
}
