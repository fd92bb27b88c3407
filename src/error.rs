use thiserror::Error;

/// Storage-layer failure, distinct from "not found".
///
/// Store implementations return `Ok(None)` / `Ok(false)` for missing codes
/// and reserve this type for infrastructure problems (connection loss,
/// timeouts, corrupted state).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Unavailable(err.into())
    }
}

/// Everything the link service can report to its caller.
///
/// Each variant stays distinguishable end to end; the HTTP layer maps them
/// onto status codes without collapsing any of them into a generic failure.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Bad request shape (e.g. empty URL).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A caller-supplied code is already allocated. Never retried with a
    /// generated code — custom codes are not silently replaced.
    #[error("short code '{0}' is already taken")]
    CodeTaken(String),

    /// Bounded random generation kept colliding; practically this means the
    /// code space is too hot, not literally full.
    #[error("could not allocate a unique short code")]
    CodeSpaceExhausted,

    #[error("short link not found")]
    NotFound,

    #[error("short link has expired")]
    Expired,

    #[error("storage unavailable")]
    StorageUnavailable(#[from] StoreError),
}
