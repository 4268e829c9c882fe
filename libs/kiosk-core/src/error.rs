use thiserror::Error;

/// Failure taxonomy for the storefront core.
///
/// `MalformedToken` and `UnknownLevel` mean the client sent a button payload
/// we no longer understand; the user restarts navigation. Stock-related
/// variants are part of the normal purchase flow and are rendered back as
/// screens rather than surfaced as failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("malformed navigation token: {0}")]
    MalformedToken(String),

    #[error("no handler for navigation level {0}")]
    UnknownLevel(i32),

    #[error("precondition failed: {0}")]
    Precondition(&'static str),

    #[error("no matching item in stock")]
    NotFound,

    #[error("insufficient stock: {available} available")]
    InsufficientStock { available: i64 },

    #[error("allocation lost a race with a concurrent purchase")]
    ConcurrentAllocation,

    #[error("transient storage failure: {0}")]
    TransientStorage(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
