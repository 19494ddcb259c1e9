use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Record not found")]
    NotFound,

    /// Optimistic version precondition failed; the caller should re-read
    /// and retry.
    #[error("Version conflict on concurrent update")]
    VersionConflict,

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Store temporarily unreachable; degraded-write handling applies.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Database error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;
