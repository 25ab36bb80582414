//! Errors raised by the record store.
//!
//! The accounting engine itself is infallible; only reading and writing
//! records can fail.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("state encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid stored timestamp: {0}")]
    Timestamp(i64),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
}

pub type Result<T, E = StorageError> = std::result::Result<T, E>;
