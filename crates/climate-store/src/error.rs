//! Error types for the store crate.

use thiserror::Error;

/// Errors that can occur while reading or writing climate series.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to prepare database location: {0}")]
    Io(#[from] std::io::Error),

    /// A row with the same natural key was created concurrently.
    #[error("{entity} with code '{code}' already exists")]
    Conflict { entity: &'static str, code: String },

    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

impl StoreError {
    /// Map a unique-constraint violation to [`StoreError::Conflict`].
    pub(crate) fn from_insert(err: sqlx::Error, entity: &'static str, code: &str) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::Conflict {
                entity,
                code: code.to_string(),
            },
            _ => Self::Database(err),
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
