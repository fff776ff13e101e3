use rusqlite::ErrorCode;

/// Distinguishable failure kinds the store can raise. See §7 of the engine
/// spec for how the engine crate maps these into its own error kind set.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database is locked/busy. Retryable by a caller that owns retry policy
    /// (the background worker); query paths should not retry themselves.
    #[error("database busy: {0}")]
    Busy(String),

    /// A constraint (unique/foreign key/check) was violated. Not retryable.
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// The database structure does not match what this build expects.
    /// Not retryable; the operator must rebuild.
    #[error("schema mismatch: {0}")]
    Schema(String),

    /// The requested row does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Filesystem or I/O failure opening/creating the database.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Row data failed to decode into the expected shape (e.g. malformed
    /// embedding BLOB length).
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(sqlite_err, ref msg) = err {
            let detail = msg.clone().unwrap_or_else(|| sqlite_err.to_string());
            return match sqlite_err.code {
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => StoreError::Busy(detail),
                ErrorCode::ConstraintViolation => StoreError::Constraint(detail),
                ErrorCode::SchemaChanged | ErrorCode::NotADatabase => StoreError::Schema(detail),
                _ => StoreError::Serialization(format!("{sqlite_err:?}: {detail}")),
            };
        }
        if matches!(err, rusqlite::Error::QueryReturnedNoRows) {
            return StoreError::NotFound(err.to_string());
        }
        StoreError::Serialization(err.to_string())
    }
}
