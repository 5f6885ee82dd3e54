//! Mapping of sqlx errors onto the store error taxonomy.

use domain::store::StoreError;

/// PostgreSQL error codes the admission store distinguishes.
mod codes {
    pub const UNIQUE_VIOLATION: &str = "23505";
    pub const FOREIGN_KEY_VIOLATION: &str = "23503";
    pub const SERIALIZATION_FAILURE: &str = "40001";
    pub const DEADLOCK_DETECTED: &str = "40P01";
    pub const LOCK_NOT_AVAILABLE: &str = "55P03";
}

fn classify(code: Option<&str>, message: String) -> StoreError {
    match code {
        Some(codes::UNIQUE_VIOLATION) => StoreError::UniqueViolation(message),
        Some(codes::FOREIGN_KEY_VIOLATION) => StoreError::NotFound(message),
        Some(codes::SERIALIZATION_FAILURE)
        | Some(codes::DEADLOCK_DETECTED)
        | Some(codes::LOCK_NOT_AVAILABLE) => StoreError::Contention(message),
        _ => StoreError::Backend(message),
    }
}

/// Converts a sqlx error into a [`StoreError`].
pub fn store_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::RowNotFound => StoreError::NotFound("row".to_string()),
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().map(|c| c.into_owned());
            classify(code.as_deref(), db_err.message().to_string())
        }
        _ => {
            tracing::error!(error = %err, "Database error");
            StoreError::Backend(err.to_string())
        }
    }
}
