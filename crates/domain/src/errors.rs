//! Domain error taxonomy for admission operations.

use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced by the admission services.
///
/// Capacity exhaustion is deliberately absent: a full event yields a
/// WAITLISTED registration, not an error.
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Event lock could not be obtained within the retry budget.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl AdmissionError {
    /// Returns true for the only internally retried class: ledger contention.
    pub fn is_contention(&self) -> bool {
        matches!(self, AdmissionError::Store(StoreError::Contention(_)))
    }
}

impl From<StoreError> for AdmissionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => AdmissionError::NotFound(msg),
            StoreError::UniqueViolation(msg) => AdmissionError::Conflict(msg),
            other => AdmissionError::Store(other),
        }
    }
}

impl From<validator::ValidationErrors> for AdmissionError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let messages: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| match &e.message {
                    Some(message) => message.to_string(),
                    None => format!("{}: invalid value", field),
                })
            })
            .collect();

        let message = match messages.len() {
            0 => "Invalid request".to_string(),
            1 => messages[0].clone(),
            n => format!("{} validation errors: {}", n, messages.join(", ")),
        };

        AdmissionError::Validation(message)
    }
}
