//! Typed error hierarchy for the Taskboard service.
//!
//! `BoardError` is returned by every board, column, task and subtask
//! operation. The HTTP layer maps it onto status codes in `board::api`.

use thiserror::Error;

/// Errors from the board services and the storage gateway beneath them.
#[derive(Debug, Error)]
pub enum BoardError {
    /// Client input failed a field rule. Raised before any transaction opens.
    #[error("Invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    /// The entity does not exist or belongs to another principal.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// A scope was left with gaps or duplicate positions after a shift.
    #[error("Position invariant violated in {scope}: positions {positions:?}")]
    InvariantViolation { scope: String, positions: Vec<i64> },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database lock poisoned")]
    LockPoisoned,

    /// The caller went away (timed out or disconnected) before the write
    /// committed. Nothing was persisted.
    #[error("Request abandoned before commit")]
    Abandoned,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BoardError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// True for errors caused by the request rather than by the service.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::NotFound { .. })
    }
}

pub type BoardResult<T> = Result<T, BoardError>;
