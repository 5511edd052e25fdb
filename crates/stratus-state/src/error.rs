//! Error types for the state crate.

use thiserror::Error;

/// Result type alias for state operations.
pub type StateResult<T> = Result<T, StateError>;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("object has no metadata.name")]
    MissingName,

    #[error("object is not a JSON map")]
    NotAnObject,

    #[error("unknown resource kind: {0}")]
    UnknownKind(String),
}
