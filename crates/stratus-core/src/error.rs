//! Validation errors for core domain types.

use thiserror::Error;

/// Result type alias for core validation.
pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid tenant name {name:?}: {reason}")]
    InvalidTenantName { name: String, reason: &'static str },

    #[error("invalid config field `{field}`: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("failed to parse config: {0}")]
    Parse(String),
}
