use stratus_core::CoreError;

/// Composer errors. "Not available yet" is never an error except for the
/// global config, without which no pass can run at all.
#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error("cluster config not loaded yet")]
    ConfigNotLoaded,

    #[error("invalid input: {0}")]
    Invalid(#[from] CoreError),
}

pub type ComposeResult<T> = Result<T, ComposeError>;
