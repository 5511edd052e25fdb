use std::path::PathBuf;

use stratus_core::CoreError;

pub type SettingsResult<T> = Result<T, SettingsError>;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("reading {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

pub type FeedResult<T> = Result<T, FeedError>;

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("reading tenant feed {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing tenant feed: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("tenant feed: {0}")]
    Invalid(#[from] CoreError),

    #[error("tenant feed lists {0} system tenants, expected at most one")]
    MultipleSystemTenants(usize),
}
