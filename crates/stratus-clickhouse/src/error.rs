use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ClickHouseError {
    #[error("invalid endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("http: {0}")]
    Http(#[from] hyper::Error),

    #[error("building request: {0}")]
    Request(#[from] http::Error),

    #[error("query rejected ({status}): {body}")]
    Query { status: u16, body: String },

    #[error("malformed response row: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("no response within {0:?}")]
    Timeout(Duration),
}

pub type ClickHouseResult<T> = Result<T, ClickHouseError>;
