//! ClickHouse client: the `query(sql) -> rows` seam plus an HTTP
//! implementation speaking ClickHouse's native HTTP interface.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HOST};
use http::{Method, Request, Uri};
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use serde_json::Value;
use tracing::debug;

use crate::error::{ClickHouseError, ClickHouseResult};

const DEFAULT_PORT: u16 = 8123;
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Anything that can run a SQL statement and return its rows.
///
/// Statements that produce no result set return an empty vector.
pub trait ClickHouseClient: Send + Sync {
    fn query(&self, sql: &str) -> impl Future<Output = ClickHouseResult<Vec<Value>>> + Send;
}

impl<C: ClickHouseClient> ClickHouseClient for Arc<C> {
    fn query(&self, sql: &str) -> impl Future<Output = ClickHouseResult<Vec<Value>>> + Send {
        self.as_ref().query(sql)
    }
}

/// Client for the HTTP interface (port 8123 by default).
///
/// Opens one HTTP/1.1 connection per query; the reconciler issues a handful
/// of statements every few seconds, so pooling buys nothing.
#[derive(Debug, Clone)]
pub struct HttpClient {
    address: String,
    user: String,
    password: String,
    timeout: Duration,
}

impl HttpClient {
    /// `endpoint` is an `http://host[:port]` URL.
    pub fn new(endpoint: &str, user: &str, password: &str) -> ClickHouseResult<Self> {
        let invalid = |reason: &str| ClickHouseError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: reason.to_string(),
        };

        let uri: Uri = endpoint.parse().map_err(|_| invalid("not a URL"))?;
        if uri.scheme_str() != Some("http") {
            return Err(invalid("only http:// endpoints are supported"));
        }
        let host = uri.host().ok_or_else(|| invalid("missing host"))?;
        let port = uri.port_u16().unwrap_or(DEFAULT_PORT);

        Ok(Self {
            address: format!("{host}:{port}"),
            user: user.to_string(),
            password: password.to_string(),
            timeout: DEFAULT_QUERY_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    async fn post(&self, body: String) -> ClickHouseResult<String> {
        let stream = tokio::net::TcpStream::connect(&self.address)
            .await
            .map_err(|source| ClickHouseError::Connect {
                address: self.address.clone(),
                source,
            })?;

        let io = TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;

        // Drive the connection in the background.
        let address = self.address.clone();
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(%address, error = %e, "clickhouse connection closed with error");
            }
        });

        let req = Request::builder()
            .method(Method::POST)
            .uri("/")
            .header(HOST, &self.address)
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .header("X-ClickHouse-User", &self.user)
            .header("X-ClickHouse-Key", &self.password)
            .body(Full::new(Bytes::from(body)))?;

        let resp = sender.send_request(req).await?;
        let status = resp.status();
        let bytes = resp.into_body().collect().await?.to_bytes();
        let text = String::from_utf8_lossy(&bytes).into_owned();

        if !status.is_success() {
            return Err(ClickHouseError::Query {
                status: status.as_u16(),
                body: text.trim().to_string(),
            });
        }
        Ok(text)
    }
}

impl ClickHouseClient for HttpClient {
    async fn query(&self, sql: &str) -> ClickHouseResult<Vec<Value>> {
        let rows = returns_rows(sql);
        let body = if rows {
            format!("{sql} FORMAT JSONEachRow")
        } else {
            sql.to_string()
        };

        let text = tokio::time::timeout(self.timeout, self.post(body))
            .await
            .map_err(|_| ClickHouseError::Timeout(self.timeout))??;

        if rows { parse_rows(&text) } else { Ok(Vec::new()) }
    }
}

fn returns_rows(sql: &str) -> bool {
    let head = sql.trim_start();
    ["SHOW", "SELECT"]
        .iter()
        .any(|kw| head.get(..kw.len()).is_some_and(|h| h.eq_ignore_ascii_case(kw)))
}

/// Parse a `JSONEachRow` response: one JSON object per line.
pub fn parse_rows(text: &str) -> ClickHouseResult<Vec<Value>> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| serde_json::from_str(l).map_err(ClickHouseError::from))
        .collect()
}

/// Names from a `SHOW DATABASES` / `SHOW USERS` result.
pub fn row_names(rows: &[Value]) -> Vec<String> {
    rows.iter()
        .filter_map(|row| {
            row.get("name")
                .and_then(Value::as_str)
                .or_else(|| row.as_object()?.values().find_map(Value::as_str))
        })
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn endpoint_defaults_to_http_port() {
        let c = HttpClient::new("http://clickhouse.clickhouse.svc", "default", "").unwrap();
        assert_eq!(c.address(), "clickhouse.clickhouse.svc:8123");

        let c = HttpClient::new("http://10.0.0.5:9000/", "default", "").unwrap();
        assert_eq!(c.address(), "10.0.0.5:9000");
    }

    #[test]
    fn rejects_non_http_endpoints() {
        assert!(matches!(
            HttpClient::new("tcp://clickhouse:9000", "u", "p"),
            Err(ClickHouseError::InvalidEndpoint { .. })
        ));
        assert!(HttpClient::new("not a url", "u", "p").is_err());
    }

    #[test]
    fn only_reads_ask_for_rows() {
        assert!(returns_rows("SHOW DATABASES"));
        assert!(returns_rows("  select 1"));
        assert!(!returns_rows("CREATE DATABASE IF NOT EXISTS x"));
        assert!(!returns_rows("SH"));
        // The keyword-length cut lands inside a multi-byte character.
        assert!(!returns_rows("SHOÜ"));
        assert!(!returns_rows("SELECÇ 1"));
    }

    #[test]
    fn parses_json_each_row() {
        let rows = parse_rows("{\"name\":\"default\"}\n{\"name\":\"tenant_dev\"}\n\n").unwrap();
        assert_eq!(row_names(&rows), vec!["default", "tenant_dev"]);
        assert!(parse_rows("{oops").is_err());
    }

    #[test]
    fn row_names_falls_back_to_first_string_column() {
        let rows = vec![json!({"database": "x"}), json!({"count": 1})];
        assert_eq!(row_names(&rows), vec!["x"]);
    }
}
