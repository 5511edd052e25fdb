//! Controller settings: an optional TOML file, overridden by flags and
//! environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde::Deserialize;
use stratus_clickhouse::HttpClient;

use crate::error::{SettingsError, SettingsResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "stratusd", about = "Stratus tenant observability controller")]
pub struct Cli {
    /// Settings file (TOML). Flags and environment take precedence.
    #[arg(long, env = "STRATUS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Cluster name, used in log fields.
    #[arg(long, env = "STRATUS_CLUSTER_NAME")]
    pub cluster_name: Option<String>,

    /// TOML file listing tenants and the cluster config.
    #[arg(long, env = "STRATUS_TENANT_FEED")]
    pub tenant_feed: Option<PathBuf>,

    /// ClickHouse HTTP endpoint. Tenant databases are not managed without it.
    #[arg(long, env = "CLICKHOUSE_URL")]
    pub clickhouse_url: Option<String>,

    #[arg(long, env = "CLICKHOUSE_USER")]
    pub clickhouse_user: Option<String>,

    #[arg(long, env = "CLICKHOUSE_PASSWORD", hide_env_values = true)]
    pub clickhouse_password: Option<String>,

    /// Use the local kubeconfig instead of the in-cluster service account.
    #[arg(long)]
    pub external: bool,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClickHouseSettings {
    pub url: Option<String>,
    pub user: String,
    pub password: String,
}

impl Default for ClickHouseSettings {
    fn default() -> Self {
        Self {
            url: None,
            user: "default".to_string(),
            password: String::new(),
        }
    }
}

/// Loop periods, in seconds except where noted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Intervals {
    pub reconcile_secs: u64,
    pub hydration_poll_ms: u64,
    pub clickhouse_tick_secs: u64,
    pub feed_poll_secs: u64,
}

impl Default for Intervals {
    fn default() -> Self {
        Self {
            reconcile_secs: 5,
            hydration_poll_ms: 1000,
            clickhouse_tick_secs: 5,
            feed_poll_secs: 10,
        }
    }
}

impl Intervals {
    pub fn reconcile(&self) -> Duration {
        Duration::from_secs(self.reconcile_secs)
    }

    pub fn hydration_poll(&self) -> Duration {
        Duration::from_millis(self.hydration_poll_ms)
    }

    pub fn clickhouse_tick(&self) -> Duration {
        Duration::from_secs(self.clickhouse_tick_secs)
    }

    pub fn feed_poll(&self) -> Duration {
        Duration::from_secs(self.feed_poll_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub cluster_name: String,
    pub tenant_feed: PathBuf,
    pub external: bool,
    pub clickhouse: ClickHouseSettings,
    pub intervals: Intervals,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cluster_name: "local".to_string(),
            tenant_feed: PathBuf::from("/etc/stratus/tenants.toml"),
            external: false,
            clickhouse: ClickHouseSettings::default(),
            intervals: Intervals::default(),
        }
    }
}

impl Settings {
    pub fn from_file(path: &Path) -> SettingsResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// File (or defaults), then flags/env on top, then validation.
    pub fn resolve(cli: &Cli) -> SettingsResult<Self> {
        let mut settings = match &cli.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Some(name) = &cli.cluster_name {
            settings.cluster_name = name.clone();
        }
        if let Some(feed) = &cli.tenant_feed {
            settings.tenant_feed = feed.clone();
        }
        if let Some(url) = &cli.clickhouse_url {
            settings.clickhouse.url = Some(url.clone());
        }
        if let Some(user) = &cli.clickhouse_user {
            settings.clickhouse.user = user.clone();
        }
        if let Some(password) = &cli.clickhouse_password {
            settings.clickhouse.password = password.clone();
        }
        settings.external |= cli.external;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> SettingsResult<()> {
        let intervals = [
            ("intervals.reconcile_secs", self.intervals.reconcile_secs),
            ("intervals.hydration_poll_ms", self.intervals.hydration_poll_ms),
            ("intervals.clickhouse_tick_secs", self.intervals.clickhouse_tick_secs),
            ("intervals.feed_poll_secs", self.intervals.feed_poll_secs),
        ];
        for (field, value) in intervals {
            if value == 0 {
                return Err(SettingsError::Invalid {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        if self.tenant_feed.as_os_str().is_empty() {
            return Err(SettingsError::Invalid {
                field: "tenant_feed",
                reason: "must not be empty".to_string(),
            });
        }
        // Surfaces a malformed endpoint at startup rather than on first use.
        self.clickhouse_client()?;
        Ok(())
    }

    /// ClickHouse client, or `None` when no endpoint is configured.
    pub fn clickhouse_client(&self) -> SettingsResult<Option<HttpClient>> {
        let Some(url) = self.clickhouse.url.as_deref().filter(|u| !u.is_empty()) else {
            return Ok(None);
        };
        HttpClient::new(url, &self.clickhouse.user, &self.clickhouse.password)
            .map(Some)
            .map_err(|e| SettingsError::Invalid {
                field: "clickhouse.url",
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("stratusd").chain(args.iter().copied()))
    }

    #[test]
    fn defaults_without_file() {
        let settings = Settings::resolve(&cli(&[])).unwrap();
        assert_eq!(settings.intervals.reconcile(), Duration::from_secs(5));
        assert_eq!(settings.intervals.hydration_poll(), Duration::from_secs(1));
        assert!(!settings.external);
    }

    #[test]
    fn file_values_are_overridden_by_flags() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
cluster_name = "prod-eu"
tenant_feed = "/srv/tenants.toml"

[clickhouse]
url = "http://clickhouse:8123"
user = "controller"

[intervals]
clickhouse_tick_secs = 30
"#
        )
        .unwrap();

        let path = file.path().to_str().unwrap();
        let settings =
            Settings::resolve(&cli(&["--config", path, "--clickhouse-user", "admin", "--external"]))
                .unwrap();

        assert_eq!(settings.cluster_name, "prod-eu");
        assert_eq!(settings.tenant_feed, PathBuf::from("/srv/tenants.toml"));
        assert_eq!(settings.clickhouse.user, "admin");
        assert_eq!(settings.intervals.clickhouse_tick(), Duration::from_secs(30));
        assert_eq!(settings.intervals.reconcile_secs, 5);
        assert!(settings.external);
        assert!(settings.clickhouse_client().unwrap().is_some());
    }

    #[test]
    fn unknown_keys_and_zero_intervals_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "clusterName = \"x\"").unwrap();
        let err = Settings::from_file(file.path()).unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));

        let mut settings = Settings::default();
        settings.intervals.reconcile_secs = 0;
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::Invalid { field: "intervals.reconcile_secs", .. })
        ));
    }

    #[test]
    fn malformed_clickhouse_endpoint_fails_validation() {
        let mut settings = Settings::default();
        settings.clickhouse.url = Some("clickhouse:9000".to_string());
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::Invalid { field: "clickhouse.url", .. })
        ));

        settings.clickhouse.url = Some(String::new());
        assert!(settings.clickhouse_client().unwrap().is_none());
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = Settings::from_file(Path::new("/nonexistent/stratus.toml")).unwrap_err();
        assert!(matches!(err, SettingsError::Read { .. }));
    }
}
