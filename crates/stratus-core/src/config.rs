//! Cluster-wide configuration read by the composer.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Cloud the cluster runs on. Drives storage classes and provisioners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudTarget {
    Gcp,
    Aws,
}

impl CloudTarget {
    /// Storage class used for every persistent volume claim we emit.
    pub fn storage_class(self) -> &'static str {
        match self {
            CloudTarget::Gcp => "pd-ssd",
            CloudTarget::Aws => "gp2",
        }
    }
}

/// Settings shared by the whole cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Canonical cluster name, first label of every public hostname.
    pub name: String,
    /// DNS zone the cluster is published under (trailing dot allowed).
    pub dns_name: String,
    pub target: CloudTarget,
    /// Postgres endpoint Grafana instances use for their own database.
    #[serde(rename = "postgresql_endpoint")]
    pub postgres_endpoint: String,
    pub metric_retention_days: u32,
    #[serde(default = "default_log_retention_days")]
    pub log_retention_days: u32,
}

fn default_log_retention_days() -> u32 {
    7
}

impl GlobalConfig {
    /// Parse a `[config]`-shaped TOML document.
    pub fn from_toml_str(s: &str) -> CoreResult<Self> {
        let config: GlobalConfig = toml::from_str(s).map_err(|e| CoreError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configuration the composer cannot build manifests from.
    pub fn validate(&self) -> CoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::InvalidConfig {
                field: "name",
                reason: "must not be empty".to_string(),
            });
        }
        if self.dns_name.trim_end_matches('.').is_empty() {
            return Err(CoreError::InvalidConfig {
                field: "dns_name",
                reason: "must not be empty".to_string(),
            });
        }
        if self.metric_retention_days == 0 {
            return Err(CoreError::InvalidConfig {
                field: "metric_retention_days",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(self.postgres_endpoint.starts_with("postgres://")
            || self.postgres_endpoint.starts_with("postgresql://"))
        {
            return Err(CoreError::InvalidConfig {
                field: "postgresql_endpoint",
                reason: format!("expected a postgres:// URL, got {:?}", self.postgres_endpoint),
            });
        }
        Ok(())
    }

    /// Root domain of the cluster, e.g. `prod.example.com`.
    pub fn domain(&self) -> String {
        format!("{}.{}", self.name, self.dns_name.trim_end_matches('.'))
    }

    /// Public domain of one tenant, e.g. `dev.prod.example.com`.
    pub fn tenant_domain(&self, tenant_name: &str) -> String {
        format!("{tenant_name}.{}", self.domain())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
name = "prod"
dns_name = "example.com."
target = "gcp"
postgresql_endpoint = "postgres://grafana@db:5432"
metric_retention_days = 30
"#;

    #[test]
    fn parses_minimal_config() {
        let config = GlobalConfig::from_toml_str(MINIMAL).unwrap();
        assert_eq!(config.target, CloudTarget::Gcp);
        assert_eq!(config.log_retention_days, 7);
        assert_eq!(config.domain(), "prod.example.com");
        assert_eq!(config.tenant_domain("dev"), "dev.prod.example.com");
    }

    #[test]
    fn rejects_zero_retention() {
        let s = MINIMAL.replace("metric_retention_days = 30", "metric_retention_days = 0");
        assert!(matches!(
            GlobalConfig::from_toml_str(&s),
            Err(CoreError::InvalidConfig { field: "metric_retention_days", .. })
        ));
    }

    #[test]
    fn rejects_non_postgres_endpoint() {
        let s = MINIMAL.replace("postgres://grafana@db:5432", "mysql://db");
        assert!(GlobalConfig::from_toml_str(&s).is_err());
    }

    #[test]
    fn rejects_unknown_target() {
        let s = MINIMAL.replace(r#"target = "gcp""#, r#"target = "azure""#);
        assert!(matches!(GlobalConfig::from_toml_str(&s), Err(CoreError::Parse(_))));
    }

    #[test]
    fn storage_class_per_target() {
        assert_eq!(CloudTarget::Gcp.storage_class(), "pd-ssd");
        assert_eq!(CloudTarget::Aws.storage_class(), "gp2");
    }
}
