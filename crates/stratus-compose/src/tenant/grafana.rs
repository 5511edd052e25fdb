//! Tenant Grafana.
//!
//! Grafana keeps its own state in Postgres, one database per tenant. An
//! init container creates that database on first start; the main
//! container then points `GF_DATABASE_URL` at it. Dashboards are only
//! bundled for the system tenant.

use serde_json::{Value, json};
use stratus_core::{GlobalConfig, Tenant, tenant_namespace};
use stratus_state::{ResourceKind, State};

use crate::cluster::with_pull_secrets;
use crate::collection::{Resource, ResourceCollection};
use crate::images;
use crate::system::dashboards;
use crate::tenant::datasources::{DATASOURCES_SECRET, datasources_secret};

pub const GRAFANA_PORT: u16 = 3000;
const STORAGE_CLAIM: &str = "grafana-storage-claim";
const STORAGE_SIZE: &str = "10Gi";
const DASHBOARD_PROVIDER: &str = "grafana-dashboards";
const DASHBOARD_ROOT: &str = "/grafana-dashboard-definitions/0";

/// Postgres database holding one tenant's Grafana state.
pub fn grafana_database(tenant: &Tenant) -> String {
    format!("grafana_{}", tenant.name.replace('-', "_"))
}

pub fn grafana_resources(state: &State, config: &GlobalConfig, tenant: &Tenant) -> ResourceCollection {
    let namespace = tenant_namespace(tenant);
    let mut collection = ResourceCollection::new();
    let mut volumes = vec![
        json!({"name": "grafana-storage", "persistentVolumeClaim": {"claimName": STORAGE_CLAIM}}),
        json!({"name": "grafana-datasources", "secret": {"secretName": DATASOURCES_SECRET}}),
        json!({"name": DASHBOARD_PROVIDER, "configMap": {"name": DASHBOARD_PROVIDER}}),
    ];
    let mut mounts = vec![
        json!({"mountPath": "/var/lib/grafana", "name": "grafana-storage"}),
        json!({"mountPath": "/etc/grafana/provisioning/datasources", "name": "grafana-datasources"}),
        json!({"mountPath": "/etc/grafana/provisioning/dashboards", "name": DASHBOARD_PROVIDER}),
    ];

    if tenant.is_system() {
        for dashboard in dashboards::bundled() {
            let name = format!("grafana-dashboard-{}", dashboard.name);
            collection.add(Resource::new(
                ResourceKind::ConfigMap,
                json!({
                    "metadata": {"name": name, "namespace": namespace},
                    "data": {format!("{}.json", dashboard.name): dashboard.content.to_string()},
                }),
            ));
            volumes.push(json!({"name": name, "configMap": {"name": name}}));
            mounts.push(json!({
                "mountPath": format!("{DASHBOARD_ROOT}/{}", dashboard.name),
                "name": name,
            }));
        }
    }

    collection.add(Resource::new(
        ResourceKind::ConfigMap,
        json!({
            "metadata": {"name": DASHBOARD_PROVIDER, "namespace": namespace},
            "data": {"dashboards.yaml": dashboard_provider().to_string()},
        }),
    ));
    collection.add(datasources_secret(tenant));

    collection.add(Resource::new(
        ResourceKind::PersistentVolumeClaim,
        json!({
            "metadata": {"name": STORAGE_CLAIM, "namespace": namespace, "labels": {"app": "grafana"}},
            "spec": {
                "storageClassName": config.target.storage_class(),
                "accessModes": ["ReadWriteOnce"],
                "resources": {"requests": {"storage": STORAGE_SIZE}},
            },
        }),
    ));

    collection.add(Resource::new(
        ResourceKind::ServiceAccount,
        json!({"metadata": {"name": "grafana", "namespace": namespace}}),
    ));

    collection.add(Resource::new(
        ResourceKind::Deployment,
        with_pull_secrets(state, json!({
            "metadata": {"name": "grafana", "namespace": namespace, "labels": {"app": "grafana"}},
            "spec": {
                "replicas": 1,
                "strategy": {"type": "Recreate"},
                "selector": {"matchLabels": {"app": "grafana"}},
                "template": {
                    "metadata": {"labels": {"app": "grafana", "tenant": tenant.name}},
                    "spec": {
                        "serviceAccountName": "grafana",
                        "initContainers": [db_bootstrap(config, tenant)],
                        "containers": [{
                            "name": "grafana",
                            "image": images::GRAFANA,
                            "ports": [{"containerPort": GRAFANA_PORT, "name": "http"}],
                            "readinessProbe": {"httpGet": {"path": "/api/health", "port": "http"}},
                            "env": grafana_env(config, tenant),
                            "volumeMounts": mounts,
                        }],
                        "nodeSelector": {"kubernetes.io/os": "linux"},
                        "securityContext": {"runAsNonRoot": true, "runAsUser": 65534, "fsGroup": 2000},
                        "volumes": volumes,
                    },
                },
            },
        })),
    ));

    collection.add(Resource::new(
        ResourceKind::Service,
        json!({
            "metadata": {
                "name": "grafana",
                "namespace": namespace,
                "labels": {"app": "grafana", "tenant": tenant.name},
            },
            "spec": {
                "ports": [{"name": "http", "port": GRAFANA_PORT, "targetPort": "http"}],
                "selector": {"app": "grafana"},
            },
        }),
    ));
    collection.add(Resource::new(
        ResourceKind::ServiceMonitor,
        json!({
            "metadata": {"name": "grafana", "namespace": namespace, "labels": {"tenant": tenant.name}},
            "spec": {
                "endpoints": [{"port": "http", "interval": "30s"}],
                "selector": {"matchLabels": {"app": "grafana", "tenant": tenant.name}},
            },
        }),
    ));

    collection
}

fn database_url(config: &GlobalConfig, tenant: &Tenant) -> String {
    format!(
        "{}/{}",
        config.postgres_endpoint.trim_end_matches('/'),
        grafana_database(tenant)
    )
}

/// Creates the tenant database when missing. Safe to rerun.
fn db_bootstrap(config: &GlobalConfig, tenant: &Tenant) -> Value {
    const SCRIPT: &str = r#"psql "$POSTGRES_ENDPOINT" -tAc "SELECT 1 FROM pg_database WHERE datname = '$GRAFANA_DB'" | grep -q 1 || psql "$POSTGRES_ENDPOINT" -c "CREATE DATABASE $GRAFANA_DB""#;
    json!({
        "name": "db-bootstrap",
        "image": images::POSTGRES_CLIENT,
        "command": ["sh", "-c", SCRIPT],
        "env": [
            {"name": "POSTGRES_ENDPOINT", "value": config.postgres_endpoint},
            {"name": "GRAFANA_DB", "value": grafana_database(tenant)},
        ],
    })
}

fn grafana_env(config: &GlobalConfig, tenant: &Tenant) -> Value {
    let vars = [
        ("GF_LOG_LEVEL", "info".to_string()),
        ("GF_ALERTING", "false".to_string()),
        ("GF_DATABASE_URL", database_url(config, tenant)),
        ("GF_SERVER_DOMAIN", config.tenant_domain(&tenant.name)),
        ("GF_SERVER_ROOT_URL", "%(protocol)s://%(domain)s/grafana/".to_string()),
        ("GF_SERVER_SERVE_FROM_SUB_PATH", "true".to_string()),
        ("GF_PATHS_PROVISIONING", "/etc/grafana/provisioning".to_string()),
        ("GF_SECURITY_COOKIE_SECURE", "true".to_string()),
        ("GF_USERS_ALLOW_ORG_CREATE", "false".to_string()),
        ("GF_USERS_AUTO_ASSIGN_ORG", "true".to_string()),
        ("GF_USERS_AUTO_ASSIGN_ORG_ROLE", "Editor".to_string()),
        ("GF_AUTH_DISABLE_LOGIN_FORM", "true".to_string()),
        ("GF_AUTH_DISABLE_SIGNOUT_MENU", "true".to_string()),
        ("GF_AUTH_PROXY_ENABLED", "true".to_string()),
        ("GF_AUTH_PROXY_HEADER_NAME", "x-auth-request-email".to_string()),
        ("GF_AUTH_PROXY_HEADER_PROPERTY", "email".to_string()),
        ("GF_AUTH_PROXY_AUTO_SIGN_UP", "true".to_string()),
    ];
    Value::Array(
        vars.into_iter()
            .map(|(name, value)| json!({"name": name, "value": value}))
            .collect(),
    )
}

fn dashboard_provider() -> Value {
    json!({
        "apiVersion": 1,
        "providers": [{
            "name": "0",
            "orgId": 1,
            "folder": "",
            "type": "file",
            "options": {"path": DASHBOARD_ROOT},
        }],
    })
}
