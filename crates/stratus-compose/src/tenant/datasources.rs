//! Grafana datasource provisioning.
//!
//! Delivered as a Secret because the metrics and logs datasources carry
//! the tenant header. The `deleteDatasources` list makes Grafana drop and
//! recreate them on every restart, so edits made through the UI never
//! stick.

use serde_json::{Value, json};
use stratus_core::{Tenant, tenant_namespace};
use stratus_state::ResourceKind;

use crate::collection::Resource;

pub const DATASOURCES_SECRET: &str = "grafana-datasources";
pub const DATASOURCES_FILE: &str = "datasources.yaml";

const CORTEX_QUERY_URL: &str = "http://cortex-api.cortex.svc.cluster.local:8080/api/prom";
const LOKI_QUERY_URL: &str = "http://loki-api.loki.svc.cluster.local:8080";

pub fn datasources_secret(tenant: &Tenant) -> Resource {
    Resource::new(
        ResourceKind::Secret,
        json!({
            "metadata": {
                "name": DATASOURCES_SECRET,
                "namespace": tenant_namespace(tenant),
                "labels": {"app": "grafana", "tenant": tenant.name},
            },
            "type": "Opaque",
            // JSON is valid YAML, and Value's Display never fails.
            "stringData": {DATASOURCES_FILE: datasources(tenant).to_string()},
        }),
    )
}

fn datasources(tenant: &Tenant) -> Value {
    let namespace = tenant_namespace(tenant);
    let datasource = |uid: &str, kind: &str, url: &str, default: bool| {
        json!({
            "name": uid,
            "uid": uid,
            "type": kind,
            "access": "proxy",
            "url": url,
            "isDefault": default,
            "editable": false,
            "jsonData": {"httpHeaderName1": "X-Scope-OrgID"},
            "secureJsonData": {"httpHeaderValue1": tenant.name},
        })
    };

    json!({
        "apiVersion": 1,
        "deleteDatasources": [
            {"name": "metrics", "orgId": 1},
            {"name": "logs", "orgId": 1},
            {"name": "alertmanager", "orgId": 1},
        ],
        "datasources": [
            datasource("metrics", "prometheus", CORTEX_QUERY_URL, true),
            datasource("logs", "loki", LOKI_QUERY_URL, false),
            {
                "name": "alertmanager",
                "uid": "alertmanager",
                "type": "alertmanager",
                "access": "proxy",
                "url": format!("http://alertmanager.{namespace}.svc.cluster.local/alertmanager"),
                "isDefault": false,
                "editable": false,
                "jsonData": {"implementation": "cortex"},
            },
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(tenant: &Tenant) -> Value {
        let secret = datasources_secret(tenant);
        let raw = secret.manifest()["stringData"][DATASOURCES_FILE].as_str().unwrap().to_string();
        serde_json::from_str(&raw).unwrap()
    }

    #[test]
    fn provisions_three_datasources_scoped_to_tenant() {
        let doc = parsed(&Tenant::user("dev").unwrap());
        let names: Vec<&str> = doc["datasources"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["metrics", "logs", "alertmanager"]);
        assert_eq!(doc["datasources"][0]["secureJsonData"]["httpHeaderValue1"], "dev");
        assert_eq!(
            doc["datasources"][2]["url"],
            "http://alertmanager.dev-tenant.svc.cluster.local/alertmanager"
        );
    }

    #[test]
    fn delete_list_does_not_depend_on_tenant() {
        let a = parsed(&Tenant::user("a").unwrap());
        let b = parsed(&Tenant::system());
        assert_eq!(a["deleteDatasources"], b["deleteDatasources"]);
    }
}
