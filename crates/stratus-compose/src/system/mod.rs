//! Cluster-wide monitoring carried by the system tenant.
//!
//! ```text
//!   system-tenant namespace
//!   ├── kube-state-metrics   (object state → metrics)
//!   ├── node-exporter        (DaemonSet, host metrics)
//!   ├── prometheus-adapter   (metrics.k8s.io for HPA / kubectl top)
//!   └── PrometheusRule       (static alert set)
//!
//!   every cached namespace
//!   └── Role/RoleBinding     (system Prometheus may scrape here)
//! ```

pub mod dashboards;
mod kube_state_metrics;
mod node_exporter;
mod prometheus_adapter;
pub mod rules;

use serde_json::json;
use stratus_core::{Tenant, prometheus_name, tenant_namespace};
use stratus_state::{ResourceKind, State};

use crate::collection::{Resource, ResourceCollection};
use crate::tenant::prometheus::scrape_rbac;

/// Role the system Prometheus uses to read its own config maps.
const CONFIG_ROLE: &str = "system-prometheus-config";

pub fn system_resources(state: &State, tenant: &Tenant) -> ResourceCollection {
    let namespace = tenant_namespace(tenant);
    let mut collection = ResourceCollection::new();

    let mut namespaces = state.namespace_names();
    namespaces.sort_unstable();
    for ns in namespaces {
        collection.merge(scrape_rbac(tenant, ns));
    }
    collection.merge(cluster_rbac(tenant, &namespace));

    collection.merge(kube_state_metrics::resources(state, tenant, &namespace));
    collection.merge(node_exporter::resources(state, tenant, &namespace));
    collection.merge(prometheus_adapter::resources(state, &namespace));
    collection.add(rules::prometheus_rule(tenant, &namespace));
    collection
}

/// Node metrics and `/metrics` are cluster-scoped, so they need a
/// ClusterRole on top of the per-namespace grants.
fn cluster_rbac(tenant: &Tenant, namespace: &str) -> ResourceCollection {
    let name = prometheus_name(tenant);
    let mut collection = ResourceCollection::new();

    collection.add(Resource::new(
        ResourceKind::ClusterRole,
        json!({
            "metadata": {"name": name},
            "rules": [
                {"apiGroups": [""], "resources": ["nodes/metrics"], "verbs": ["get"]},
                {"nonResourceURLs": ["/metrics"], "verbs": ["get"]},
            ],
        }),
    ));
    collection.add(Resource::new(
        ResourceKind::ClusterRoleBinding,
        json!({
            "metadata": {"name": name},
            "roleRef": {"apiGroup": "rbac.authorization.k8s.io", "kind": "ClusterRole", "name": name},
            "subjects": [{"kind": "ServiceAccount", "name": name, "namespace": namespace}],
        }),
    ));

    collection.add(Resource::new(
        ResourceKind::Role,
        json!({
            "metadata": {"name": CONFIG_ROLE, "namespace": namespace},
            "rules": [{"apiGroups": [""], "resources": ["configmaps"], "verbs": ["get"]}],
        }),
    ));
    collection.add(Resource::new(
        ResourceKind::RoleBinding,
        json!({
            "metadata": {"name": CONFIG_ROLE, "namespace": namespace},
            "roleRef": {"apiGroup": "rbac.authorization.k8s.io", "kind": "Role", "name": CONFIG_ROLE},
            "subjects": [{"kind": "ServiceAccount", "name": name, "namespace": namespace}],
        }),
    ));
    collection
}

/// Shared sidecar exposing a loopback-only metrics port over TLS, gated by
/// the pod's service account token.
pub(crate) fn rbac_proxy(
    name: &str,
    port_name: &str,
    listen: &str,
    port: u16,
    upstream: &str,
) -> serde_json::Value {
    json!({
        "name": name,
        "image": crate::images::KUBE_RBAC_PROXY,
        "args": [
            "--logtostderr",
            format!("--secure-listen-address={listen}"),
            format!("--tls-cipher-suites={}", crate::images::RBAC_PROXY_CIPHERS),
            format!("--upstream={upstream}"),
        ],
        "ports": [{"containerPort": port, "name": port_name}],
        "resources": {
            "limits": {"cpu": "1", "memory": "40Mi"},
            "requests": {"cpu": "10m", "memory": "20Mi"},
        },
        "securityContext": {"runAsUser": 65534},
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratus_state::{Action, CacheEvent, KubeObject};

    fn with_namespaces(names: &[&str]) -> State {
        let objs = names
            .iter()
            .map(|n| KubeObject::from_value(json!({"metadata": {"name": n}})).unwrap())
            .collect();
        State::new().with(Action::Kube {
            kind: ResourceKind::Namespace,
            event: CacheEvent::List(objs),
        })
    }

    #[test]
    fn grants_scrape_access_in_every_cached_namespace() {
        let state = with_namespaces(&["kube-system", "default", "dev-tenant"]);
        let c = system_resources(&state, &Tenant::system());

        for ns in ["kube-system", "default", "dev-tenant"] {
            assert!(c.contains(ResourceKind::Role, Some(ns), "system-prometheus"), "{ns}");
            assert!(c.contains(ResourceKind::RoleBinding, Some(ns), "system-prometheus"), "{ns}");
        }
        assert!(c.contains(ResourceKind::ClusterRole, None, "system-prometheus"));
        assert!(c.contains(ResourceKind::RoleBinding, Some("system-tenant"), CONFIG_ROLE));
    }

    #[test]
    fn carries_exporters_adapter_and_rules() {
        let c = system_resources(&State::new(), &Tenant::system());
        assert!(c.contains(ResourceKind::Deployment, Some("system-tenant"), "kube-state-metrics"));
        assert!(c.contains(ResourceKind::DaemonSet, Some("system-tenant"), "node-exporter"));
        assert!(c.contains(ResourceKind::Deployment, Some("system-tenant"), "prometheus-adapter"));
        assert!(c.contains(ResourceKind::ApiService, None, "v1beta1.metrics.k8s.io"));
        assert!(c.contains(ResourceKind::PrometheusRule, Some("system-tenant"), rules::RULE_NAME));
    }
}
