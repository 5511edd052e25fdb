//! Tenant Prometheus: the operator CR, its RBAC, Service and self-scrape.

use serde_json::{Value, json};
use stratus_core::{GlobalConfig, Tenant, prometheus_name, tenant_namespace};
use stratus_state::{ResourceKind, State};

use crate::cluster::image_pull_secrets;
use crate::collection::{Resource, ResourceCollection};

pub const PROMETHEUS_PORT: u16 = 9090;
pub const PROMETHEUS_DISK_SIZE: &str = "10Gi";

/// Cortex distributor all tenant Prometheus instances remote-write to.
const CORTEX_PUSH_URL: &str = "http://cortex-api.cortex.svc.cluster.local:8080/api/v1/push";

/// Replica count as a step function of cluster size.
pub fn prometheus_replicas(node_count: usize) -> u32 {
    if node_count <= 6 { 2 } else { 3 }
}

pub fn prometheus_resources(state: &State, config: &GlobalConfig, tenant: &Tenant) -> ResourceCollection {
    let namespace = tenant_namespace(tenant);
    let name = prometheus_name(tenant);
    let mut collection = ResourceCollection::new();

    collection.add(Resource::new(
        ResourceKind::ServiceAccount,
        json!({"metadata": {"name": name, "namespace": namespace}}),
    ));
    collection.merge(scrape_rbac(tenant, &namespace));

    collection.add(Resource::new(
        ResourceKind::Service,
        json!({
            "metadata": {
                "name": "prometheus",
                "namespace": namespace,
                "labels": {"app": "prometheus", "tenant": tenant.name},
            },
            "spec": {
                "ports": [{"name": "web", "port": PROMETHEUS_PORT, "targetPort": "web"}],
                "selector": {"prometheus": name},
                "sessionAffinity": "ClientIP",
            },
        }),
    ));

    collection.add(Resource::new(
        ResourceKind::ServiceMonitor,
        json!({
            "metadata": {
                "name": "prometheus",
                "namespace": namespace,
                "labels": {"tenant": tenant.name},
            },
            "spec": {
                "endpoints": [{"port": "web", "interval": "30s"}],
                "selector": {"matchLabels": {"app": "prometheus", "tenant": tenant.name}},
            },
        }),
    ));

    collection.add(Resource::new(
        ResourceKind::Prometheus,
        json!({
            "metadata": {
                "name": name,
                "namespace": namespace,
                "labels": {"prometheus": name, "tenant": tenant.name},
            },
            "spec": prometheus_spec(state, config, tenant, &namespace, &name),
        }),
    ));

    collection
}

fn prometheus_spec(
    state: &State,
    config: &GlobalConfig,
    tenant: &Tenant,
    namespace: &str,
    name: &str,
) -> Value {
    let tenant_selector = json!({"matchLabels": {"tenant": tenant.name}});
    // The system Prometheus scrapes every namespace; user tenants only
    // their own.
    let namespace_selector = if tenant.is_system() {
        json!({})
    } else {
        tenant_selector.clone()
    };

    let mut remote_write = json!({
        "url": CORTEX_PUSH_URL,
        "headers": {"X-Scope-OrgID": tenant.name},
    });
    if tenant.is_system() {
        remote_write["bearerTokenFile"] =
            json!("/var/run/secrets/kubernetes.io/serviceaccount/token");
    }

    let mut spec = json!({
        "replicas": prometheus_replicas(state.node_count()),
        "retention": format!("{}d", config.metric_retention_days),
        "serviceAccountName": name,
        "externalLabels": {"cluster": config.name, "tenant": tenant.name},
        "serviceMonitorSelector": tenant_selector,
        "serviceMonitorNamespaceSelector": namespace_selector,
        "podMonitorSelector": tenant_selector,
        "podMonitorNamespaceSelector": namespace_selector,
        "ruleSelector": tenant_selector,
        "ruleNamespaceSelector": namespace_selector,
        "alerting": {
            "alertmanagers": [{
                "namespace": namespace,
                "name": "alertmanager",
                "port": "http",
                "pathPrefix": "/alertmanager/",
            }],
        },
        "remoteWrite": [remote_write],
        "securityContext": {"fsGroup": 2000, "runAsNonRoot": true, "runAsUser": 1000},
        "storage": {
            "volumeClaimTemplate": {
                "spec": {
                    "storageClassName": config.target.storage_class(),
                    "accessModes": ["ReadWriteOnce"],
                    "resources": {"requests": {"storage": PROMETHEUS_DISK_SIZE}},
                },
            },
        },
    });
    if let Some(secrets) = image_pull_secrets(state) {
        spec["imagePullSecrets"] = secrets;
    }
    spec
}

/// Role + RoleBinding letting the tenant's Prometheus discover and scrape
/// targets in `namespace`.
///
/// The system tenant gets one pair per cluster namespace; the pair in its
/// own namespace is the same resource either way.
pub fn scrape_rbac(tenant: &Tenant, namespace: &str) -> ResourceCollection {
    let name = prometheus_name(tenant);
    let mut collection = ResourceCollection::new();

    collection.add(Resource::new(
        ResourceKind::Role,
        json!({
            "metadata": {"name": name, "namespace": namespace},
            "rules": [{
                "apiGroups": [""],
                "resources": ["services", "endpoints", "pods"],
                "verbs": ["get", "list", "watch"],
            }],
        }),
    ));
    collection.add(Resource::new(
        ResourceKind::RoleBinding,
        json!({
            "metadata": {"name": name, "namespace": namespace},
            "roleRef": {
                "apiGroup": "rbac.authorization.k8s.io",
                "kind": "Role",
                "name": name,
            },
            "subjects": [{
                "kind": "ServiceAccount",
                "name": name,
                "namespace": tenant_namespace(tenant),
            }],
        }),
    ));
    collection
}
