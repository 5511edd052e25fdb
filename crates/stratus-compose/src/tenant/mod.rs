//! Per-tenant scope.
//!
//! Every tenant gets its own namespace with a Prometheus, a Grafana, an
//! alias for the shared Alertmanager and a copy of the ingress
//! certificate. The `System` tenant additionally carries the cluster-wide
//! monitoring stack (see [`crate::system`]).

pub mod datasources;
pub mod grafana;
pub mod prometheus;

use serde_json::json;
use stratus_core::{GlobalConfig, Tenant, tenant_namespace};
use stratus_state::{ResourceKind, State};

use crate::collection::{Resource, ResourceCollection};
use crate::secret::{CopyMode, copy_secret};
use crate::system;

/// Wildcard certificate issued in the ingress namespace.
pub const CERT_SOURCE_NAMESPACE: &str = "ingress";
pub const CERT_SECRET: &str = "https-cert";

/// Multi-tenant Alertmanager every tenant's `alertmanager` Service aliases.
pub const SHARED_ALERTMANAGER_HOST: &str = "alertmanager.cortex.svc.cluster.local";

pub fn tenant_resources(state: &State, config: &GlobalConfig, tenant: &Tenant) -> ResourceCollection {
    let namespace = tenant_namespace(tenant);
    let mut collection = ResourceCollection::new();

    collection.add(namespace_resource(tenant, &namespace));
    collection.add(alertmanager_alias(tenant, &namespace));
    collection.merge(copy_secret(
        state,
        CERT_SOURCE_NAMESPACE,
        CERT_SECRET,
        &namespace,
        CopyMode::Immutable,
    ));
    collection.merge(prometheus::prometheus_resources(state, config, tenant));
    collection.merge(grafana::grafana_resources(state, config, tenant));

    if tenant.is_system() {
        collection.merge(system::system_resources(state, tenant));
    }
    collection
}

fn namespace_resource(tenant: &Tenant, namespace: &str) -> Resource {
    Resource::new(
        ResourceKind::Namespace,
        json!({
            "metadata": {
                "name": namespace,
                "labels": {"tenant": tenant.name},
            },
        }),
    )
}

/// ExternalName Service so in-namespace clients reach the shared
/// Alertmanager as plain `alertmanager`.
fn alertmanager_alias(tenant: &Tenant, namespace: &str) -> Resource {
    Resource::new(
        ResourceKind::Service,
        json!({
            "metadata": {
                "name": "alertmanager",
                "namespace": namespace,
                "labels": {"app": "alertmanager", "tenant": tenant.name},
            },
            "spec": {
                "type": "ExternalName",
                "externalName": SHARED_ALERTMANAGER_HOST,
                "ports": [{"name": "http", "port": 80, "protocol": "TCP"}],
            },
        }),
    )
}
