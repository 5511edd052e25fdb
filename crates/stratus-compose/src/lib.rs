//! stratus-compose: the desired-state composer.
//!
//! Pure functions from a [`State`] snapshot to the [`ResourceCollection`]
//! the cluster should converge to. Nothing here talks to the API server:
//! the same snapshot always produces the same collection, which is what
//! makes diff-based apply safe.
//!
//! # Composition
//!
//! ```text
//! compose(State)
//!  ├── cluster::cluster_resources        storage classes, DockerHub mirror
//!  └── for each tenant:
//!      tenant::tenant_resources          namespace, alertmanager alias,
//!       │                                cert copy, Prometheus, Grafana
//!       └── system::system_resources     (system tenant only) exporters,
//!                                        adapter, rules, scrape RBAC
//! ```
//!
//! Resources that depend on something not yet cached (a source secret, the
//! namespace list) are simply left out until it shows up.

pub mod cluster;
pub mod collection;
pub mod error;
pub mod images;
pub mod secret;
pub mod system;
pub mod tenant;

pub use collection::{Resource, ResourceCollection, ResourceId};
pub use error::{ComposeError, ComposeResult};
pub use secret::{CopyMode, copy_secret};

use stratus_state::State;
use tracing::debug;

/// Compose the full desired state of the cluster.
///
/// Fails only when the global config is missing or invalid, or a tenant
/// name is malformed.
pub fn compose(state: &State) -> ComposeResult<ResourceCollection> {
    let config = state.config().ok_or(ComposeError::ConfigNotLoaded)?;
    config.validate()?;

    let mut collection = cluster::cluster_resources(state, config);
    for tenant in state.tenants() {
        tenant.validate()?;
        collection.merge(tenant::tenant_resources(state, config, tenant));
    }

    debug!(
        tenants = state.tenants().len(),
        resources = collection.len(),
        "composed desired state"
    );
    Ok(collection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stratus_core::{CloudTarget, GlobalConfig, Tenant, TenantType};
    use stratus_state::{Action, CacheEvent, KubeObject, ResourceKind};

    fn config() -> GlobalConfig {
        GlobalConfig {
            name: "prod".into(),
            dns_name: "example.com.".into(),
            target: CloudTarget::Gcp,
            postgres_endpoint: "postgres://grafana@db:5432".into(),
            metric_retention_days: 30,
            log_retention_days: 7,
        }
    }

    fn obj(v: serde_json::Value) -> KubeObject {
        KubeObject::from_value(v).unwrap()
    }

    fn populated(tenants: Vec<Tenant>) -> State {
        let namespaces = ["default", "kube-system", "ingress", "system-tenant"]
            .iter()
            .map(|n| obj(json!({"metadata": {"name": n}})))
            .collect();
        let secrets = vec![
            obj(json!({
                "metadata": {"name": "dockerhub-credentials", "namespace": "kube-system"},
                "type": "kubernetes.io/dockerconfigjson",
                "data": {".dockerconfigjson": "e30="}
            })),
            obj(json!({
                "metadata": {"name": "https-cert", "namespace": "ingress"},
                "type": "kubernetes.io/tls",
                "data": {"tls.crt": "Yw==", "tls.key": "aw=="}
            })),
        ];
        let nodes = (0..3)
            .map(|i| obj(json!({"metadata": {"name": format!("node-{i}")}})))
            .collect();

        State::new()
            .with(Action::SetConfig(config()))
            .with(Action::SetTenants(tenants))
            .with(Action::Kube { kind: ResourceKind::Namespace, event: CacheEvent::List(namespaces) })
            .with(Action::Kube { kind: ResourceKind::Secret, event: CacheEvent::List(secrets) })
            .with(Action::Kube { kind: ResourceKind::Node, event: CacheEvent::List(nodes) })
    }

    #[test]
    fn missing_config_is_reported() {
        assert!(matches!(compose(&State::new()), Err(ComposeError::ConfigNotLoaded)));
    }

    #[test]
    fn invalid_config_is_an_error() {
        let mut bad = config();
        bad.postgres_endpoint = "mysql://nope".into();
        let state = State::new().with(Action::SetConfig(bad));
        assert!(matches!(compose(&state), Err(ComposeError::Invalid(_))));
    }

    #[test]
    fn malformed_tenant_name_is_an_error() {
        let state = populated(vec![Tenant {
            name: "Bad_Name".into(),
            kind: TenantType::User,
        }]);
        assert!(matches!(compose(&state), Err(ComposeError::Invalid(_))));
    }

    #[test]
    fn composing_twice_is_identical() {
        let state = populated(vec![Tenant::system(), Tenant::user("dev").unwrap()]);
        assert_eq!(compose(&state).unwrap(), compose(&state).unwrap());
    }

    #[test]
    fn adding_a_tenant_only_adds_resources() {
        let before_state = populated(vec![Tenant::system(), Tenant::user("dev").unwrap()]);
        let after_state = populated(vec![
            Tenant::system(),
            Tenant::user("dev").unwrap(),
            Tenant::user("staging").unwrap(),
        ]);
        let before = compose(&before_state).unwrap();
        let after = compose(&after_state).unwrap();

        for resource in before.iter() {
            let id = resource.id();
            let same = after
                .get(id.kind, id.namespace.as_deref(), &id.name)
                .unwrap_or_else(|| panic!("{id} disappeared"));
            assert_eq!(same, resource, "{id} changed");
        }
        assert!(after.len() > before.len());
        assert!(after.contains(ResourceKind::Namespace, None, "staging-tenant"));
    }

    #[test]
    fn system_only_stack_is_not_duplicated_for_users() {
        let c = compose(&populated(vec![Tenant::system(), Tenant::user("dev").unwrap()])).unwrap();
        let ksm: Vec<_> = c
            .iter()
            .filter(|r| r.kind() == ResourceKind::Deployment && r.name() == "kube-state-metrics")
            .collect();
        assert_eq!(ksm.len(), 1);
        assert_eq!(ksm[0].namespace(), Some("system-tenant"));
    }

    #[test]
    fn pod_specs_reference_pull_secret_when_cached() {
        let c = compose(&populated(vec![Tenant::user("dev").unwrap()])).unwrap();
        let grafana = c.get(ResourceKind::Deployment, Some("dev-tenant"), "grafana").unwrap();
        assert_eq!(
            grafana.manifest()["spec"]["template"]["spec"]["imagePullSecrets"],
            json!([{"name": "dockerhub-credentials"}])
        );
        // The mirror reaches every cached namespace except its source.
        assert!(c.contains(ResourceKind::Secret, Some("default"), "dockerhub-credentials"));
        assert!(!c.contains(ResourceKind::Secret, Some("kube-system"), "dockerhub-credentials"));
    }

    #[test]
    fn apply_order_creates_namespaces_first() {
        let c = compose(&populated(vec![Tenant::user("dev").unwrap()])).unwrap();
        let ordered = c.in_apply_order();
        assert_eq!(ordered[0].kind(), ResourceKind::Namespace);
        let ns_pos = ordered
            .iter()
            .position(|r| r.kind() == ResourceKind::Namespace && r.name() == "dev-tenant")
            .unwrap();
        let deployment_pos = ordered
            .iter()
            .position(|r| r.kind() == ResourceKind::Deployment && r.namespace() == Some("dev-tenant"))
            .unwrap();
        assert!(ns_pos < deployment_pos);
    }
}
