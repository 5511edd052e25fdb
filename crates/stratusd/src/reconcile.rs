//! Composer reconciliation loop.
//!
//! Each pass composes the desired collection from the latest snapshot,
//! compares every resource with its cached live object, and hands the ones
//! that drifted (or do not exist yet) to an [`Applier`] in dependency order.

use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use stratus_compose::{ComposeError, Resource, compose};
use stratus_state::{KubeObject, State, StateStore};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Writes one resource to the cluster.
pub trait Applier: Send + Sync {
    fn apply(&self, resource: &Resource) -> impl Future<Output = anyhow::Result<()>> + Send;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    pub desired: usize,
    pub applied: usize,
    pub unchanged: usize,
    pub failed: usize,
}

/// The cached live object for `resource`, if any.
pub fn live_object<'a>(state: &'a State, resource: &Resource) -> Option<&'a KubeObject> {
    state
        .cache(resource.kind())
        .resources()
        .iter()
        .find(|o| o.name() == resource.name() && o.namespace() == resource.namespace())
}

/// Top-level fields that items of a list response do not carry.
const TYPE_META: [&str; 2] = ["apiVersion", "kind"];

/// Whether `resource` must be sent to the API server.
///
/// Immutable resources are only ever created. Everything else is applied
/// when some field of the desired manifest differs from the live object;
/// fields the server adds (status, defaults, metadata) are ignored.
pub fn needs_apply(state: &State, resource: &Resource) -> bool {
    match live_object(state, resource) {
        None => true,
        Some(_) if resource.is_immutable() => false,
        Some(live) => !matches_live(resource.manifest(), live.raw()),
    }
}

/// [`is_subset`] over a whole manifest, skipping its type metadata.
pub fn matches_live(desired: &Value, live: &Value) -> bool {
    match (desired, live) {
        (Value::Object(want), Value::Object(have)) => want
            .iter()
            .filter(|(k, _)| !TYPE_META.contains(&k.as_str()))
            .all(|(k, v)| have.get(k).is_some_and(|h| is_subset(v, h))),
        _ => is_subset(desired, live),
    }
}

/// `desired` is contained in `live`: objects compare key by key, arrays
/// element by element with equal length, scalars by equality.
pub fn is_subset(desired: &Value, live: &Value) -> bool {
    match (desired, live) {
        (Value::Object(want), Value::Object(have)) => want
            .iter()
            .all(|(k, v)| have.get(k).is_some_and(|h| is_subset(v, h))),
        (Value::Array(want), Value::Array(have)) => {
            want.len() == have.len() && want.iter().zip(have).all(|(w, h)| is_subset(w, h))
        }
        _ => desired == live,
    }
}

/// One reconciliation pass. Returns `None` when nothing could be composed.
pub async fn reconcile_pass<A: Applier>(state: &State, applier: &A) -> Option<PassStats> {
    let desired = match compose(state) {
        Ok(desired) => desired,
        Err(ComposeError::ConfigNotLoaded) => {
            debug!("cluster config not loaded yet, skipping pass");
            return None;
        }
        Err(e) => {
            error!(error = %e, "composition failed, skipping pass");
            return None;
        }
    };

    let mut stats = PassStats {
        desired: desired.len(),
        ..PassStats::default()
    };
    for resource in desired.in_apply_order() {
        if !needs_apply(state, resource) {
            stats.unchanged += 1;
            continue;
        }
        match applier.apply(resource).await {
            Ok(()) => {
                stats.applied += 1;
                debug!(resource = %resource.id(), "applied");
            }
            Err(e) => {
                stats.failed += 1;
                warn!(resource = %resource.id(), error = %format!("{e:#}"), "apply failed");
            }
        }
    }

    if stats.applied + stats.failed > 0 {
        info!(
            desired = stats.desired,
            applied = stats.applied,
            failed = stats.failed,
            "reconciliation pass complete"
        );
    }
    Some(stats)
}

/// Run passes on a fixed period until shutdown.
pub async fn run<A: Applier>(
    applier: A,
    store: StateStore,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    loop {
        reconcile_pass(&store.snapshot(), &applier).await;

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.changed() => {
                debug!("composer loop shutting down");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use stratus_core::{CloudTarget, GlobalConfig, Tenant};
    use stratus_state::{Action, CacheEvent, ResourceKind};

    #[derive(Clone, Default)]
    struct RecordingApplier {
        applied: Arc<Mutex<Vec<String>>>,
        reject: Option<ResourceKind>,
    }

    impl Applier for RecordingApplier {
        async fn apply(&self, resource: &Resource) -> anyhow::Result<()> {
            if self.reject == Some(resource.kind()) {
                anyhow::bail!("admission webhook denied the request");
            }
            self.applied.lock().unwrap().push(resource.id().to_string());
            Ok(())
        }
    }

    fn config() -> GlobalConfig {
        GlobalConfig {
            name: "prod".into(),
            dns_name: "example.com.".into(),
            target: CloudTarget::Aws,
            postgres_endpoint: "postgres://grafana@pg:5432/".into(),
            metric_retention_days: 15,
            log_retention_days: 7,
        }
    }

    fn state_with_system() -> State {
        State::new()
            .with(Action::SetConfig(config()))
            .with(Action::SetTenants(vec![Tenant::system()]))
    }

    #[test]
    fn subset_ignores_server_added_fields() {
        let desired = json!({"metadata": {"name": "a", "labels": {"x": "1"}}, "spec": {"ports": [{"port": 80}]}});
        let live = json!({
            "metadata": {"name": "a", "uid": "123", "labels": {"x": "1", "y": "2"}},
            "spec": {"ports": [{"port": 80, "protocol": "TCP"}], "clusterIP": "10.0.0.1"},
            "status": {},
        });
        assert!(is_subset(&desired, &live));

        let drifted = json!({"metadata": {"name": "a", "labels": {"x": "2"}}, "spec": {"ports": [{"port": 80}]}});
        assert!(!is_subset(&drifted, &live));

        let extra_port = json!({"spec": {"ports": [{"port": 80}, {"port": 443}]}});
        assert!(!is_subset(&extra_port, &live));
    }

    #[test]
    fn immutable_resources_are_never_reapplied() {
        let resource = Resource::new(
            ResourceKind::Secret,
            json!({"metadata": {"namespace": "dev-tenant", "name": "https-cert"}, "data": {"tls.crt": "bmV3"}}),
        )
        .immutable();

        let empty = State::new();
        assert!(needs_apply(&empty, &resource));

        let live = KubeObject::from_value(json!({
            "metadata": {"namespace": "dev-tenant", "name": "https-cert"},
            "data": {"tls.crt": "b2xk"},
        }))
        .unwrap();
        let cached = empty.with(Action::Kube {
            kind: ResourceKind::Secret,
            event: CacheEvent::List(vec![live]),
        });
        assert!(!needs_apply(&cached, &resource));
    }

    fn cached(state: State, kind: ResourceKind, live: Value) -> State {
        state.with(Action::Kube {
            kind,
            event: CacheEvent::List(vec![KubeObject::from_value(live).unwrap()]),
        })
    }

    #[test]
    fn list_items_without_type_meta_are_not_drift() {
        let namespace = Resource::new(
            ResourceKind::Namespace,
            json!({"metadata": {"name": "dev-tenant", "labels": {"tenant": "dev"}}}),
        );
        assert_eq!(namespace.manifest()["kind"], json!("Namespace"));

        let state = cached(
            State::new(),
            ResourceKind::Namespace,
            json!({
                "metadata": {"name": "dev-tenant", "uid": "42", "labels": {"tenant": "dev"}},
                "spec": {"finalizers": ["kubernetes"]},
            }),
        );
        assert!(!needs_apply(&state, &namespace));

        let nested = json!({"spec": {"template": {"kind": "Pod"}}});
        assert!(!matches_live(&nested, &json!({"spec": {"template": {}}})));
    }

    #[test]
    fn served_deployment_without_pull_credentials_is_converged() {
        let state = state_with_system().with(Action::SetTenants(vec![Tenant::user("dev").unwrap()]));
        let desired = compose(&state).unwrap();
        let grafana = desired
            .get(ResourceKind::Deployment, Some("dev-tenant"), "grafana")
            .unwrap();
        let pod = &grafana.manifest()["spec"]["template"]["spec"];
        assert!(pod.get("imagePullSecrets").is_none());

        // What a watcher lists back: no type metadata, server defaults added.
        let mut live = grafana.manifest().clone();
        let object = live.as_object_mut().unwrap();
        object.remove("apiVersion");
        object.remove("kind");
        live["spec"]["progressDeadlineSeconds"] = json!(600);
        live["status"] = json!({"readyReplicas": 1});

        let observed = cached(state, ResourceKind::Deployment, live);
        assert!(!needs_apply(&observed, grafana));
    }

    #[tokio::test]
    async fn pass_is_skipped_without_config() {
        let applier = RecordingApplier::default();
        let state = State::new().with(Action::SetTenants(vec![Tenant::system()]));
        assert_eq!(reconcile_pass(&state, &applier).await, None);
        assert!(applier.applied.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn pass_applies_everything_in_dependency_order() {
        let applier = RecordingApplier::default();
        let stats = reconcile_pass(&state_with_system(), &applier).await.unwrap();

        assert_eq!(stats.applied, stats.desired);
        let applied = applier.applied.lock().unwrap();
        assert!(applied[0].starts_with("Namespace/"));
        let first_workload = applied.iter().position(|id| id.starts_with("Deployment/")).unwrap();
        let last_account = applied.iter().rposition(|id| id.starts_with("ServiceAccount/")).unwrap();
        assert!(last_account < first_workload);
    }

    #[tokio::test]
    async fn failed_applies_do_not_stop_the_pass() {
        let applier = RecordingApplier {
            reject: Some(ResourceKind::ServiceMonitor),
            ..RecordingApplier::default()
        };
        let stats = reconcile_pass(&state_with_system(), &applier).await.unwrap();

        assert!(stats.failed > 0);
        assert_eq!(stats.applied + stats.failed, stats.desired);
        assert!(applier.applied.lock().unwrap().iter().any(|id| id.starts_with("APIService/")));
    }
}
