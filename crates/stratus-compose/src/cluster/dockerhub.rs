//! DockerHub pull credentials, replicated into every namespace.

use serde_json::{Value, json};
use stratus_state::{ResourceKind, State};

use crate::collection::ResourceCollection;
use crate::secret::{CopyMode, copy_secret};

pub const DOCKERHUB_SOURCE_NAMESPACE: &str = "kube-system";
pub const DOCKERHUB_SECRET: &str = "dockerhub-credentials";

/// Mirror the credentials from `kube-system` into every other cached
/// namespace. Empty until the source secret shows up in the cache.
pub fn dockerhub_resources(state: &State) -> ResourceCollection {
    let mut namespaces = state.namespace_names();
    namespaces.sort_unstable();

    let mut collection = ResourceCollection::new();
    for namespace in namespaces {
        collection.merge(copy_secret(
            state,
            DOCKERHUB_SOURCE_NAMESPACE,
            DOCKERHUB_SECRET,
            namespace,
            CopyMode::Mirror,
        ));
    }
    collection
}

/// `imagePullSecrets` for every pod spec we compose, `None` until the
/// credentials are cached. The API server drops empty lists, so callers
/// leave the key out instead of writing `[]`.
pub fn image_pull_secrets(state: &State) -> Option<Value> {
    state
        .find(ResourceKind::Secret, DOCKERHUB_SOURCE_NAMESPACE, DOCKERHUB_SECRET)
        .map(|_| json!([{ "name": DOCKERHUB_SECRET }]))
}

/// Set `imagePullSecrets` on a workload's pod template when credentials
/// are cached.
pub fn with_pull_secrets(state: &State, mut workload: Value) -> Value {
    if let Some(secrets) = image_pull_secrets(state) {
        workload["spec"]["template"]["spec"]["imagePullSecrets"] = secrets;
    }
    workload
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratus_state::{Action, CacheEvent, KubeObject};

    fn obj(v: Value) -> KubeObject {
        KubeObject::from_value(v).unwrap()
    }

    fn cluster(with_creds: bool) -> State {
        let namespaces = ["kube-system", "default", "dev-tenant"]
            .iter()
            .map(|n| obj(json!({"metadata": {"name": n}})))
            .collect();
        let secrets = if with_creds {
            vec![obj(json!({
                "metadata": {"name": DOCKERHUB_SECRET, "namespace": DOCKERHUB_SOURCE_NAMESPACE},
                "type": "kubernetes.io/dockerconfigjson",
                "data": {".dockerconfigjson": "e30="}
            }))]
        } else {
            vec![]
        };
        State::new()
            .with(Action::Kube {
                kind: ResourceKind::Namespace,
                event: CacheEvent::List(namespaces),
            })
            .with(Action::Kube {
                kind: ResourceKind::Secret,
                event: CacheEvent::List(secrets),
            })
    }

    #[test]
    fn copies_into_every_other_namespace() {
        let c = dockerhub_resources(&cluster(true));
        let namespaces: Vec<_> = c.iter().filter_map(|r| r.namespace()).collect();
        assert_eq!(namespaces, vec!["default", "dev-tenant"]);
        assert!(c.iter().all(|r| !r.is_immutable()));
    }

    #[test]
    fn missing_source_is_not_an_error() {
        assert!(dockerhub_resources(&cluster(false)).is_empty());
        assert_eq!(image_pull_secrets(&cluster(false)), None);
        assert_eq!(
            image_pull_secrets(&cluster(true)),
            Some(json!([{"name": "dockerhub-credentials"}]))
        );
    }

    #[test]
    fn pull_secrets_key_is_omitted_without_credentials() {
        let workload = || json!({"spec": {"template": {"spec": {"containers": []}}}});

        let bare = with_pull_secrets(&cluster(false), workload());
        assert!(bare["spec"]["template"]["spec"].get("imagePullSecrets").is_none());

        let filled = with_pull_secrets(&cluster(true), workload());
        assert_eq!(
            filled["spec"]["template"]["spec"]["imagePullSecrets"],
            json!([{"name": "dockerhub-credentials"}])
        );
    }
}
