//! ResourceCollection: the ordered, mergeable set of desired manifests.

use std::collections::BTreeSet;
use std::fmt;

use serde_json::Value;
use stratus_state::ResourceKind;

/// Identity of a manifest inside a collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId {
    pub kind: ResourceKind,
    pub namespace: Option<String>,
    pub name: String,
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{ns}/{}", self.kind, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

/// One desired manifest.
///
/// `immutable` resources are created once and never updated afterwards,
/// even when the composed manifest changes.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    kind: ResourceKind,
    manifest: Value,
    immutable: bool,
}

impl Resource {
    /// Wrap a manifest, stamping its `apiVersion` and `kind`.
    pub fn new(kind: ResourceKind, mut manifest: Value) -> Self {
        if let Value::Object(map) = &mut manifest {
            map.insert("apiVersion".to_string(), Value::String(kind.api_version()));
            map.insert("kind".to_string(), Value::String(kind.kind().to_string()));
        }
        Self {
            kind,
            manifest,
            immutable: false,
        }
    }

    pub fn immutable(mut self) -> Self {
        self.immutable = true;
        self
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        self.manifest
            .pointer("/metadata/name")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.manifest
            .pointer("/metadata/namespace")
            .and_then(Value::as_str)
    }

    pub fn manifest(&self) -> &Value {
        &self.manifest
    }

    pub fn is_immutable(&self) -> bool {
        self.immutable
    }

    pub fn id(&self) -> ResourceId {
        ResourceId {
            kind: self.kind,
            namespace: self.namespace().map(str::to_string),
            name: self.name().to_string(),
        }
    }
}

/// Ordered set of [`Resource`]s keyed by [`ResourceId`].
///
/// Adding a resource whose id is already present replaces the earlier
/// entry in place, so merging is associative: the first occurrence fixes
/// the position, the last one wins the content.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceCollection {
    items: Vec<Resource>,
}

impl ResourceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, resource: Resource) {
        let id = resource.id();
        match self.items.iter_mut().find(|r| r.id() == id) {
            Some(existing) => *existing = resource,
            None => self.items.push(resource),
        }
    }

    /// Merge another collection into this one.
    pub fn merge(&mut self, other: ResourceCollection) {
        for resource in other.items {
            self.add(resource);
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.items.iter()
    }

    pub fn get(&self, kind: ResourceKind, namespace: Option<&str>, name: &str) -> Option<&Resource> {
        self.items
            .iter()
            .find(|r| r.kind == kind && r.namespace() == namespace && r.name() == name)
    }

    pub fn contains(&self, kind: ResourceKind, namespace: Option<&str>, name: &str) -> bool {
        self.get(kind, namespace, name).is_some()
    }

    pub fn ids(&self) -> BTreeSet<ResourceId> {
        self.items.iter().map(Resource::id).collect()
    }

    /// Resources sorted so that dependencies come first: namespaces before
    /// anything placed in them, CRDs before custom resources, service
    /// accounts and roles before their bindings and workloads.
    ///
    /// The sort is stable, so composition order breaks ties.
    pub fn in_apply_order(&self) -> Vec<&Resource> {
        let mut ordered: Vec<&Resource> = self.items.iter().collect();
        ordered.sort_by_key(|r| apply_rank(r.kind));
        ordered
    }
}

impl Extend<Resource> for ResourceCollection {
    fn extend<I: IntoIterator<Item = Resource>>(&mut self, iter: I) {
        for resource in iter {
            self.add(resource);
        }
    }
}

impl FromIterator<Resource> for ResourceCollection {
    fn from_iter<I: IntoIterator<Item = Resource>>(iter: I) -> Self {
        let mut collection = Self::new();
        collection.extend(iter);
        collection
    }
}

impl IntoIterator for ResourceCollection {
    type Item = Resource;
    type IntoIter = std::vec::IntoIter<Resource>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

fn apply_rank(kind: ResourceKind) -> u8 {
    use ResourceKind::*;
    match kind {
        Namespace => 0,
        CustomResourceDefinition => 1,
        StorageClass | PersistentVolume => 2,
        ServiceAccount | Role | ClusterRole => 3,
        RoleBinding | ClusterRoleBinding => 4,
        ConfigMap | Secret | PersistentVolumeClaim => 5,
        Service => 6,
        Deployment | DaemonSet | StatefulSet => 7,
        Prometheus | Alertmanager | ServiceMonitor | PodMonitor | PrometheusRule => 8,
        Issuer | ClusterIssuer | Certificate | CertificateRequest => 8,
        ApiService | Ingress | Node => 9,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn res(kind: ResourceKind, ns: Option<&str>, name: &str, marker: u32) -> Resource {
        let mut metadata = json!({"name": name});
        if let Some(ns) = ns {
            metadata["namespace"] = json!(ns);
        }
        Resource::new(kind, json!({"metadata": metadata, "marker": marker}))
    }

    #[test]
    fn new_stamps_api_version_and_kind() {
        let r = res(ResourceKind::Deployment, Some("a"), "web", 0);
        assert_eq!(r.manifest()["apiVersion"], "apps/v1");
        assert_eq!(r.manifest()["kind"], "Deployment");
        assert_eq!(r.id().to_string(), "Deployment/a/web");
        assert!(!r.is_immutable());
    }

    #[test]
    fn add_replaces_same_identity_in_place() {
        let mut c = ResourceCollection::new();
        c.add(res(ResourceKind::Service, Some("a"), "x", 1));
        c.add(res(ResourceKind::Service, Some("b"), "x", 1));
        c.add(res(ResourceKind::Service, Some("a"), "x", 2));

        assert_eq!(c.len(), 2);
        let first = c.iter().next().unwrap();
        assert_eq!(first.manifest()["marker"], 2);
    }

    #[test]
    fn merge_is_associative() {
        let a: ResourceCollection = [res(ResourceKind::Secret, Some("n"), "s", 1)].into_iter().collect();
        let b: ResourceCollection = [
            res(ResourceKind::Secret, Some("n"), "s", 2),
            res(ResourceKind::ConfigMap, Some("n"), "c", 1),
        ]
        .into_iter()
        .collect();
        let c: ResourceCollection = [res(ResourceKind::ConfigMap, Some("n"), "c", 3)].into_iter().collect();

        let mut left = a.clone();
        left.merge(b.clone());
        left.merge(c.clone());

        let mut bc = b;
        bc.merge(c);
        let mut right = a;
        right.merge(bc);

        assert_eq!(left, right);
    }

    #[test]
    fn apply_order_puts_namespaces_and_roles_first() {
        let c: ResourceCollection = [
            res(ResourceKind::Deployment, Some("t"), "grafana", 0),
            res(ResourceKind::RoleBinding, Some("t"), "rb", 0),
            res(ResourceKind::Role, Some("t"), "r", 0),
            res(ResourceKind::Namespace, None, "t", 0),
        ]
        .into_iter()
        .collect();

        let kinds: Vec<ResourceKind> = c.in_apply_order().iter().map(|r| r.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                ResourceKind::Namespace,
                ResourceKind::Role,
                ResourceKind::RoleBinding,
                ResourceKind::Deployment
            ]
        );
    }
}
