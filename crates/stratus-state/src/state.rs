//! Immutable state snapshot and its reducer.

use std::collections::BTreeMap;
use std::sync::Arc;

use stratus_core::{GlobalConfig, Tenant};

use crate::action::{Action, CacheEvent, ClickHouseTable};
use crate::cache::{CacheItem, WatchedResourceState};
use crate::kinds::ResourceKind;
use crate::object::KubeObject;

/// Everything the composer and the reconcilers read.
///
/// Cheap to clone: every field is behind an `Arc`, and [`State::reduce`]
/// only replaces the pieces an action touches.
#[derive(Debug, Clone)]
pub struct State {
    tenants: Arc<Vec<Tenant>>,
    config: Option<Arc<GlobalConfig>>,
    cluster: BTreeMap<ResourceKind, Arc<WatchedResourceState<KubeObject>>>,
    databases: Arc<WatchedResourceState<String>>,
    users: Arc<WatchedResourceState<String>>,
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

impl State {
    /// Empty state: no tenants, no config, every cache unloaded.
    pub fn new() -> Self {
        let cluster = ResourceKind::ALL
            .iter()
            .map(|k| (*k, Arc::new(WatchedResourceState::default())))
            .collect();
        Self {
            tenants: Arc::new(Vec::new()),
            config: None,
            cluster,
            databases: Arc::new(WatchedResourceState::default()),
            users: Arc::new(WatchedResourceState::default()),
        }
    }

    /// Apply one action in place.
    pub fn reduce(&mut self, action: Action) {
        match action {
            Action::SetTenants(tenants) => self.tenants = Arc::new(tenants),
            Action::SetConfig(config) => self.config = Some(Arc::new(config)),
            Action::Kube { kind, event } => {
                let cache = self.cluster.entry(kind).or_default();
                apply_event(Arc::make_mut(cache), event);
            }
            Action::ClickHouse { table, event } => {
                let cache = match table {
                    ClickHouseTable::Databases => &mut self.databases,
                    ClickHouseTable::Users => &mut self.users,
                };
                apply_event(Arc::make_mut(cache), event);
            }
        }
    }

    /// Builder-style [`State::reduce`], handy for assembling fixtures.
    pub fn with(mut self, action: Action) -> Self {
        self.reduce(action);
        self
    }

    // ── Reads ──────────────────────────────────────────────────────

    pub fn tenants(&self) -> &[Tenant] {
        &self.tenants
    }

    pub fn config(&self) -> Option<&GlobalConfig> {
        self.config.as_deref()
    }

    pub fn cache(&self, kind: ResourceKind) -> &WatchedResourceState<KubeObject> {
        // Every kind is seeded in `new`, and `reduce` only ever inserts.
        &self.cluster[&kind]
    }

    pub fn clickhouse(&self, table: ClickHouseTable) -> &WatchedResourceState<String> {
        match table {
            ClickHouseTable::Databases => &self.databases,
            ClickHouseTable::Users => &self.users,
        }
    }

    /// Look up one cached object.
    pub fn find(&self, kind: ResourceKind, namespace: &str, name: &str) -> Option<&KubeObject> {
        self.cache(kind)
            .resources()
            .iter()
            .find(|o| o.name() == name && o.namespace() == Some(namespace))
    }

    pub fn node_count(&self) -> usize {
        self.cache(ResourceKind::Node).resources().len()
    }

    /// Names of every namespace currently in the cache.
    pub fn namespace_names(&self) -> Vec<&str> {
        self.cache(ResourceKind::Namespace)
            .resources()
            .iter()
            .map(KubeObject::name)
            .collect()
    }

    /// Kinds from `required` whose cache has not completed a first listing.
    pub fn unhydrated(&self, required: &[ResourceKind]) -> Vec<ResourceKind> {
        required
            .iter()
            .copied()
            .filter(|k| !self.cache(*k).is_loaded())
            .collect()
    }
}

fn apply_event<T: CacheItem>(cache: &mut WatchedResourceState<T>, event: CacheEvent<T>) {
    match event {
        CacheEvent::List(items) => cache.ingest_list(items),
        CacheEvent::Apply(item) => cache.apply(item),
        CacheEvent::Delete(item) => cache.delete(&item),
        CacheEvent::Error(e) => cache.ingest_error(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn namespace(name: &str) -> KubeObject {
        KubeObject::from_value(json!({"metadata": {"name": name}})).unwrap()
    }

    #[test]
    fn new_state_has_every_cache_unloaded() {
        let state = State::new();
        assert_eq!(state.unhydrated(ResourceKind::ALL).len(), ResourceKind::ALL.len());
        assert!(state.tenants().is_empty());
        assert!(state.config().is_none());
    }

    #[test]
    fn kube_list_hydrates_only_that_kind() {
        let state = State::new().with(Action::Kube {
            kind: ResourceKind::Namespace,
            event: CacheEvent::List(vec![namespace("default"), namespace("kube-system")]),
        });

        assert!(state.cache(ResourceKind::Namespace).is_loaded());
        assert_eq!(
            state.unhydrated(&[ResourceKind::Namespace, ResourceKind::Secret]),
            vec![ResourceKind::Secret]
        );
        assert_eq!(state.namespace_names(), vec!["default", "kube-system"]);
    }

    #[test]
    fn reduce_is_copy_on_write() {
        let before = State::new().with(Action::Kube {
            kind: ResourceKind::Node,
            event: CacheEvent::List(vec![namespace("n1")]),
        });
        let snapshot = before.clone();

        let after = before.with(Action::Kube {
            kind: ResourceKind::Node,
            event: CacheEvent::Apply(namespace("n2")),
        });

        assert_eq!(snapshot.node_count(), 1);
        assert_eq!(after.node_count(), 2);
    }

    #[test]
    fn clickhouse_error_keeps_listing() {
        let state = State::new()
            .with(Action::ClickHouse {
                table: ClickHouseTable::Users,
                event: CacheEvent::List(vec!["default".to_string()]),
            })
            .with(Action::ClickHouse {
                table: ClickHouseTable::Users,
                event: CacheEvent::Error("timeout".to_string()),
            });

        let users = state.clickhouse(ClickHouseTable::Users);
        assert!(users.is_loaded());
        assert_eq!(users.resources(), ["default".to_string()]);
        assert!(!state.clickhouse(ClickHouseTable::Databases).is_loaded());
    }

    #[test]
    fn set_tenants_replaces_list() {
        let state = State::new()
            .with(Action::SetTenants(vec![Tenant::system()]))
            .with(Action::SetTenants(vec![Tenant::system(), Tenant::user("dev").unwrap()]));
        assert_eq!(state.tenants().len(), 2);
    }
}
