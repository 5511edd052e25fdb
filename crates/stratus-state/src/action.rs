//! Actions dispatched into the state store.

use stratus_core::{GlobalConfig, Tenant};

use crate::kinds::ResourceKind;
use crate::object::KubeObject;

/// A change to one cache.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEvent<T> {
    /// Full listing; hydrates the cache.
    List(Vec<T>),
    /// Single add/update from a watch.
    Apply(T),
    /// Single delete from a watch.
    Delete(T),
    /// Watch or poll failure; existing resources are kept.
    Error(String),
}

/// ClickHouse listings mirrored into the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClickHouseTable {
    Databases,
    Users,
}

impl ClickHouseTable {
    /// Query that lists the table's names.
    pub fn list_query(self) -> &'static str {
        match self {
            ClickHouseTable::Databases => "SHOW DATABASES",
            ClickHouseTable::Users => "SHOW USERS",
        }
    }
}

/// Every state transition the controller knows about.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SetTenants(Vec<Tenant>),
    SetConfig(GlobalConfig),
    Kube {
        kind: ResourceKind,
        event: CacheEvent<KubeObject>,
    },
    ClickHouse {
        table: ClickHouseTable,
        event: CacheEvent<String>,
    },
}

impl Action {
    /// Short label for debug logs; payloads can be large.
    pub fn label(&self) -> String {
        match self {
            Action::SetTenants(t) => format!("SetTenants({})", t.len()),
            Action::SetConfig(_) => "SetConfig".to_string(),
            Action::Kube { kind, event } => format!("Kube({kind}/{})", event_label(event)),
            Action::ClickHouse { table, event } => {
                format!("ClickHouse({table:?}/{})", event_label(event))
            }
        }
    }
}

fn event_label<T>(event: &CacheEvent<T>) -> &'static str {
    match event {
        CacheEvent::List(_) => "list",
        CacheEvent::Apply(_) => "apply",
        CacheEvent::Delete(_) => "delete",
        CacheEvent::Error(_) => "error",
    }
}
