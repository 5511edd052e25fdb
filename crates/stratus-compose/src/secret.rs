//! Copying secrets between namespaces.

use serde_json::{Value, json};
use stratus_state::{ResourceKind, State};

use crate::collection::{Resource, ResourceCollection};

/// How the copy behaves once it exists in the target namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyMode {
    /// Created once, never updated. Deleting the copy forces a refresh.
    Immutable,
    /// Re-issued every pass, so it tracks the source.
    Mirror,
}

/// Copy `source_namespace/name` into `target_namespace` under the same name.
///
/// Data and type are copied verbatim. Returns an empty collection while the
/// source is not in the cache, and when source and target coincide.
pub fn copy_secret(
    state: &State,
    source_namespace: &str,
    name: &str,
    target_namespace: &str,
    mode: CopyMode,
) -> ResourceCollection {
    let mut collection = ResourceCollection::new();
    if source_namespace == target_namespace {
        return collection;
    }
    let Some(source) = state.find(ResourceKind::Secret, source_namespace, name) else {
        return collection;
    };

    let mut manifest = json!({
        "metadata": {
            "name": name,
            "namespace": target_namespace,
        },
        "data": source.data(),
    });
    if let Some(kind) = source.type_field() {
        manifest["type"] = Value::String(kind.to_string());
    }

    let resource = match mode {
        CopyMode::Immutable => {
            manifest["immutable"] = Value::Bool(true);
            Resource::new(ResourceKind::Secret, manifest).immutable()
        }
        CopyMode::Mirror => Resource::new(ResourceKind::Secret, manifest),
    };
    collection.add(resource);
    collection
}
