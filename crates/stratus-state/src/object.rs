//! Cached Kubernetes objects.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{StateError, StateResult};

/// A Kubernetes object as seen by a watch, kept as raw JSON.
///
/// The name and namespace are lifted out at ingest time because every
/// lookup keys on them.
#[derive(Debug, Clone, PartialEq)]
pub struct KubeObject {
    name: String,
    namespace: Option<String>,
    raw: Value,
}

impl KubeObject {
    /// Wrap a raw object, requiring `metadata.name`.
    pub fn from_value(raw: Value) -> StateResult<Self> {
        if !raw.is_object() {
            return Err(StateError::NotAnObject);
        }
        let metadata = raw.get("metadata");
        let name = metadata
            .and_then(|m| m.get("name"))
            .and_then(Value::as_str)
            .ok_or(StateError::MissingName)?
            .to_string();
        let namespace = metadata
            .and_then(|m| m.get("namespace"))
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(Self {
            name,
            namespace,
            raw,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// `metadata.labels`, empty when absent.
    pub fn labels(&self) -> BTreeMap<String, String> {
        string_map(self.raw.pointer("/metadata/labels"))
    }

    /// Top-level `data` map (ConfigMaps and Secrets), empty when absent.
    ///
    /// Secret values stay base64-encoded exactly as the API returned them.
    pub fn data(&self) -> BTreeMap<String, String> {
        string_map(self.raw.get("data"))
    }

    /// Top-level `type` field (Secrets).
    pub fn type_field(&self) -> Option<&str> {
        self.raw.get("type").and_then(Value::as_str)
    }

    /// Cache key, `{namespace}/{name}` or just `{name}` when cluster-scoped.
    pub fn key(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}/{}", self.name),
            None => self.name.clone(),
        }
    }
}

fn string_map(value: Option<&Value>) -> BTreeMap<String, String> {
    value
        .and_then(Value::as_object)
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lifts_name_and_namespace() {
        let obj = KubeObject::from_value(json!({
            "metadata": {"name": "creds", "namespace": "kube-system", "labels": {"a": "b"}},
            "type": "kubernetes.io/dockerconfigjson",
            "data": {".dockerconfigjson": "e30="}
        }))
        .unwrap();

        assert_eq!(obj.name(), "creds");
        assert_eq!(obj.namespace(), Some("kube-system"));
        assert_eq!(obj.key(), "kube-system/creds");
        assert_eq!(obj.labels().get("a").map(String::as_str), Some("b"));
        assert_eq!(obj.data().get(".dockerconfigjson").map(String::as_str), Some("e30="));
        assert_eq!(obj.type_field(), Some("kubernetes.io/dockerconfigjson"));
    }

    #[test]
    fn cluster_scoped_key_is_name() {
        let obj = KubeObject::from_value(json!({"metadata": {"name": "node-1"}})).unwrap();
        assert_eq!(obj.key(), "node-1");
        assert!(obj.data().is_empty());
    }

    #[test]
    fn rejects_nameless_objects() {
        assert!(matches!(
            KubeObject::from_value(json!({"metadata": {}})),
            Err(StateError::MissingName)
        ));
        assert!(matches!(
            KubeObject::from_value(json!("nope")),
            Err(StateError::NotAnObject)
        ));
    }
}
