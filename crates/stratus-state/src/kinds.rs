//! Catalogue of the Kubernetes kinds the controller watches.

use std::fmt;
use std::str::FromStr;

use crate::error::StateError;

/// Declares `ResourceKind` together with its API coordinates.
///
/// Each row is `Variant => (group, version, kind, plural, namespaced)`.
macro_rules! resource_kinds {
    ($($variant:ident => ($group:literal, $version:literal, $kind:literal, $plural:literal, $namespaced:literal)),+ $(,)?) => {
        /// A watched Kubernetes kind.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum ResourceKind {
            $($variant),+
        }

        impl ResourceKind {
            /// Every watched kind, in declaration order.
            pub const ALL: &'static [ResourceKind] = &[$(ResourceKind::$variant),+];

            /// API group (`""` for the core group).
            pub fn group(self) -> &'static str {
                match self {
                    $(ResourceKind::$variant => $group),+
                }
            }

            pub fn version(self) -> &'static str {
                match self {
                    $(ResourceKind::$variant => $version),+
                }
            }

            /// The `kind` field of manifests of this type.
            pub fn kind(self) -> &'static str {
                match self {
                    $(ResourceKind::$variant => $kind),+
                }
            }

            pub fn plural(self) -> &'static str {
                match self {
                    $(ResourceKind::$variant => $plural),+
                }
            }

            pub fn namespaced(self) -> bool {
                match self {
                    $(ResourceKind::$variant => $namespaced),+
                }
            }
        }
    };
}

resource_kinds! {
    Node => ("", "v1", "Node", "nodes", false),
    Namespace => ("", "v1", "Namespace", "namespaces", false),
    ConfigMap => ("", "v1", "ConfigMap", "configmaps", true),
    Secret => ("", "v1", "Secret", "secrets", true),
    Service => ("", "v1", "Service", "services", true),
    ServiceAccount => ("", "v1", "ServiceAccount", "serviceaccounts", true),
    PersistentVolume => ("", "v1", "PersistentVolume", "persistentvolumes", false),
    PersistentVolumeClaim => ("", "v1", "PersistentVolumeClaim", "persistentvolumeclaims", true),
    Deployment => ("apps", "v1", "Deployment", "deployments", true),
    DaemonSet => ("apps", "v1", "DaemonSet", "daemonsets", true),
    StatefulSet => ("apps", "v1", "StatefulSet", "statefulsets", true),
    Role => ("rbac.authorization.k8s.io", "v1", "Role", "roles", true),
    RoleBinding => ("rbac.authorization.k8s.io", "v1", "RoleBinding", "rolebindings", true),
    ClusterRole => ("rbac.authorization.k8s.io", "v1", "ClusterRole", "clusterroles", false),
    ClusterRoleBinding => ("rbac.authorization.k8s.io", "v1", "ClusterRoleBinding", "clusterrolebindings", false),
    StorageClass => ("storage.k8s.io", "v1", "StorageClass", "storageclasses", false),
    Ingress => ("networking.k8s.io", "v1", "Ingress", "ingresses", true),
    CustomResourceDefinition => ("apiextensions.k8s.io", "v1", "CustomResourceDefinition", "customresourcedefinitions", false),
    ApiService => ("apiregistration.k8s.io", "v1", "APIService", "apiservices", false),
    Alertmanager => ("monitoring.coreos.com", "v1", "Alertmanager", "alertmanagers", true),
    PodMonitor => ("monitoring.coreos.com", "v1", "PodMonitor", "podmonitors", true),
    Prometheus => ("monitoring.coreos.com", "v1", "Prometheus", "prometheuses", true),
    PrometheusRule => ("monitoring.coreos.com", "v1", "PrometheusRule", "prometheusrules", true),
    ServiceMonitor => ("monitoring.coreos.com", "v1", "ServiceMonitor", "servicemonitors", true),
    Certificate => ("cert-manager.io", "v1", "Certificate", "certificates", true),
    CertificateRequest => ("cert-manager.io", "v1", "CertificateRequest", "certificaterequests", true),
    Issuer => ("cert-manager.io", "v1", "Issuer", "issuers", true),
    ClusterIssuer => ("cert-manager.io", "v1", "ClusterIssuer", "clusterissuers", false),
}

impl ResourceKind {
    /// `apiVersion` field of manifests of this type.
    pub fn api_version(self) -> String {
        if self.group().is_empty() {
            self.version().to_string()
        } else {
            format!("{}/{}", self.group(), self.version())
        }
    }

    /// Look a kind up by its `apiVersion` + `kind` manifest fields.
    pub fn from_manifest_type(api_version: &str, kind: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.kind() == kind && k.api_version() == api_version)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

impl FromStr for ResourceKind {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.kind().eq_ignore_ascii_case(s))
            .ok_or_else(|| StateError::UnknownKind(s.to_string()))
    }
}
