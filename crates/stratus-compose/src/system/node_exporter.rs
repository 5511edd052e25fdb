use serde_json::json;
use stratus_core::Tenant;
use stratus_state::{ResourceKind, State};

use super::rbac_proxy;
use crate::cluster::with_pull_secrets;
use crate::collection::{Resource, ResourceCollection};
use crate::images;

const NAME: &str = "node-exporter";
const PORT: u16 = 9100;

const IGNORED_MOUNTS: &str = "^/(dev|proc|sys|var/lib/docker/.+)($|/)";
const IGNORED_FS_TYPES: &str = "^(autofs|binfmt_misc|cgroup|configfs|debugfs|devpts|devtmpfs|fusectl|hugetlbfs|mqueue|overlay|proc|procfs|pstore|rpc_pipefs|securityfs|sysfs|tracefs)$";

/// One exporter per node on the host network; the metrics port is only
/// reachable through the TLS proxy sidecar.
pub(super) fn resources(state: &State, tenant: &Tenant, namespace: &str) -> ResourceCollection {
    let mut collection = ResourceCollection::new();

    collection.add(Resource::new(
        ResourceKind::ServiceAccount,
        json!({"metadata": {"name": NAME, "namespace": namespace}}),
    ));
    collection.add(Resource::new(
        ResourceKind::ClusterRole,
        json!({
            "metadata": {"name": NAME},
            "rules": [
                {"apiGroups": ["authentication.k8s.io"], "resources": ["tokenreviews"], "verbs": ["create"]},
                {"apiGroups": ["authorization.k8s.io"], "resources": ["subjectaccessreviews"], "verbs": ["create"]},
            ],
        }),
    ));
    collection.add(Resource::new(
        ResourceKind::ClusterRoleBinding,
        json!({
            "metadata": {"name": NAME},
            "roleRef": {"apiGroup": "rbac.authorization.k8s.io", "kind": "ClusterRole", "name": NAME},
            "subjects": [{"kind": "ServiceAccount", "name": NAME, "namespace": namespace}],
        }),
    ));

    let mut proxy = rbac_proxy(
        "kube-rbac-proxy",
        "https",
        &format!("$(IP):{PORT}"),
        PORT,
        &format!("http://127.0.0.1:{PORT}/"),
    );
    proxy["ports"][0]["hostPort"] = json!(PORT);
    proxy["env"] = json!([{"name": "IP", "valueFrom": {"fieldRef": {"fieldPath": "status.podIP"}}}]);

    collection.add(Resource::new(
        ResourceKind::DaemonSet,
        with_pull_secrets(state, json!({
            "metadata": {"name": NAME, "namespace": namespace, "labels": {"app": NAME}},
            "spec": {
                "selector": {"matchLabels": {"app": NAME}},
                "template": {
                    "metadata": {"labels": {"app": NAME}},
                    "spec": {
                        "serviceAccountName": NAME,
                        "hostNetwork": true,
                        "hostPID": true,
                        "nodeSelector": {"kubernetes.io/os": "linux"},
                        "securityContext": {"runAsNonRoot": true, "runAsUser": 65534},
                        "tolerations": [{"operator": "Exists"}],
                        "containers": [
                            {
                                "name": NAME,
                                "image": images::NODE_EXPORTER,
                                "args": [
                                    format!("--web.listen-address=127.0.0.1:{PORT}"),
                                    "--path.procfs=/host/proc",
                                    "--path.sysfs=/host/sys",
                                    "--path.rootfs=/host/root",
                                    format!("--collector.filesystem.ignored-mount-points={IGNORED_MOUNTS}"),
                                    format!("--collector.filesystem.ignored-fs-types={IGNORED_FS_TYPES}"),
                                ],
                                "resources": {
                                    "limits": {"cpu": "250m", "memory": "180Mi"},
                                    "requests": {"cpu": "102m", "memory": "180Mi"},
                                },
                                "volumeMounts": [
                                    {"mountPath": "/host/proc", "name": "proc"},
                                    {"mountPath": "/host/sys", "name": "sys"},
                                    {"mountPath": "/host/root", "mountPropagation": "HostToContainer", "name": "root", "readOnly": true},
                                ],
                            },
                            proxy,
                        ],
                        "volumes": [
                            {"name": "proc", "hostPath": {"path": "/proc"}},
                            {"name": "sys", "hostPath": {"path": "/sys"}},
                            {"name": "root", "hostPath": {"path": "/"}},
                        ],
                    },
                },
            },
        })),
    ));

    collection.add(Resource::new(
        ResourceKind::Service,
        json!({
            "metadata": {"name": NAME, "namespace": namespace, "labels": {"k8s-app": NAME}},
            "spec": {
                "clusterIP": "None",
                "ports": [{"name": "https", "port": PORT, "targetPort": "https"}],
                "selector": {"app": NAME},
            },
        }),
    ));
    collection.add(Resource::new(
        ResourceKind::ServiceMonitor,
        json!({
            "metadata": {
                "name": NAME,
                "namespace": namespace,
                "labels": {"k8s-app": NAME, "tenant": tenant.name},
            },
            "spec": {
                "jobLabel": "k8s-app",
                "endpoints": [{
                    "bearerTokenFile": "/var/run/secrets/kubernetes.io/serviceaccount/token",
                    "interval": "30s",
                    "port": "https",
                    "scheme": "https",
                    "relabelings": [{
                        "action": "replace",
                        "regex": "(.*)",
                        "replacement": "$1",
                        "sourceLabels": ["__meta_kubernetes_pod_node_name"],
                        "targetLabel": "instance",
                    }],
                    "tlsConfig": {"insecureSkipVerify": true},
                }],
                "selector": {"matchLabels": {"k8s-app": NAME}},
            },
        }),
    ));

    collection
}
