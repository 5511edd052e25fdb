use serde_json::json;
use stratus_core::Tenant;
use stratus_state::{ResourceKind, State};

use super::rbac_proxy;
use crate::cluster::with_pull_secrets;
use crate::collection::{Resource, ResourceCollection};
use crate::images;

const NAME: &str = "kube-state-metrics";

/// API objects kube-state-metrics reports on, grouped by API group.
const WATCHED: &[(&str, &[&str])] = &[
    (
        "",
        &[
            "configmaps",
            "secrets",
            "nodes",
            "pods",
            "services",
            "resourcequotas",
            "replicationcontrollers",
            "limitranges",
            "persistentvolumeclaims",
            "persistentvolumes",
            "namespaces",
            "endpoints",
        ],
    ),
    ("apps", &["statefulsets", "daemonsets", "deployments", "replicasets"]),
    ("batch", &["cronjobs", "jobs"]),
    ("autoscaling", &["horizontalpodautoscalers"]),
    ("policy", &["poddisruptionbudgets"]),
    ("certificates.k8s.io", &["certificatesigningrequests"]),
    ("storage.k8s.io", &["storageclasses", "volumeattachments"]),
    ("networking.k8s.io", &["networkpolicies", "ingresses"]),
];

pub(super) fn resources(state: &State, tenant: &Tenant, namespace: &str) -> ResourceCollection {
    let mut collection = ResourceCollection::new();

    collection.add(Resource::new(
        ResourceKind::ServiceAccount,
        json!({"metadata": {"name": NAME, "namespace": namespace}}),
    ));

    let mut rules: Vec<_> = WATCHED
        .iter()
        .map(|(group, resources)| json!({"apiGroups": [group], "resources": resources, "verbs": ["list", "watch"]}))
        .collect();
    rules.push(json!({"apiGroups": ["authentication.k8s.io"], "resources": ["tokenreviews"], "verbs": ["create"]}));
    rules.push(json!({"apiGroups": ["authorization.k8s.io"], "resources": ["subjectaccessreviews"], "verbs": ["create"]}));
    collection.add(Resource::new(
        ResourceKind::ClusterRole,
        json!({"metadata": {"name": NAME}, "rules": rules}),
    ));
    collection.add(Resource::new(
        ResourceKind::ClusterRoleBinding,
        json!({
            "metadata": {"name": NAME},
            "roleRef": {"apiGroup": "rbac.authorization.k8s.io", "kind": "ClusterRole", "name": NAME},
            "subjects": [{"kind": "ServiceAccount", "name": NAME, "namespace": namespace}],
        }),
    ));

    collection.add(Resource::new(
        ResourceKind::Deployment,
        with_pull_secrets(state, json!({
            "metadata": {"name": NAME, "namespace": namespace, "labels": {"app": NAME}},
            "spec": {
                "replicas": 1,
                "selector": {"matchLabels": {"app": NAME}},
                "template": {
                    "metadata": {"labels": {"app": NAME}},
                    "spec": {
                        "serviceAccountName": NAME,
                        "nodeSelector": {"kubernetes.io/os": "linux"},
                        "securityContext": {"runAsNonRoot": true, "runAsUser": 65534},
                        "containers": [
                            rbac_proxy("kube-rbac-proxy-main", "https-main", ":8443", 8443, "http://127.0.0.1:8081/"),
                            rbac_proxy("kube-rbac-proxy-self", "https-self", ":9443", 9443, "http://127.0.0.1:8082/"),
                            {
                                "name": NAME,
                                "image": images::KUBE_STATE_METRICS,
                                "args": ["--host=127.0.0.1", "--port=8081", "--telemetry-host=127.0.0.1", "--telemetry-port=8082"],
                                "resources": {
                                    "limits": {"cpu": "100m", "memory": "150Mi"},
                                    "requests": {"cpu": "100m", "memory": "150Mi"},
                                },
                            },
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
                "ports": [
                    {"name": "https-main", "port": 8443, "targetPort": "https-main"},
                    {"name": "https-self", "port": 9443, "targetPort": "https-self"},
                ],
                "selector": {"app": NAME},
            },
        }),
    ));

    let endpoint = |port: &str, honor_labels: bool| {
        json!({
            "bearerTokenFile": "/var/run/secrets/kubernetes.io/serviceaccount/token",
            "honorLabels": honor_labels,
            "interval": "30s",
            "port": port,
            "scheme": "https",
            "scrapeTimeout": "30s",
            "tlsConfig": {"insecureSkipVerify": true},
        })
    };
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
                "endpoints": [endpoint("https-main", true), endpoint("https-self", false)],
                "selector": {"matchLabels": {"k8s-app": NAME}},
            },
        }),
    ));

    collection
}
