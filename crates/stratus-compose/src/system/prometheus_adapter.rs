//! prometheus-adapter serves `metrics.k8s.io` from the system Prometheus,
//! which backs `kubectl top` and CPU/memory based autoscaling.

use serde_json::{Value, json};
use stratus_state::{ResourceKind, State};

use crate::cluster::with_pull_secrets;
use crate::collection::{Resource, ResourceCollection};
use crate::images;

const NAME: &str = "prometheus-adapter";
const CONFIG: &str = "adapter-config";
const API_SERVICE: &str = "v1beta1.metrics.k8s.io";

pub(super) fn resources(state: &State, namespace: &str) -> ResourceCollection {
    let mut collection = ResourceCollection::new();
    let subject = json!([{"kind": "ServiceAccount", "name": NAME, "namespace": namespace}]);

    collection.add(Resource::new(
        ResourceKind::ServiceAccount,
        json!({"metadata": {"name": NAME, "namespace": namespace}}),
    ));
    collection.add(Resource::new(
        ResourceKind::ClusterRole,
        json!({
            "metadata": {"name": NAME},
            "rules": [{
                "apiGroups": [""],
                "resources": ["nodes", "namespaces", "pods", "services"],
                "verbs": ["get", "list", "watch"],
            }],
        }),
    ));
    collection.add(Resource::new(
        ResourceKind::ClusterRole,
        json!({
            "metadata": {
                "name": "system:aggregated-metrics-reader",
                "labels": {
                    "rbac.authorization.k8s.io/aggregate-to-admin": "true",
                    "rbac.authorization.k8s.io/aggregate-to-edit": "true",
                    "rbac.authorization.k8s.io/aggregate-to-view": "true",
                },
            },
            "rules": [{
                "apiGroups": ["metrics.k8s.io"],
                "resources": ["pods", "nodes"],
                "verbs": ["get", "list", "watch"],
            }],
        }),
    ));

    for (binding, role) in [
        (NAME, NAME),
        ("resource-metrics:system:auth-delegator", "system:auth-delegator"),
    ] {
        collection.add(Resource::new(
            ResourceKind::ClusterRoleBinding,
            json!({
                "metadata": {"name": binding},
                "roleRef": {"apiGroup": "rbac.authorization.k8s.io", "kind": "ClusterRole", "name": role},
                "subjects": subject,
            }),
        ));
    }
    collection.add(Resource::new(
        ResourceKind::RoleBinding,
        json!({
            "metadata": {"name": "resource-metrics-auth-reader", "namespace": "kube-system"},
            "roleRef": {
                "apiGroup": "rbac.authorization.k8s.io",
                "kind": "Role",
                "name": "extension-apiserver-authentication-reader",
            },
            "subjects": subject,
        }),
    ));

    collection.add(Resource::new(
        ResourceKind::ConfigMap,
        json!({
            "metadata": {"name": CONFIG, "namespace": namespace},
            "data": {"config.yaml": adapter_config().to_string()},
        }),
    ));

    collection.add(Resource::new(
        ResourceKind::Deployment,
        with_pull_secrets(state, json!({
            "metadata": {"name": NAME, "namespace": namespace, "labels": {"name": NAME}},
            "spec": {
                "replicas": 1,
                "selector": {"matchLabels": {"name": NAME}},
                "strategy": {"rollingUpdate": {"maxSurge": 1, "maxUnavailable": 0}},
                "template": {
                    "metadata": {"labels": {"name": NAME}},
                    "spec": {
                        "serviceAccountName": NAME,
                        "nodeSelector": {"kubernetes.io/os": "linux"},
                        "containers": [{
                            "name": NAME,
                            "image": images::PROMETHEUS_ADAPTER,
                            "args": [
                                "--cert-dir=/var/run/serving-cert",
                                "--config=/etc/adapter/config.yaml",
                                "--logtostderr=true",
                                "--metrics-relist-interval=1m",
                                format!("--prometheus-url=http://prometheus.{namespace}.svc.cluster.local:9090/"),
                                "--secure-port=6443",
                            ],
                            "ports": [{"containerPort": 6443}],
                            "volumeMounts": [
                                {"mountPath": "/tmp", "name": "tmpfs"},
                                {"mountPath": "/var/run/serving-cert", "name": "volume-serving-cert"},
                                {"mountPath": "/etc/adapter", "name": "config"},
                            ],
                        }],
                        "volumes": [
                            {"name": "tmpfs", "emptyDir": {}},
                            {"name": "volume-serving-cert", "emptyDir": {}},
                            {"name": "config", "configMap": {"name": CONFIG}},
                        ],
                    },
                },
            },
        })),
    ));

    collection.add(Resource::new(
        ResourceKind::Service,
        json!({
            "metadata": {"name": NAME, "namespace": namespace, "labels": {"name": NAME}},
            "spec": {
                "ports": [{"name": "https", "port": 443, "targetPort": 6443}],
                "selector": {"name": NAME},
            },
        }),
    ));
    collection.add(Resource::new(
        ResourceKind::ApiService,
        json!({
            "metadata": {"name": API_SERVICE},
            "spec": {
                "group": "metrics.k8s.io",
                "version": "v1beta1",
                "groupPriorityMinimum": 100,
                "versionPriority": 100,
                "insecureSkipTLSVerify": true,
                "service": {"name": NAME, "namespace": namespace},
            },
        }),
    ));

    collection
}

fn adapter_config() -> Value {
    let resource_overrides = json!({
        "namespace": {"resource": "namespace"},
        "node": {"resource": "node"},
        "pod": {"resource": "pod"},
    });
    json!({
        "resourceRules": {
            "cpu": {
                "containerLabel": "container",
                "containerQuery": "sum(irate(container_cpu_usage_seconds_total{<<.LabelMatchers>>,container!=\"POD\",container!=\"\",pod!=\"\"}[5m])) by (<<.GroupBy>>)",
                "nodeQuery": "sum(1 - irate(node_cpu_seconds_total{mode=\"idle\"}[5m]) * on(namespace, pod) group_left(node) node_namespace_pod:kube_pod_info:{<<.LabelMatchers>>}) by (<<.GroupBy>>)",
                "resources": {"overrides": resource_overrides},
            },
            "memory": {
                "containerLabel": "container",
                "containerQuery": "sum(container_memory_working_set_bytes{<<.LabelMatchers>>,container!=\"POD\",container!=\"\",pod!=\"\"}) by (<<.GroupBy>>)",
                "nodeQuery": "sum(node_memory_MemTotal_bytes{job=\"node-exporter\",<<.LabelMatchers>>} - node_memory_MemAvailable_bytes{job=\"node-exporter\",<<.LabelMatchers>>}) by (<<.GroupBy>>)",
                "resources": {"overrides": resource_overrides},
            },
            "window": "5m",
        },
    })
}
