//! Static alert set loaded into the system Prometheus.

use serde_json::{Value, json};
use stratus_core::Tenant;
use stratus_state::ResourceKind;

use crate::collection::Resource;

pub const RULE_NAME: &str = "system-alerts";

const RUNBOOK_BASE: &str =
    "https://github.com/kubernetes-monitoring/kubernetes-mixin/tree/master/runbook.md#alert-name-";

pub struct AlertRule {
    pub alert: &'static str,
    pub expr: &'static str,
    pub for_duration: &'static str,
    pub severity: &'static str,
    pub summary: &'static str,
}

pub struct AlertGroup {
    pub name: &'static str,
    pub rules: &'static [AlertRule],
}

macro_rules! rule {
    ($alert:literal, $severity:literal, $for_duration:literal, $summary:literal, $expr:literal) => {
        AlertRule {
            alert: $alert,
            expr: $expr,
            for_duration: $for_duration,
            severity: $severity,
            summary: $summary,
        }
    };
}

pub const ALERT_GROUPS: &[AlertGroup] = &[
    AlertGroup {
        name: "node-exporter",
        rules: &[
            rule!(
                "NodeFilesystemSpaceFillingUp", "warning", "1h",
                "Filesystem is predicted to run out of space within the next 24 hours.",
                "(node_filesystem_avail_bytes{job=\"node-exporter\"} / node_filesystem_size_bytes{job=\"node-exporter\"} < 0.4 and predict_linear(node_filesystem_avail_bytes{job=\"node-exporter\"}[6h], 24*60*60) < 0 and node_filesystem_readonly{job=\"node-exporter\"} == 0)"
            ),
            rule!(
                "NodeFilesystemSpaceFillingUp", "critical", "1h",
                "Filesystem is predicted to run out of space within the next 4 hours.",
                "(node_filesystem_avail_bytes{job=\"node-exporter\"} / node_filesystem_size_bytes{job=\"node-exporter\"} < 0.2 and predict_linear(node_filesystem_avail_bytes{job=\"node-exporter\"}[6h], 4*60*60) < 0 and node_filesystem_readonly{job=\"node-exporter\"} == 0)"
            ),
            rule!(
                "NodeFilesystemAlmostOutOfSpace", "warning", "1h",
                "Filesystem has less than 5% space left.",
                "(node_filesystem_avail_bytes{job=\"node-exporter\"} / node_filesystem_size_bytes{job=\"node-exporter\"} * 100 < 5 and node_filesystem_readonly{job=\"node-exporter\"} == 0)"
            ),
            rule!(
                "NodeFilesystemAlmostOutOfSpace", "critical", "1h",
                "Filesystem has less than 3% space left.",
                "(node_filesystem_avail_bytes{job=\"node-exporter\"} / node_filesystem_size_bytes{job=\"node-exporter\"} * 100 < 3 and node_filesystem_readonly{job=\"node-exporter\"} == 0)"
            ),
            rule!(
                "NodeFilesystemFilesFillingUp", "warning", "1h",
                "Filesystem is predicted to run out of inodes within the next 24 hours.",
                "(node_filesystem_files_free{job=\"node-exporter\"} / node_filesystem_files{job=\"node-exporter\"} < 0.4 and predict_linear(node_filesystem_files_free{job=\"node-exporter\"}[6h], 24*60*60) < 0 and node_filesystem_readonly{job=\"node-exporter\"} == 0)"
            ),
            rule!(
                "NodeFilesystemAlmostOutOfFiles", "critical", "1h",
                "Filesystem has less than 3% inodes left.",
                "(node_filesystem_files_free{job=\"node-exporter\"} / node_filesystem_files{job=\"node-exporter\"} * 100 < 3 and node_filesystem_readonly{job=\"node-exporter\"} == 0)"
            ),
            rule!(
                "NodeNetworkReceiveErrs", "warning", "1h",
                "Network interface is reporting many receive errors.",
                "increase(node_network_receive_errs_total[2m]) > 10"
            ),
            rule!(
                "NodeNetworkTransmitErrs", "warning", "1h",
                "Network interface is reporting many transmit errors.",
                "increase(node_network_transmit_errs_total[2m]) > 10"
            ),
            rule!(
                "NodeClockNotSynchronising", "warning", "10m",
                "Clock not synchronising.",
                "min_over_time(node_timex_sync_status[5m]) == 0"
            ),
        ],
    },
    AlertGroup {
        name: "kubernetes-absent",
        rules: &[
            rule!(
                "KubeStateMetricsDown", "critical", "15m",
                "kube-state-metrics has disappeared from Prometheus target discovery.",
                "absent(up{job=\"kube-state-metrics\"} == 1)"
            ),
            rule!(
                "NodeExporterDown", "critical", "15m",
                "node-exporter has disappeared from Prometheus target discovery.",
                "absent(up{job=\"node-exporter\"} == 1)"
            ),
            rule!(
                "KubeletDown", "critical", "15m",
                "Kubelet has disappeared from Prometheus target discovery.",
                "absent(up{job=\"kubelet\"} == 1)"
            ),
        ],
    },
    AlertGroup {
        name: "kubernetes-apps",
        rules: &[
            rule!(
                "KubePodCrashLooping", "critical", "15m",
                "Pod is crash looping.",
                "rate(kube_pod_container_status_restarts_total{job=\"kube-state-metrics\"}[15m]) * 60 * 5 > 0"
            ),
            rule!(
                "KubePodNotReady", "critical", "15m",
                "Pod has been in a non-ready state for more than 15 minutes.",
                "sum by (namespace, pod) (max by(namespace, pod) (kube_pod_status_phase{job=\"kube-state-metrics\", phase=~\"Pending|Unknown\"})) > 0"
            ),
            rule!(
                "KubeDeploymentReplicasMismatch", "critical", "15m",
                "Deployment has not matched the expected number of replicas.",
                "kube_deployment_spec_replicas{job=\"kube-state-metrics\"} != kube_deployment_status_replicas_available{job=\"kube-state-metrics\"}"
            ),
            rule!(
                "KubeStatefulSetReplicasMismatch", "critical", "15m",
                "StatefulSet has not matched the expected number of replicas.",
                "kube_statefulset_status_replicas_ready{job=\"kube-state-metrics\"} != kube_statefulset_status_replicas{job=\"kube-state-metrics\"}"
            ),
            rule!(
                "KubeDaemonSetRolloutStuck", "critical", "15m",
                "DaemonSet rollout is stuck.",
                "kube_daemonset_status_number_ready{job=\"kube-state-metrics\"} / kube_daemonset_status_desired_number_scheduled{job=\"kube-state-metrics\"} < 1.00"
            ),
            rule!(
                "KubeJobFailed", "warning", "15m",
                "Job failed to complete.",
                "kube_job_failed{job=\"kube-state-metrics\"} > 0"
            ),
        ],
    },
    AlertGroup {
        name: "kubernetes-resources",
        rules: &[
            rule!(
                "KubeCPUOvercommit", "warning", "5m",
                "Cluster has overcommitted CPU resource requests.",
                "sum(kube_pod_container_resource_requests_cpu_cores) / sum(kube_node_status_allocatable_cpu_cores) > (count(kube_node_status_allocatable_cpu_cores) - 1) / count(kube_node_status_allocatable_cpu_cores)"
            ),
            rule!(
                "KubeMemoryOvercommit", "warning", "5m",
                "Cluster has overcommitted memory resource requests.",
                "sum(kube_pod_container_resource_requests_memory_bytes) / sum(kube_node_status_allocatable_memory_bytes) > (count(kube_node_status_allocatable_memory_bytes) - 1) / count(kube_node_status_allocatable_memory_bytes)"
            ),
            rule!(
                "CPUThrottlingHigh", "warning", "15m",
                "Processes experience elevated CPU throttling.",
                "sum(increase(container_cpu_cfs_throttled_periods_total{container!=\"\"}[5m])) by (container, pod, namespace) / sum(increase(container_cpu_cfs_periods_total[5m])) by (container, pod, namespace) > (25 / 100)"
            ),
        ],
    },
    AlertGroup {
        name: "kubernetes-storage",
        rules: &[
            rule!(
                "KubePersistentVolumeFillingUp", "critical", "1m",
                "PersistentVolume is filling up.",
                "kubelet_volume_stats_available_bytes{job=\"kubelet\"} / kubelet_volume_stats_capacity_bytes{job=\"kubelet\"} < 0.03"
            ),
            rule!(
                "KubePersistentVolumeErrors", "critical", "5m",
                "PersistentVolume is having issues with provisioning.",
                "kube_persistentvolume_status_phase{phase=~\"Failed|Pending\",job=\"kube-state-metrics\"} > 0"
            ),
        ],
    },
    AlertGroup {
        name: "kubernetes-system",
        rules: &[
            rule!(
                "KubeNodeNotReady", "warning", "15m",
                "Node is not ready.",
                "kube_node_status_condition{job=\"kube-state-metrics\",condition=\"Ready\",status=\"true\"} == 0"
            ),
            rule!(
                "KubeNodeUnreachable", "warning", "2m",
                "Node is unreachable.",
                "kube_node_spec_taint{job=\"kube-state-metrics\",key=\"node.kubernetes.io/unreachable\",effect=\"NoSchedule\"} == 1"
            ),
            rule!(
                "KubeClientErrors", "warning", "15m",
                "Kubernetes API server client is experiencing errors.",
                "(sum(rate(rest_client_requests_total{code=~\"5..\"}[5m])) by (instance, job) / sum(rate(rest_client_requests_total[5m])) by (instance, job)) > 0.01"
            ),
        ],
    },
    AlertGroup {
        name: "general.rules",
        rules: &[
            rule!(
                "TargetDown", "warning", "10m",
                "One or more targets are unreachable.",
                "100 * (count(up == 0) BY (job, namespace, service) / count(up) BY (job, namespace, service)) > 10"
            ),
            rule!(
                "Watchdog", "none", "0m",
                "Always firing; proves the alerting pipeline works end to end.",
                "vector(1)"
            ),
        ],
    },
];

pub fn prometheus_rule(tenant: &Tenant, namespace: &str) -> Resource {
    let groups: Vec<Value> = ALERT_GROUPS.iter().map(group_json).collect();
    Resource::new(
        ResourceKind::PrometheusRule,
        json!({
            "metadata": {
                "name": RULE_NAME,
                "namespace": namespace,
                "labels": {"tenant": tenant.name, "role": "alert-rules"},
            },
            "spec": {"groups": groups},
        }),
    )
}

fn group_json(group: &AlertGroup) -> Value {
    let rules: Vec<Value> = group
        .rules
        .iter()
        .map(|r| {
            json!({
                "alert": r.alert,
                "expr": r.expr,
                "for": r.for_duration,
                "labels": {"severity": r.severity},
                "annotations": {
                    "summary": r.summary,
                    "runbook_url": format!("{RUNBOOK_BASE}{}", r.alert.to_lowercase()),
                },
            })
        })
        .collect();
    json!({"name": group.name, "rules": rules})
}
