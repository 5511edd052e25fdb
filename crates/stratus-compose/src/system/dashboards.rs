//! Dashboards bundled with the system tenant's Grafana.
//!
//! Each dashboard is a grid of timeseries panels, one per query, laid out
//! two per row.

use serde_json::{Value, json};

pub struct Dashboard {
    pub name: &'static str,
    pub content: Value,
}

struct Panel {
    title: &'static str,
    expr: &'static str,
    unit: &'static str,
}

const fn panel(title: &'static str, expr: &'static str, unit: &'static str) -> Panel {
    Panel { title, expr, unit }
}

const CLUSTER: &[Panel] = &[
    panel("CPU utilisation", "1 - avg(rate(node_cpu_seconds_total{mode=\"idle\"}[5m]))", "percentunit"),
    panel("Memory utilisation", "1 - sum(node_memory_MemAvailable_bytes) / sum(node_memory_MemTotal_bytes)", "percentunit"),
    panel("CPU requests committed", "sum(kube_pod_container_resource_requests_cpu_cores) / sum(kube_node_status_allocatable_cpu_cores)", "percentunit"),
    panel("Memory requests committed", "sum(kube_pod_container_resource_requests_memory_bytes) / sum(kube_node_status_allocatable_memory_bytes)", "percentunit"),
    panel("CPU usage by namespace", "sum(rate(container_cpu_usage_seconds_total{container!=\"\"}[5m])) by (namespace)", "short"),
    panel("Memory usage by namespace", "sum(container_memory_working_set_bytes{container!=\"\"}) by (namespace)", "bytes"),
];

const NODES: &[Panel] = &[
    panel("Load average", "node_load1", "short"),
    panel("Memory available", "node_memory_MemAvailable_bytes", "bytes"),
    panel("Disk I/O", "rate(node_disk_io_time_seconds_total[5m])", "percentunit"),
    panel("Filesystem available", "node_filesystem_avail_bytes{fstype!=\"\"} / node_filesystem_size_bytes{fstype!=\"\"}", "percentunit"),
    panel("Network received", "sum(rate(node_network_receive_bytes_total[3m])) by (instance)", "Bps"),
    panel("Network transmitted", "sum(rate(node_network_transmit_bytes_total[3m])) by (instance)", "Bps"),
];

const WORKLOADS: &[Panel] = &[
    panel("Pods by phase", "sum(kube_pod_status_phase) by (phase)", "short"),
    panel("Container restarts", "sum(increase(kube_pod_container_status_restarts_total[1h])) by (namespace)", "short"),
    panel("Unavailable deployment replicas", "sum(kube_deployment_status_replicas_unavailable) by (namespace, deployment)", "short"),
    panel("CPU throttling", "sum(rate(container_cpu_cfs_throttled_periods_total[5m])) by (namespace, pod)", "short"),
];

const PROMETHEUS: &[Panel] = &[
    panel("Targets up", "sum(up) by (job)", "short"),
    panel("Samples appended", "sum(rate(prometheus_tsdb_head_samples_appended_total[5m])) by (pod)", "short"),
    panel("Remote write lag", "max(prometheus_remote_storage_highest_timestamp_in_seconds) - max(prometheus_remote_storage_queue_highest_sent_timestamp_seconds)", "s"),
    panel("Rule evaluation failures", "sum(rate(prometheus_rule_evaluation_failures_total[5m])) by (pod)", "short"),
];

pub fn bundled() -> Vec<Dashboard> {
    vec![
        dashboard("cluster", "Cluster overview", CLUSTER),
        dashboard("nodes", "Nodes", NODES),
        dashboard("workloads", "Workloads", WORKLOADS),
        dashboard("prometheus", "Prometheus", PROMETHEUS),
    ]
}

fn dashboard(name: &'static str, title: &str, panels: &[Panel]) -> Dashboard {
    let panels: Vec<Value> = panels
        .iter()
        .enumerate()
        .map(|(i, p)| {
            json!({
                "id": i + 1,
                "type": "timeseries",
                "title": p.title,
                "datasource": "metrics",
                "gridPos": {"h": 8, "w": 12, "x": (i % 2) * 12, "y": (i / 2) * 8},
                "fieldConfig": {"defaults": {"unit": p.unit}},
                "targets": [{"expr": p.expr, "refId": "A"}],
            })
        })
        .collect();

    Dashboard {
        name,
        content: json!({
            "uid": format!("system-{name}"),
            "title": title,
            "tags": ["system"],
            "timezone": "utc",
            "schemaVersion": 26,
            "refresh": "30s",
            "time": {"from": "now-6h", "to": "now"},
            "panels": panels,
        }),
    }
}
