//! Container images referenced by composed workloads.

pub const GRAFANA: &str = "grafana/grafana:7.3.5";
pub const POSTGRES_CLIENT: &str = "postgres:13-alpine";
pub const KUBE_STATE_METRICS: &str = "quay.io/coreos/kube-state-metrics:v1.9.7";
pub const KUBE_RBAC_PROXY: &str = "quay.io/brancz/kube-rbac-proxy:v0.8.0";
pub const NODE_EXPORTER: &str = "quay.io/prometheus/node-exporter:v1.0.1";
pub const PROMETHEUS_ADAPTER: &str = "directxman12/k8s-prometheus-adapter:v0.8.2";
pub const LOCAL_VOLUME_PROVISIONER: &str =
    "quay.io/external_storage/local-volume-provisioner:v2.3.4";

/// TLS cipher suites every kube-rbac-proxy sidecar is restricted to.
pub const RBAC_PROXY_CIPHERS: &str = "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,TLS_RSA_WITH_AES_128_CBC_SHA256,TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA256,TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256";
