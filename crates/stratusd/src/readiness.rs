//! Rollout progress reporter.
//!
//! Reads the Deployment, DaemonSet, StatefulSet and Certificate caches
//! from the latest snapshot and logs how many of each are still rolling
//! out, whenever one of those counts changes. Once nothing has been rolling
//! out for [`SETTLE_PERIOD`] the cluster is reported ready.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::Value;
use stratus_state::{KubeObject, ResourceKind, State, StateStore};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info};

pub const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Quiet time after the last rollout before the cluster counts as ready.
pub const SETTLE_PERIOD: Duration = Duration::from_secs(10);

/// Kinds whose rollouts are tracked.
pub const TRACKED: [ResourceKind; 4] = [
    ResourceKind::Deployment,
    ResourceKind::DaemonSet,
    ResourceKind::StatefulSet,
    ResourceKind::Certificate,
];

/// Names are only listed while few objects are left.
const LIST_BELOW: usize = 3;

// ── Rollout status ─────────────────────────────────────────────

fn int(raw: &Value, pointer: &str) -> Option<i64> {
    raw.pointer(pointer).and_then(Value::as_i64)
}

fn generation_pending(raw: &Value) -> bool {
    let generation = int(raw, "/metadata/generation").unwrap_or(0);
    let observed = int(raw, "/status/observedGeneration").unwrap_or(0);
    generation > observed
}

fn deployment_status(raw: &Value) -> Option<String> {
    if generation_pending(raw) {
        return Some("waiting for spec update to be observed".into());
    }
    let want = int(raw, "/spec/replicas").unwrap_or(1);
    let replicas = int(raw, "/status/replicas").unwrap_or(0);
    let updated = int(raw, "/status/updatedReplicas").unwrap_or(0);
    let available = int(raw, "/status/availableReplicas").unwrap_or(0);

    if updated < want {
        Some(format!("{updated} of {want} updated replicas"))
    } else if replicas > updated {
        Some(format!("{} old replicas pending termination", replicas - updated))
    } else if available < updated {
        Some(format!("{available} of {updated} updated replicas available"))
    } else {
        None
    }
}

fn daemon_set_status(raw: &Value) -> Option<String> {
    if generation_pending(raw) {
        return Some("waiting for spec update to be observed".into());
    }
    let desired = int(raw, "/status/desiredNumberScheduled").unwrap_or(0);
    let updated = int(raw, "/status/updatedNumberScheduled").unwrap_or(0);
    let available = int(raw, "/status/numberAvailable").unwrap_or(0);

    if updated < desired {
        Some(format!("{updated} of {desired} updated pods scheduled"))
    } else if available < desired {
        Some(format!("{available} of {desired} updated pods available"))
    } else {
        None
    }
}

fn stateful_set_status(raw: &Value) -> Option<String> {
    if generation_pending(raw) {
        return Some("waiting for spec update to be observed".into());
    }
    let want = int(raw, "/spec/replicas").unwrap_or(1);
    let ready = int(raw, "/status/readyReplicas").unwrap_or(0);
    if ready < want {
        return Some(format!("{ready} of {want} pods ready"));
    }

    let rolling = raw
        .pointer("/spec/updateStrategy/type")
        .and_then(Value::as_str)
        .is_none_or(|t| t == "RollingUpdate");
    let current = raw.pointer("/status/currentRevision").and_then(Value::as_str);
    let update = raw.pointer("/status/updateRevision").and_then(Value::as_str);
    (rolling && current != update).then(|| "waiting for rolling update to complete".into())
}

fn certificate_status(raw: &Value) -> Option<String> {
    let conditions = raw
        .pointer("/status/conditions")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let ready = conditions.iter().find(|c| c["type"] == "Ready");
    match ready {
        Some(c) if c["status"] == "True" => None,
        Some(c) => Some(format!("not ready: {}", c["message"].as_str().unwrap_or("no message"))),
        None => Some("not issued yet".into()),
    }
}

/// Why `object` is still rolling out, or `None` once it has settled.
pub fn rollout_message(kind: ResourceKind, object: &KubeObject) -> Option<String> {
    let raw = object.raw();
    let status = match kind {
        ResourceKind::Deployment => deployment_status(raw),
        ResourceKind::DaemonSet => daemon_set_status(raw),
        ResourceKind::StatefulSet => stateful_set_status(raw),
        ResourceKind::Certificate => certificate_status(raw),
        _ => None,
    }?;
    Some(format!("{kind} {}: {status}", object.key()))
}

/// Objects still rolling out, per tracked kind, sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pending(BTreeMap<ResourceKind, Vec<String>>);

impl Pending {
    pub fn from_state(state: &State) -> Self {
        Self(
            TRACKED
                .iter()
                .map(|&kind| {
                    let mut messages: Vec<String> = state
                        .cache(kind)
                        .resources()
                        .iter()
                        .filter_map(|o| rollout_message(kind, o))
                        .collect();
                    messages.sort();
                    (kind, messages)
                })
                .collect(),
        )
    }

    pub fn messages(&self, kind: ResourceKind) -> &[String] {
        self.0.get(&kind).map_or(&[], Vec::as_slice)
    }

    pub fn count(&self, kind: ResourceKind) -> usize {
        self.messages(kind).len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }
}

// ── Reporter ───────────────────────────────────────────────────

/// A tracked kind whose number of active rollouts changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Change {
    pub kind: ResourceKind,
    pub active: usize,
}

#[derive(Debug, Default)]
pub struct Reporter {
    last: Option<Pending>,
    idle_since: Option<Instant>,
    ready: bool,
}

impl Reporter {
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Compare `state` with the previous observation and log what changed.
    pub fn observe(&mut self, state: &State, now: Instant) -> Vec<Change> {
        if TRACKED.iter().all(|&k| state.cache(k).resources().is_empty()) {
            debug!("no workloads cached yet, nothing to report");
            return Vec::new();
        }

        let pending = Pending::from_state(state);
        let changes: Vec<Change> = TRACKED
            .iter()
            .filter(|&&kind| {
                self.last
                    .as_ref()
                    .is_none_or(|last| last.count(kind) != pending.count(kind))
            })
            .map(|&kind| Change {
                kind,
                active: pending.count(kind),
            })
            .collect();

        for change in &changes {
            info!(kind = %change.kind, active = change.active, "waiting for active rollouts");
            let messages = pending.messages(change.kind);
            if messages.len() < LIST_BELOW {
                for message in messages {
                    debug!("    {message}");
                }
            }
        }

        if pending.is_empty() {
            self.idle_since.get_or_insert(now);
        } else {
            self.idle_since = None;
        }
        let ready = self
            .idle_since
            .is_some_and(|since| now.duration_since(since) >= SETTLE_PERIOD);
        if ready != self.ready {
            if ready {
                info!(settled_for = ?SETTLE_PERIOD, "all rollouts complete");
            } else {
                info!("rollouts in progress again");
            }
            self.ready = ready;
        }

        self.last = Some(pending);
        changes
    }
}

/// Report rollout progress every `interval` until shutdown.
pub async fn run(
    store: StateStore,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let mut reporter = Reporter::default();
    loop {
        reporter.observe(&store.snapshot(), Instant::now());

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.changed() => {
                debug!("readiness reporter shutting down");
                return Ok(());
            }
        }
    }
}
