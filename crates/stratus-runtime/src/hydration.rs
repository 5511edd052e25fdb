//! Cache hydration gate.

use std::time::Duration;

use stratus_state::{ResourceKind, StateStore};
use tracing::info;

/// How often the gate re-reads the state while waiting.
pub const HYDRATION_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Wait until every kind in `required` has completed a first listing.
///
/// There is no timeout: a cache that never hydrates blocks the caller
/// forever, logging the missing kinds on every poll.
pub async fn block_until_hydrated(store: &StateStore, required: &[ResourceKind], interval: Duration) {
    loop {
        let missing = store.snapshot().unhydrated(required);
        if missing.is_empty() {
            info!(kinds = required.len(), "caches hydrated");
            return;
        }

        let missing = missing
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        info!(%missing, "waiting for caches to hydrate");
        tokio::time::sleep(interval).await;
    }
}
