//! Pollers mirroring ClickHouse's database and user lists into the state.
//!
//! ClickHouse has no watch API, so each table is re-listed on a timer:
//! quickly while the server answers, slowly while it does not.

use std::time::Duration;

use stratus_state::{Action, CacheEvent, ClickHouseTable, StateStore};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::client::{ClickHouseClient, row_names};

/// Delay before the next listing after a successful one.
pub const POLL_INTERVAL: Duration = Duration::from_secs(3);
/// Delay before the next listing after a failed one.
pub const POLL_ERROR_INTERVAL: Duration = Duration::from_secs(15);

/// List `table` once and record the result (or the failure) in the store.
/// Returns whether the listing succeeded.
pub async fn poll_once<C: ClickHouseClient>(
    client: &C,
    store: &StateStore,
    table: ClickHouseTable,
) -> bool {
    let event = match client.query(table.list_query()).await {
        Ok(rows) => CacheEvent::List(row_names(&rows)),
        Err(e) => {
            warn!(?table, error = %e, "clickhouse listing failed");
            CacheEvent::Error(e.to_string())
        }
    };
    let ok = matches!(event, CacheEvent::List(_));
    store.dispatch(Action::ClickHouse { table, event });
    ok
}

/// Poll `table` until shutdown. With no client configured, logs once and
/// returns, leaving the cache unloaded.
pub async fn run_poller<C: ClickHouseClient>(
    client: Option<C>,
    store: StateStore,
    table: ClickHouseTable,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let Some(client) = client else {
        warn!(?table, "clickhouse endpoint not configured, poller disabled");
        return Ok(());
    };

    loop {
        let delay = if poll_once(&client, &store, table).await {
            POLL_INTERVAL
        } else {
            POLL_ERROR_INTERVAL
        };

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => {
                debug!(?table, "clickhouse poller shutting down");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ClickHouseError, ClickHouseResult};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Answers `SHOW ...` with fixed names, or fails while `down` is set.
    #[derive(Clone, Default)]
    struct FakeServer {
        down: Arc<AtomicBool>,
        queries: Arc<AtomicUsize>,
    }

    impl ClickHouseClient for FakeServer {
        async fn query(&self, _sql: &str) -> ClickHouseResult<Vec<Value>> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            if self.down.load(Ordering::SeqCst) {
                return Err(ClickHouseError::Timeout(Duration::from_secs(10)));
            }
            Ok(vec![json!({"name": "default"}), json!({"name": "tenant_system"})])
        }
    }

    #[tokio::test]
    async fn successful_listing_hydrates_the_cache() {
        let store = StateStore::default();
        assert!(poll_once(&FakeServer::default(), &store, ClickHouseTable::Users).await);

        let state = store.snapshot();
        let users = state.clickhouse(ClickHouseTable::Users);
        assert!(users.is_loaded());
        assert_eq!(users.resources(), ["default", "tenant_system"]);
        assert!(!state.clickhouse(ClickHouseTable::Databases).is_loaded());
    }

    #[tokio::test]
    async fn failed_listing_keeps_previous_names() {
        let server = FakeServer::default();
        let store = StateStore::default();
        poll_once(&server, &store, ClickHouseTable::Databases).await;

        server.down.store(true, Ordering::SeqCst);
        assert!(!poll_once(&server, &store, ClickHouseTable::Databases).await);

        let state = store.snapshot();
        let dbs = state.clickhouse(ClickHouseTable::Databases);
        assert!(dbs.is_loaded());
        assert!(dbs.error().is_some());
        assert_eq!(dbs.resources().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn poller_backs_off_while_the_server_is_down() {
        let server = FakeServer::default();
        server.down.store(true, Ordering::SeqCst);
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(run_poller(
            Some(server.clone()),
            StateStore::default(),
            ClickHouseTable::Databases,
            rx,
        ));

        // t=0 and t=15 while down.
        tokio::time::sleep(Duration::from_secs(16)).await;
        assert_eq!(server.queries.load(Ordering::SeqCst), 2);

        // Recovered at t=30, then every 3s: t=33.
        server.down.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(19)).await;
        assert_eq!(server.queries.load(Ordering::SeqCst), 4);

        tx.send(true).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn disabled_poller_returns_immediately() {
        let (_tx, rx) = watch::channel(false);
        run_poller::<FakeServer>(None, StateStore::default(), ClickHouseTable::Users, rx)
            .await
            .unwrap();
    }
}
