//! Tenant reconciler: keeps one database and one user per tenant in
//! ClickHouse, and removes tenant-owned ones nobody claims anymore.
//!
//! ```text
//!   State ──► plan() ──► [grant repair] [create db] [create user, grant] [drop user] [drop db]
//!                                    │
//!                                    ▼  strictly sequential, failures skipped
//!                             ClickHouseClient::query
//! ```

use std::collections::HashSet;
use std::time::Duration;

use stratus_core::naming::{CLICKHOUSE_TENANT_PREFIX, clickhouse_id};
use stratus_state::{ClickHouseTable, State, StateStore};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::client::ClickHouseClient;
use crate::statement::Statement;

/// Period between the end of one tick and the start of the next.
pub const TICK_INTERVAL: Duration = Duration::from_secs(5);

/// Statements needed to converge ClickHouse on `state`, in execution order.
///
/// Returns `None` when the tick must be skipped: no tenants yet, or either
/// ClickHouse cache has not completed a first listing. Acting on such a
/// read could drop every tenant's data.
pub fn plan(state: &State, repair_grants: bool) -> Option<Vec<Statement>> {
    let tenants = state.tenants();
    let databases = state.clickhouse(ClickHouseTable::Databases);
    let users = state.clickhouse(ClickHouseTable::Users);
    if tenants.is_empty() || !databases.is_loaded() || !users.is_loaded() {
        return None;
    }

    let expected: Vec<String> = tenants.iter().map(clickhouse_id).collect();
    let expected_set: HashSet<&str> = expected.iter().map(String::as_str).collect();
    let existing_dbs: HashSet<&str> = databases.resources().iter().map(String::as_str).collect();
    let existing_users: HashSet<&str> = users.resources().iter().map(String::as_str).collect();

    let mut statements = Vec::new();

    if repair_grants {
        statements.extend(expected.iter().cloned().map(Statement::Grant));
    }

    statements.extend(
        expected
            .iter()
            .filter(|id| !existing_dbs.contains(id.as_str()))
            .cloned()
            .map(Statement::CreateDatabase),
    );

    for id in expected.iter().filter(|id| !existing_users.contains(id.as_str())) {
        statements.push(Statement::CreateUser(id.clone()));
        statements.push(Statement::Grant(id.clone()));
    }

    let orphaned = |name: &&String| {
        name.starts_with(CLICKHOUSE_TENANT_PREFIX) && !expected_set.contains(name.as_str())
    };
    statements.extend(
        users
            .resources()
            .iter()
            .filter(orphaned)
            .cloned()
            .map(Statement::DropUser),
    );
    statements.extend(
        databases
            .resources()
            .iter()
            .filter(orphaned)
            .cloned()
            .map(Statement::DropDatabase),
    );

    Some(statements)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Skipped,
    Executed { applied: usize, failed: usize },
}

pub struct TenantReconciler<C> {
    client: C,
    grants_repaired: bool,
}

impl<C: ClickHouseClient> TenantReconciler<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            grants_repaired: false,
        }
    }

    /// Run one reconciliation pass against `state`.
    ///
    /// Grants are re-issued for every tenant on the first tick that is not
    /// skipped, covering users created by a process that died before its
    /// `GRANT` ran.
    pub async fn tick(&mut self, state: &State) -> TickOutcome {
        let Some(statements) = plan(state, !self.grants_repaired) else {
            debug!(tenants = state.tenants().len(), "clickhouse tick skipped");
            return TickOutcome::Skipped;
        };
        self.grants_repaired = true;

        let mut applied = 0;
        let mut failed = 0;
        for statement in &statements {
            match self.client.query(&statement.sql()).await {
                Ok(_) => {
                    applied += 1;
                    debug!(%statement, "clickhouse statement applied");
                }
                Err(e) => {
                    failed += 1;
                    warn!(%statement, error = %e, "clickhouse statement failed");
                }
            }
        }

        if !statements.is_empty() {
            info!(applied, failed, "clickhouse tenants reconciled");
        }
        TickOutcome::Executed { applied, failed }
    }
}

/// The reconciler loop. With no client configured, logs once and returns
/// `Ok(())` so the supervisor does not restart it.
pub async fn run<C: ClickHouseClient>(
    client: Option<C>,
    store: StateStore,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let Some(client) = client else {
        warn!("clickhouse endpoint not configured, tenant reconciler disabled");
        return Ok(());
    };

    let mut reconciler = TenantReconciler::new(client);
    loop {
        reconciler.tick(&store.snapshot()).await;

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.changed() => {
                debug!("clickhouse reconciler shutting down");
                return Ok(());
            }
        }
    }
}
