//! stratusd: the Stratus controller daemon.
//!
//! Converges a Kubernetes cluster and a ClickHouse server toward the
//! monitoring stack every tenant should have.
//!
//! ```text
//!  tenant feed ──► SubscriptionManager ─┐
//!  kube watchers (one per kind) ────────┼─► StateStore
//!  ClickHouse pollers ──────────────────┘      │
//!                                              ▼  after hydration
//!                 composer loop ──► server-side apply
//!                 clickhouse reconciler ──► CREATE / GRANT / DROP
//!                 readiness reporter ──► rollout progress logs
//! ```
//!
//! # Usage
//!
//! ```text
//! stratusd --tenant-feed /etc/stratus/tenants.toml --clickhouse-url http://clickhouse:8123
//! ```

use clap::Parser;
use stratus_clickhouse::HttpClient;
use stratus_runtime::{Saga, SubscriptionManager, block_until_hydrated, supervise};
use stratus_state::{ClickHouseTable, ResourceKind, StateStore};
use tokio::sync::watch;
use tracing::{Instrument, info, info_span};
use tracing_subscriber::EnvFilter;

use stratusd::feed::FileFeed;
use stratusd::kube_apply::KubeApplier;
use stratusd::kube_watch::{connect, watch_kind};
use stratusd::{Cli, LogFormat, Settings, readiness, reconcile};

const DEFAULT_LOG_FILTER: &str = "info,stratusd=debug,stratus=debug";

/// Subscribers of the tenant feed.
const FEED_SUBSCRIBERS: [&str; 2] = ["composer", "clickhouse"];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let settings = Settings::resolve(&cli)?;
    let span = info_span!("stratusd", cluster = %settings.cluster_name);
    run(settings).instrument(span).await
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run(settings: Settings) -> anyhow::Result<()> {
    info!(feed = %settings.tenant_feed.display(), "stratus controller starting");

    let store = StateStore::default();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Tenant feed ────────────────────────────────────────────

    let feed = SubscriptionManager::new(
        FileFeed::new(&settings.tenant_feed, settings.intervals.feed_poll()),
        store.clone(),
    );
    for subscriber in FEED_SUBSCRIBERS {
        feed.subscribe(subscriber);
    }

    // ── Kubernetes caches ──────────────────────────────────────

    let client = connect(settings.external).await?;
    let watchers: Vec<Saga> = ResourceKind::ALL
        .iter()
        .map(|&kind| {
            let client = client.clone();
            let store = store.clone();
            Saga::new(format!("watch-{kind}"), move || {
                watch_kind(client.clone(), kind, store.clone())
            })
        })
        .collect();
    let watchers = tokio::spawn(supervise(watchers, shutdown_rx.clone()));

    let hydrated = block_until_hydrated(&store, ResourceKind::ALL, settings.intervals.hydration_poll());
    tokio::select! {
        _ = hydrated => {}
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received before caches hydrated");
            let _ = shutdown_tx.send(true);
            let _ = watchers.await;
            return Ok(());
        }
    }

    // ── Reconcilers ────────────────────────────────────────────

    let clickhouse = settings.clickhouse_client()?;
    let mut sagas = vec![composer_saga(&settings, KubeApplier::new(client), &store, &shutdown_rx)];
    sagas.push(clickhouse_reconciler_saga(&settings, &clickhouse, &store, &shutdown_rx));
    for table in [ClickHouseTable::Databases, ClickHouseTable::Users] {
        sagas.push(clickhouse_poller_saga(table, &clickhouse, &store, &shutdown_rx));
    }
    sagas.push(readiness_saga(&store, &shutdown_rx));
    let reconcilers = tokio::spawn(supervise(sagas, shutdown_rx));

    // ── Shutdown ───────────────────────────────────────────────

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    let _ = reconcilers.await;
    let _ = watchers.await;
    for subscriber in FEED_SUBSCRIBERS {
        feed.unsubscribe(subscriber);
    }

    info!("stratus controller stopped");
    Ok(())
}

fn composer_saga(
    settings: &Settings,
    applier: KubeApplier,
    store: &StateStore,
    shutdown: &watch::Receiver<bool>,
) -> Saga {
    let interval = settings.intervals.reconcile();
    let store = store.clone();
    let shutdown = shutdown.clone();
    Saga::new("composer", move || {
        reconcile::run(applier.clone(), store.clone(), interval, shutdown.clone())
    })
}

fn clickhouse_reconciler_saga(
    settings: &Settings,
    client: &Option<HttpClient>,
    store: &StateStore,
    shutdown: &watch::Receiver<bool>,
) -> Saga {
    let interval = settings.intervals.clickhouse_tick();
    let client = client.clone();
    let store = store.clone();
    let shutdown = shutdown.clone();
    Saga::new("clickhouse-tenants", move || {
        stratus_clickhouse::run(client.clone(), store.clone(), interval, shutdown.clone())
    })
}

fn clickhouse_poller_saga(
    table: ClickHouseTable,
    client: &Option<HttpClient>,
    store: &StateStore,
    shutdown: &watch::Receiver<bool>,
) -> Saga {
    let client = client.clone();
    let store = store.clone();
    let shutdown = shutdown.clone();
    Saga::new(format!("clickhouse-{table:?}").to_lowercase(), move || {
        stratus_clickhouse::run_poller(client.clone(), store.clone(), table, shutdown.clone())
    })
}

fn readiness_saga(store: &StateStore, shutdown: &watch::Receiver<bool>) -> Saga {
    let store = store.clone();
    let shutdown = shutdown.clone();
    Saga::new("readiness", move || {
        readiness::run(store.clone(), readiness::REPORT_INTERVAL, shutdown.clone())
    })
}
