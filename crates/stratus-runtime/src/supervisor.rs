//! Supervised saga runtime.
//!
//! Each saga runs in its own task, inside a wrapper that re-runs it
//! immediately whenever it returns an error or panics. A saga that returns
//! `Ok(())` is done and is not restarted. Failures never cross from one
//! saga to another.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

/// Future produced by one run of a saga.
pub type SagaFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

type SagaFn = Arc<dyn Fn() -> SagaFuture + Send + Sync>;

/// A named, restartable control loop.
#[derive(Clone)]
pub struct Saga {
    name: String,
    body: SagaFn,
}

impl Saga {
    /// `body` is called once per attempt and must build a fresh future
    /// each time.
    pub fn new<F, Fut>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            body: Arc::new(move || Box::pin(body()) as SagaFuture),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Run every saga concurrently until each has finished or `shutdown`
/// fires. Dropping the shutdown sender counts as shutdown.
pub async fn supervise(sagas: Vec<Saga>, shutdown: watch::Receiver<bool>) {
    let mut set = JoinSet::new();
    for saga in sagas {
        info!(saga = %saga.name, "starting saga");
        set.spawn(run_supervised(saga, shutdown.clone()));
    }
    while set.join_next().await.is_some() {}
    debug!("all sagas stopped");
}

async fn run_supervised(saga: Saga, mut shutdown: watch::Receiver<bool>) {
    let mut attempt: u64 = 0;
    loop {
        if *shutdown.borrow() {
            return;
        }
        attempt += 1;

        // A separate task per attempt, so a panic unwinds into a JoinError
        // here instead of taking the wrapper down with it.
        let mut task = tokio::spawn((saga.body)());
        let outcome = tokio::select! {
            joined = &mut task => joined,
            _ = shutdown.changed() => {
                task.abort();
                debug!(saga = %saga.name, "saga cancelled by shutdown");
                return;
            }
        };

        match outcome {
            Ok(Ok(())) => {
                info!(saga = %saga.name, attempt, "saga finished");
                return;
            }
            Ok(Err(e)) => {
                error!(saga = %saga.name, attempt, error = %e, "saga failed, restarting");
            }
            Err(e) if e.is_panic() => {
                error!(saga = %saga.name, attempt, "saga panicked, restarting");
            }
            Err(e) => {
                error!(saga = %saga.name, attempt, error = %e, "saga task cancelled");
                return;
            }
        }
    }
}
