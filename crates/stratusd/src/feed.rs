//! Tenant/config feed backed by a TOML file.
//!
//! The file is re-read on a fixed period while the feed is open; a changed
//! `[config]` table or `[[tenants]]` list is emitted as a store action.
//!
//! ```toml
//! [config]
//! name = "prod"
//! dns_name = "example.com."
//! target = "gcp"
//! postgresql_endpoint = "postgres://grafana:secret@pg:5432/"
//! metric_retention_days = 15
//!
//! [[tenants]]
//! name = "system"
//! type = "SYSTEM"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use stratus_core::{GlobalConfig, Tenant};
use stratus_runtime::{Feed, Upstream};
use stratus_state::Action;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{FeedError, FeedResult};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeedDocument {
    pub config: Option<GlobalConfig>,
    #[serde(default)]
    pub tenants: Vec<Tenant>,
}

impl FeedDocument {
    pub fn parse(content: &str) -> FeedResult<Self> {
        let doc: FeedDocument = toml::from_str(content)?;
        for tenant in &doc.tenants {
            tenant.validate()?;
        }
        let systems = doc.tenants.iter().filter(|t| t.is_system()).count();
        if systems > 1 {
            return Err(FeedError::MultipleSystemTenants(systems));
        }
        Ok(doc)
    }

    pub fn read(path: &Path) -> FeedResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| FeedError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }
}

pub struct FileFeed {
    path: PathBuf,
    interval: Duration,
}

impl FileFeed {
    pub fn new(path: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            path: path.into(),
            interval,
        }
    }
}

impl Feed for FileFeed {
    fn name(&self) -> &str {
        "tenant-file"
    }

    fn open(&self) -> Upstream {
        let (tx, rx) = mpsc::channel(16);
        let task = tokio::spawn(follow_file(self.path.clone(), self.interval, tx));
        Upstream {
            events: rx,
            teardown: Box::new(move || task.abort()),
        }
    }
}

/// Last values sent downstream, so unchanged re-reads emit nothing.
#[derive(Default)]
struct Emitted {
    config: Option<GlobalConfig>,
    tenants: Option<Vec<Tenant>>,
    error: Option<String>,
}

impl Emitted {
    /// Actions needed to bring the consumer up to `doc`.
    fn diff(&mut self, doc: FeedDocument) -> Vec<Action> {
        self.error = None;
        let mut actions = Vec::new();
        if let Some(config) = doc.config {
            if self.config.as_ref() != Some(&config) {
                self.config = Some(config.clone());
                actions.push(Action::SetConfig(config));
            }
        }
        if self.tenants.as_ref() != Some(&doc.tenants) {
            self.tenants = Some(doc.tenants.clone());
            actions.push(Action::SetTenants(doc.tenants));
        }
        actions
    }

    /// Whether `error` differs from the last one reported.
    fn note_error(&mut self, error: &FeedError) -> bool {
        let text = error.to_string();
        if self.error.as_deref() == Some(text.as_str()) {
            return false;
        }
        self.error = Some(text);
        true
    }
}

async fn follow_file(path: PathBuf, interval: Duration, tx: mpsc::Sender<Action>) {
    let mut emitted = Emitted::default();
    loop {
        match FeedDocument::read(&path) {
            Ok(doc) => {
                for action in emitted.diff(doc) {
                    info!(path = %path.display(), action = %action.label(), "tenant feed changed");
                    if tx.send(action).await.is_err() {
                        debug!("tenant feed consumer gone");
                        return;
                    }
                }
            }
            // Keep the last good values; repeat errors are only logged once.
            Err(e) => {
                if emitted.note_error(&e) {
                    warn!(path = %path.display(), error = %e, "tenant feed unreadable");
                }
            }
        }
        tokio::time::sleep(interval).await;
    }
}
