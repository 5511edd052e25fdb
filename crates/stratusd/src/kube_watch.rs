//! Kubernetes watchers feeding the per-kind caches.
//!
//! One `kube` watcher runs per [`ResourceKind`], over `DynamicObject`s so
//! every kind (built-in or CRD) goes through the same code. Its initial
//! listing is buffered and dispatched as a single `List`, which is what
//! marks the cache hydrated.

use futures::StreamExt;
use kube::api::{Api, ApiResource, DynamicObject, GroupVersionKind};
use kube::runtime::{WatchStreamExt, watcher};
use kube::{Client, Config};
use serde::Serialize;
use stratus_state::{Action, CacheEvent, KubeObject, ResourceKind, StateStore};
use tracing::{debug, info, warn};

/// Connect to the API server: the local kubeconfig when `external`,
/// otherwise the pod's service account.
pub async fn connect(external: bool) -> anyhow::Result<Client> {
    let config = if external {
        Config::infer().await?
    } else {
        Config::incluster()?
    };
    info!(cluster_url = %config.cluster_url, external, "kubernetes client configured");
    Ok(Client::try_from(config)?)
}

pub fn api_resource(kind: ResourceKind) -> ApiResource {
    let gvk = GroupVersionKind::gvk(kind.group(), kind.version(), kind.kind());
    ApiResource::from_gvk_with_plural(&gvk, kind.plural())
}

/// Turns watcher events for one kind into store actions.
pub struct EventTranslator {
    kind: ResourceKind,
    /// Objects received since `Init`, until `InitDone`.
    listing: Option<Vec<KubeObject>>,
}

impl EventTranslator {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            listing: None,
        }
    }

    pub fn translate<K: Serialize>(&mut self, event: watcher::Event<K>) -> Option<Action> {
        let event = match event {
            watcher::Event::Init => {
                self.listing = Some(Vec::new());
                return None;
            }
            watcher::Event::InitApply(obj) => {
                let obj = self.object(&obj)?;
                self.listing.get_or_insert_with(Vec::new).push(obj);
                return None;
            }
            watcher::Event::InitDone => CacheEvent::List(self.listing.take().unwrap_or_default()),
            watcher::Event::Apply(obj) => CacheEvent::Apply(self.object(&obj)?),
            watcher::Event::Delete(obj) => CacheEvent::Delete(self.object(&obj)?),
        };
        Some(Action::Kube {
            kind: self.kind,
            event,
        })
    }

    fn object<K: Serialize>(&self, obj: &K) -> Option<KubeObject> {
        let converted = serde_json::to_value(obj)
            .map_err(|e| e.to_string())
            .and_then(|raw| KubeObject::from_value(raw).map_err(|e| e.to_string()));
        match converted {
            Ok(obj) => Some(obj),
            Err(error) => {
                warn!(kind = %self.kind, %error, "dropping unreadable watch object");
                None
            }
        }
    }
}

/// Watch one kind forever. Errors are recorded on the cache (which keeps
/// its last listing) and the watcher retries with backoff.
pub async fn watch_kind(client: Client, kind: ResourceKind, store: StateStore) -> anyhow::Result<()> {
    let api: Api<DynamicObject> = Api::all_with(client, &api_resource(kind));
    let mut translator = EventTranslator::new(kind);
    let mut events = std::pin::pin!(watcher(api, watcher::Config::default()).default_backoff());

    debug!(%kind, "watch started");
    while let Some(event) = events.next().await {
        match event {
            Ok(event) => {
                if let Some(action) = translator.translate(event) {
                    store.dispatch(action);
                }
            }
            Err(e) => {
                warn!(%kind, error = %e, "watch failed");
                store.dispatch(Action::Kube {
                    kind,
                    event: CacheEvent::Error(e.to_string()),
                });
            }
        }
    }
    anyhow::bail!("watch stream for {kind} ended")
}
