//! Server-side apply of composed resources.

use anyhow::Context;
use kube::Client;
use kube::api::{Api, DynamicObject, Patch, PatchParams, PostParams};
use stratus_compose::Resource;

use crate::kube_watch::api_resource;
use crate::reconcile::Applier;

/// Field manager recorded on every object the controller writes.
pub const FIELD_MANAGER: &str = "stratus-controller";

const HTTP_CONFLICT: u16 = 409;

#[derive(Clone)]
pub struct KubeApplier {
    client: Client,
}

impl KubeApplier {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, resource: &Resource) -> Api<DynamicObject> {
        let ar = api_resource(resource.kind());
        match resource.namespace() {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &ar),
            None => Api::all_with(self.client.clone(), &ar),
        }
    }

    /// Create-only path: an existing object is left exactly as it is.
    async fn create_if_absent(&self, api: &Api<DynamicObject>, resource: &Resource) -> anyhow::Result<()> {
        if api.get_opt(resource.name()).await?.is_some() {
            return Ok(());
        }
        let object: DynamicObject = serde_json::from_value(resource.manifest().clone())?;
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..PostParams::default()
        };
        match api.create(&params, &object).await {
            Ok(_) => Ok(()),
            // Lost a race with another writer; the object exists, which is all we want.
            Err(kube::Error::Api(response)) if response.code == HTTP_CONFLICT => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Applier for KubeApplier {
    async fn apply(&self, resource: &Resource) -> anyhow::Result<()> {
        let api = self.api(resource);
        if resource.is_immutable() {
            return self
                .create_if_absent(&api, resource)
                .await
                .with_context(|| format!("creating {}", resource.id()));
        }

        let params = PatchParams::apply(FIELD_MANAGER).force();
        api.patch(resource.name(), &params, &Patch::Apply(resource.manifest()))
            .await
            .with_context(|| format!("applying {}", resource.id()))?;
        Ok(())
    }
}
