//! Cluster scope: resources that exist once per cluster, whatever the
//! tenant set.

mod dockerhub;
mod storage;

pub use dockerhub::{
    DOCKERHUB_SECRET, DOCKERHUB_SOURCE_NAMESPACE, dockerhub_resources, image_pull_secrets, with_pull_secrets,
};
pub use storage::storage_resources;

use stratus_core::GlobalConfig;
use stratus_state::State;

use crate::collection::ResourceCollection;

pub fn cluster_resources(state: &State, config: &GlobalConfig) -> ResourceCollection {
    let mut collection = storage_resources(config.target);
    collection.merge(dockerhub_resources(state));
    collection
}
