//! stratus-runtime: the long-lived machinery around the controller's
//! reconcilers.
//!
//! - [`supervise`] runs independent sagas, restarting any that fail or
//!   panic, until shutdown.
//! - [`block_until_hydrated`] holds dependent work back until the caches
//!   it reads have completed a first listing.
//! - [`SubscriptionManager`] opens one upstream feed while anyone is
//!   interested in it and closes it when the last subscriber leaves.

pub mod hydration;
pub mod subscription;
pub mod supervisor;

pub use hydration::{HYDRATION_POLL_INTERVAL, block_until_hydrated};
pub use subscription::{Feed, SubscriptionId, SubscriptionManager, Teardown, Upstream};
pub use supervisor::{Saga, SagaFuture, supervise};
