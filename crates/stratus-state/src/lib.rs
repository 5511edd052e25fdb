//! stratus-state: the controller's read model.
//!
//! Holds one [`WatchedResourceState`] per watched Kubernetes kind plus the
//! ClickHouse database/user listings, the tenant list, and the cluster
//! config. Producers (watchers, pollers, the tenant feed) never mutate
//! state directly: they dispatch [`Action`]s into the [`StateStore`],
//! which reduces them into a fresh immutable [`State`] snapshot.
//!
//! # Architecture
//!
//! ```text
//! watch events ─┐
//! CH pollers ───┼─► Action ─► StateStore::dispatch ─► reduce ─► Arc<State>
//! tenant feed ──┘                                           │
//!                            composer / reconcilers ◄───────┘ snapshot()
//! ```
//!
//! Snapshots are copy-on-write: each cache sits behind its own `Arc`, so a
//! dispatch only clones the cache it touches, and readers holding an older
//! snapshot are never disturbed.

pub mod action;
pub mod cache;
pub mod error;
pub mod kinds;
pub mod object;
pub mod state;
pub mod store;

pub use action::{Action, CacheEvent, ClickHouseTable};
pub use cache::{CacheItem, WatchedResourceState};
pub use error::{StateError, StateResult};
pub use kinds::ResourceKind;
pub use object::KubeObject;
pub use state::State;
pub use store::StateStore;
