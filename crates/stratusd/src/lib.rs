//! stratusd: the pieces the controller binary wires together.
//!
//! - [`settings`]: flags, environment and settings file.
//! - [`feed`]: the tenant/config feed read from a TOML file.
//! - [`kube_watch`]: one watcher per cached kind.
//! - [`reconcile`]: compose + diff + apply passes.
//! - [`kube_apply`]: the server-side-apply [`reconcile::Applier`].
//! - [`readiness`]: rollout progress logging.

pub mod error;
pub mod feed;
pub mod kube_apply;
pub mod kube_watch;
pub mod readiness;
pub mod reconcile;
pub mod settings;

pub use error::{FeedError, SettingsError};
pub use settings::{Cli, LogFormat, Settings};
