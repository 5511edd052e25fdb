//! stratus-core: shared domain types for the Stratus controller.
//!
//! Everything here is plain data plus the naming rules that every other
//! crate must agree on (tenant namespaces, Prometheus names, ClickHouse
//! identities). Nothing in this crate performs I/O beyond parsing a
//! string handed to it.

pub mod config;
pub mod error;
pub mod naming;
pub mod tenant;

pub use config::{CloudTarget, GlobalConfig};
pub use error::{CoreError, CoreResult};
pub use naming::*;
pub use tenant::{Tenant, TenantType};
