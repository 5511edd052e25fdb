//! stratus-clickhouse: per-tenant databases and users in ClickHouse.
//!
//! Two kinds of loops live here, both driven by the shared state:
//!
//! ```text
//!   ClickHouse ──SHOW DATABASES/USERS──► run_poller ──► StateStore
//!       ▲                                                   │
//!       └──── CREATE / GRANT / DROP ◄──── reconciler::run ◄─┘
//! ```
//!
//! The pollers fill the `Databases` and `Users` caches; the reconciler
//! reads them alongside the tenant list and issues idempotent statements
//! until ClickHouse matches.

pub mod client;
pub mod error;
pub mod informer;
pub mod reconciler;
pub mod statement;

pub use client::{ClickHouseClient, HttpClient, parse_rows, row_names};
pub use error::{ClickHouseError, ClickHouseResult};
pub use informer::{POLL_ERROR_INTERVAL, POLL_INTERVAL, poll_once, run_poller};
pub use reconciler::{TICK_INTERVAL, TenantReconciler, TickOutcome, plan, run};
pub use statement::Statement;
