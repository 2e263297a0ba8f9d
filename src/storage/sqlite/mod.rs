//! `SQLite` identity store.
//!
//! - [`connection`]: lock acquisition with poison recovery and pragma setup
//! - [`metrics`]: per-operation counters and latency histograms
//! - [`store`]: the [`SqliteIdentityStore`] itself

mod connection;
mod metrics;
mod store;

pub use connection::{acquire_lock, configure_connection};
pub use metrics::record_operation_metrics;
pub use store::SqliteIdentityStore;
