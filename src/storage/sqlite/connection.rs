//! Connection handling for the `SQLite` identity store.

use crate::{Error, Result};
use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard};

/// Milliseconds `SQLite` waits on a locked database before returning `SQLITE_BUSY`.
const BUSY_TIMEOUT_MS: &str = "5000";

/// Acquires a mutex, recovering the inner value if a previous holder panicked.
///
/// The connection has no invariants that a panic mid-statement could break
/// (every write runs in its own transaction), so recovery is safe.
pub fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("identity store mutex was poisoned, recovering");
            metrics::counter!("vitalwatch_store_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

/// Configures a connection for a long-lived single-process store.
///
/// - **WAL mode**: enrollment from the CLI can run while a monitor holds the store open
/// - **NORMAL synchronous**
/// - **`busy_timeout`**: waits for locks instead of failing immediately
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if the busy timeout cannot be set.
pub fn configure_connection(conn: &Connection) -> Result<()> {
    // journal_mode returns a row, and read-only or in-memory databases may refuse WAL
    let _ = conn.pragma_update(None, "journal_mode", "WAL");
    let _ = conn.pragma_update(None, "synchronous", "NORMAL");
    conn.pragma_update(None, "busy_timeout", BUSY_TIMEOUT_MS)
        .map_err(|e| Error::OperationFailed {
            operation: "configure_connection".to_string(),
            cause: e.to_string(),
        })
}
