//! In-memory identity store.

use crate::Result;
use crate::models::EnrolledIdentity;
use crate::storage::sqlite::{acquire_lock, record_operation_metrics};
use crate::storage::traits::{IdentityRecord, IdentityStore};
use std::sync::Mutex;
use std::time::Instant;

const BACKEND: &str = "memory";

/// Identity store that keeps records in a vector for the life of the process.
///
/// Records are kept in insertion order, matching how the `SQLite` store lists rows.
#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    records: Mutex<Vec<IdentityRecord>>,
}

impl InMemoryIdentityStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding raw records, including ones that may not decode.
    #[must_use]
    pub const fn with_records(records: Vec<IdentityRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }
}

impl IdentityStore for InMemoryIdentityStore {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    fn list_all(&self) -> Result<Vec<IdentityRecord>> {
        let start = Instant::now();
        let records = acquire_lock(&self.records).clone();
        record_operation_metrics(BACKEND, "list_all", start, "success");
        Ok(records)
    }

    fn upsert(&self, identity: &EnrolledIdentity) -> Result<()> {
        let start = Instant::now();
        let enrolled_at = identity.enrolled_at.unwrap_or_else(chrono::Utc::now);
        let record = IdentityRecord::from_identity(identity, enrolled_at.timestamp());
        {
            let mut records = acquire_lock(&self.records);
            records.retain(|r| r.name != record.name);
            records.push(record);
        }
        record_operation_metrics(BACKEND, "upsert", start, "success");
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<bool> {
        let start = Instant::now();
        let removed = {
            let mut records = acquire_lock(&self.records);
            let before = records.len();
            records.retain(|r| r.name != name);
            records.len() != before
        };
        record_operation_metrics(BACKEND, "remove", start, "success");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_replaces_and_moves_to_end() {
        let store = InMemoryIdentityStore::new();
        store
            .upsert(&EnrolledIdentity::new("Alice", vec![0.0], Some("+1".into())))
            .unwrap();
        store
            .upsert(&EnrolledIdentity::new("Bob", vec![0.0], None))
            .unwrap();
        store
            .upsert(&EnrolledIdentity::new("Alice", vec![1.0], Some("+2".into())))
            .unwrap();

        let names: Vec<_> = store.list_all().unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, ["Bob", "Alice"]);
        assert_eq!(
            store.get("Alice").unwrap().unwrap().emergency_contact.as_deref(),
            Some("+2")
        );
    }

    #[test]
    fn test_remove_and_count() {
        let store = InMemoryIdentityStore::new();
        store
            .upsert(&EnrolledIdentity::new("Alice", vec![0.0], None))
            .unwrap();
        assert_eq!(store.count().unwrap(), 1);
        assert!(store.remove("Alice").unwrap());
        assert!(!store.remove("Alice").unwrap());
        assert_eq!(store.count().unwrap(), 0);
    }
}
