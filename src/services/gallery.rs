//! Identity gallery.
//!
//! The gallery loads every enrolled identity from an [`IdentityStore`] once and
//! serves that snapshot to the resolver. The store is only read again on an
//! explicit [`resync`](IdentityGallery::resync); enrollments made through the
//! gallery update the store and the snapshot together.

use crate::models::EnrolledIdentity;
use crate::storage::IdentityStore;
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::instrument;

/// Snapshot of enrolled identities, sorted by name.
pub type GallerySnapshot = Arc<[EnrolledIdentity]>;

/// Owns the identity store and the in-memory snapshot loaded from it.
pub struct IdentityGallery {
    store: Box<dyn IdentityStore>,
    dimensions: usize,
    snapshot: RwLock<GallerySnapshot>,
    skipped: RwLock<Vec<String>>,
}

impl IdentityGallery {
    /// Loads the gallery from `store`, expecting encodings of `dimensions` values.
    ///
    /// Malformed records are logged and skipped. When a store returns the same
    /// name more than once, the last record wins.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] if the store cannot be listed, or
    /// [`Error::InvalidInput`] if `dimensions` is zero.
    #[instrument(skip(store), fields(backend = store.backend_name()))]
    pub fn load(store: Box<dyn IdentityStore>, dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(Error::InvalidInput(
                "encoding dimensions must be greater than zero".to_string(),
            ));
        }

        let gallery = Self {
            store,
            dimensions,
            snapshot: RwLock::new(Arc::from(Vec::new())),
            skipped: RwLock::new(Vec::new()),
        };
        gallery
            .reload()
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        Ok(gallery)
    }

    /// Re-reads the store, replacing the snapshot. Returns the identity count.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be listed; the previous snapshot is kept.
    pub fn resync(&self) -> Result<usize> {
        self.reload()
    }

    fn reload(&self) -> Result<usize> {
        let records = self.store.list_all()?;

        let mut by_name = BTreeMap::new();
        let mut skipped = Vec::new();
        for record in records {
            match record.decode(self.dimensions) {
                Ok(identity) => {
                    by_name.insert(identity.name.clone(), identity);
                },
                Err(e) => {
                    if let Error::EnrollmentMalformed { name, .. } = &e {
                        skipped.push(name.clone());
                        // A later valid row replaces an earlier one, so a later bad row does too.
                        by_name.remove(name);
                    }
                    tracing::warn!(error = %e, "skipping malformed enrollment");
                    metrics::counter!("vitalwatch_enrollments_skipped_total").increment(1);
                },
            }
        }

        let count = by_name.len();
        self.replace_snapshot(by_name.into_values().collect());
        *self.skipped.write().unwrap_or_else(PoisonError::into_inner) = skipped;

        tracing::info!(identities = count, "gallery loaded");
        Ok(count)
    }

    fn replace_snapshot(&self, identities: Vec<EnrolledIdentity>) {
        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!("vitalwatch_gallery_size").set(identities.len() as f64);
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Arc::from(identities);
    }

    /// Returns the current snapshot, sorted by name.
    #[must_use]
    pub fn identities(&self) -> GallerySnapshot {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Looks up an identity by name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<EnrolledIdentity> {
        let snapshot = self.identities();
        snapshot
            .binary_search_by(|identity| identity.name.as_str().cmp(name))
            .ok()
            .map(|index| snapshot[index].clone())
    }

    /// Inserts or replaces an identity by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the name is blank or the encoding has
    /// the wrong dimensionality or non-finite values, or the store's error if
    /// the write fails.
    #[instrument(skip(self, identity), fields(identity = %identity.name))]
    pub fn enroll(&self, identity: EnrolledIdentity) -> Result<()> {
        if identity.name.trim().is_empty() {
            return Err(Error::InvalidInput("identity name must not be empty".to_string()));
        }
        if identity.encoding.dimensions() != self.dimensions {
            return Err(Error::InvalidInput(format!(
                "encoding for '{}' has {} dimensions, expected {}",
                identity.name,
                identity.encoding.dimensions(),
                self.dimensions
            )));
        }
        if !identity.encoding.is_finite() {
            return Err(Error::InvalidInput(format!(
                "encoding for '{}' contains non-finite values",
                identity.name
            )));
        }

        self.store.upsert(&identity)?;

        let mut identities: Vec<_> = self
            .identities()
            .iter()
            .filter(|existing| existing.name != identity.name)
            .cloned()
            .collect();
        identities.push(identity);
        identities.sort_by(|a, b| a.name.cmp(&b.name));
        self.replace_snapshot(identities);
        Ok(())
    }

    /// Removes an identity. Returns true if it was enrolled.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the delete fails.
    pub fn remove(&self, name: &str) -> Result<bool> {
        let removed = self.store.remove(name)?;
        let identities: Vec<_> = self
            .identities()
            .iter()
            .filter(|existing| existing.name != name)
            .cloned()
            .collect();
        self.replace_snapshot(identities);
        Ok(removed)
    }

    /// Names of records skipped as malformed during the last load.
    #[must_use]
    pub fn skipped(&self) -> Vec<String> {
        self.skipped
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of identities in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.identities().len()
    }

    /// Returns true if no identities are enrolled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Expected encoding dimensionality.
    #[must_use]
    pub const fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Releases the backing store.
    ///
    /// # Errors
    ///
    /// Returns the store's error if it does not close cleanly.
    pub fn close(self) -> Result<()> {
        tracing::debug!(backend = self.store.backend_name(), "closing identity store");
        self.store.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{IdentityRecord, InMemoryIdentityStore, codec};

    fn record(name: &str, values: Vec<f64>, contact: Option<&str>) -> IdentityRecord {
        IdentityRecord {
            name: name.to_string(),
            encoding: codec::encode(&values.into()),
            emergency_contact: contact.map(str::to_string),
            enrolled_at: None,
        }
    }

    #[test]
    fn test_load_skips_malformed_records() {
        let store = InMemoryIdentityStore::with_records(vec![
            record("Alice", vec![0.1, 0.2, 0.3], Some("+1")),
            record("Bob", vec![0.1, 0.2], Some("+2")),
            IdentityRecord {
                name: "Carol".to_string(),
                encoding: vec![0u8; 13],
                emergency_contact: None,
                enrolled_at: None,
            },
            record("Dana", vec![0.0, f64::NAN, 0.0], None),
        ]);

        let gallery = IdentityGallery::load(Box::new(store), 3).unwrap();
        assert_eq!(gallery.len(), 1);
        assert!(gallery.lookup("Alice").is_some());
        assert!(gallery.lookup("Bob").is_none());
        assert_eq!(gallery.skipped(), ["Bob", "Carol", "Dana"]);
    }

    #[test]
    fn test_duplicate_names_resolve_to_last_record() {
        let store = InMemoryIdentityStore::with_records(vec![
            record("Alice", vec![0.0, 0.0], Some("+old")),
            record("Alice", vec![1.0, 1.0], Some("+new")),
        ]);

        let gallery = IdentityGallery::load(Box::new(store), 2).unwrap();
        let alice = gallery.lookup("Alice").unwrap();
        assert_eq!(alice.contact(), Some("+new"));
        assert_eq!(alice.encoding.as_slice(), &[1.0, 1.0]);
    }

    #[test]
    fn test_snapshot_is_sorted_by_name() {
        let store = InMemoryIdentityStore::with_records(vec![
            record("Zed", vec![0.0], None),
            record("Amy", vec![0.0], None),
            record("Max", vec![0.0], None),
        ]);
        let gallery = IdentityGallery::load(Box::new(store), 1).unwrap();
        let names: Vec<_> = gallery.identities().iter().map(|i| i.name.clone()).collect();
        assert_eq!(names, ["Amy", "Max", "Zed"]);
    }

    #[test]
    fn test_enroll_validates_dimensions() {
        let gallery = IdentityGallery::load(Box::new(InMemoryIdentityStore::new()), 3).unwrap();
        let err = gallery
            .enroll(EnrolledIdentity::new("Bob", vec![0.0; 2], None))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(gallery.is_empty());

        gallery
            .enroll(EnrolledIdentity::new("Bob", vec![0.0; 3], Some("+1".into())))
            .unwrap();
        assert_eq!(gallery.lookup("Bob").unwrap().contact(), Some("+1"));
    }

    #[test]
    fn test_snapshot_ignores_store_until_resync() {
        let store = Arc::new(InMemoryIdentityStore::new());
        let gallery = IdentityGallery::load(Box::new(Arc::clone(&store)), 1).unwrap();

        store
            .upsert(&EnrolledIdentity::new("Late", vec![0.5], None))
            .unwrap();
        assert!(gallery.lookup("Late").is_none());

        assert_eq!(gallery.resync().unwrap(), 1);
        assert!(gallery.lookup("Late").is_some());
    }

    #[test]
    fn test_remove() {
        let gallery = IdentityGallery::load(Box::new(InMemoryIdentityStore::new()), 1).unwrap();
        gallery
            .enroll(EnrolledIdentity::new("Bob", vec![0.0], None))
            .unwrap();
        assert!(gallery.remove("Bob").unwrap());
        assert!(gallery.lookup("Bob").is_none());
        assert!(!gallery.remove("Bob").unwrap());
        gallery.close().unwrap();
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let result = IdentityGallery::load(Box::new(InMemoryIdentityStore::new()), 0);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
