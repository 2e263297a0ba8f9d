//! Identity store trait.

use crate::Result;
use crate::models::{EnrolledIdentity, FaceEncoding};
use crate::storage::codec;
use chrono::{DateTime, Utc};

/// A row as held by the store, before its encoding is validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRecord {
    /// Identity name.
    pub name: String,
    /// Packed encoding blob.
    pub encoding: Vec<u8>,
    /// Emergency contact, if any.
    pub emergency_contact: Option<String>,
    /// Enrollment time as Unix seconds. Absent for rows written by older schemas.
    pub enrolled_at: Option<i64>,
}

impl IdentityRecord {
    /// Builds a record from an identity, packing its encoding.
    #[must_use]
    pub fn from_identity(identity: &EnrolledIdentity, enrolled_at: i64) -> Self {
        Self {
            name: identity.name.clone(),
            encoding: codec::encode(&identity.encoding),
            emergency_contact: identity.contact().map(str::to_string),
            enrolled_at: Some(enrolled_at),
        }
    }

    /// Decodes the record into an identity.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::EnrollmentMalformed`] if the encoding blob is not a
    /// valid encoding of `dimensions` finite values.
    pub fn decode(self, dimensions: usize) -> Result<EnrolledIdentity> {
        let encoding: FaceEncoding =
            codec::decode(&self.encoding, dimensions).map_err(|reason| {
                crate::Error::EnrollmentMalformed {
                    name: self.name.clone(),
                    reason,
                }
            })?;

        let mut identity = EnrolledIdentity::new(self.name, encoding, self.emergency_contact);
        if let Some(at) = self
            .enrolled_at
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        {
            identity = identity.with_enrolled_at(at);
        }
        Ok(identity)
    }
}

/// Durable key-value persistence of enrolled identities keyed by name.
///
/// Implementations are shared between the gallery and CLI commands, so every
/// method takes `&self` and handles its own synchronization.
pub trait IdentityStore: Send + Sync {
    /// Short backend name used in logs and metrics.
    fn backend_name(&self) -> &'static str;

    /// Lists every stored record in storage order.
    ///
    /// Stores that allow duplicate names return all of them; later records win.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn list_all(&self) -> Result<Vec<IdentityRecord>>;

    /// Inserts or replaces the record for `identity.name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn upsert(&self, identity: &EnrolledIdentity) -> Result<()>;

    /// Removes every record named `name`. Returns true if any existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn remove(&self, name: &str) -> Result<bool>;

    /// Returns the effective record for `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get(&self, name: &str) -> Result<Option<IdentityRecord>> {
        Ok(self
            .list_all()?
            .into_iter()
            .rev()
            .find(|record| record.name == name))
    }

    /// Returns the number of distinct names.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn count(&self) -> Result<usize> {
        let names: std::collections::BTreeSet<String> =
            self.list_all()?.into_iter().map(|r| r.name).collect();
        Ok(names.len())
    }

    /// Releases the store's resources, reporting errors a drop would swallow.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend does not close cleanly.
    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

impl<S: IdentityStore + ?Sized> IdentityStore for std::sync::Arc<S> {
    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }

    fn list_all(&self) -> Result<Vec<IdentityRecord>> {
        (**self).list_all()
    }

    fn upsert(&self, identity: &EnrolledIdentity) -> Result<()> {
        (**self).upsert(identity)
    }

    fn remove(&self, name: &str) -> Result<bool> {
        (**self).remove(name)
    }

    fn get(&self, name: &str) -> Result<Option<IdentityRecord>> {
        (**self).get(name)
    }

    fn count(&self) -> Result<usize> {
        (**self).count()
    }
}
