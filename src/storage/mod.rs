//! Identity storage.
//!
//! The [`IdentityStore`] trait is the durable key-value surface the gallery
//! loads from. Two backends implement it:
//!
//! | Backend | Use |
//! |---------|-----|
//! | [`SqliteIdentityStore`] | Production, survives restarts |
//! | [`InMemoryIdentityStore`] | Tests and dry runs |
//!
//! Stores hand back raw [`IdentityRecord`]s; validating a record's encoding
//! against the configured dimensionality is left to the gallery.

// Dropping the connection guard early gains nothing in these short critical sections.
#![allow(clippy::significant_drop_tightening)]

pub mod codec;
mod memory;
pub mod sqlite;
pub mod traits;

pub use memory::InMemoryIdentityStore;
pub use sqlite::SqliteIdentityStore;
pub use traits::{IdentityRecord, IdentityStore};
