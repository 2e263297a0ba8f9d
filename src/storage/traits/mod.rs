//! Storage traits.

mod identity;

pub use identity::{IdentityRecord, IdentityStore};
