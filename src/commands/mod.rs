//! Command handlers module.
//!
//! - `run.rs`: the monitoring pipeline over a recorded session
//! - `identities.rs`: enroll, remove and list
//! - `alert.rs`: test notifications and transport construction
//! - `classify.rs`: one-off vital-sign classification
//! - `config.rs`: configuration display

mod alert;
mod classify;
mod config;
mod identities;
mod run;

pub use alert::cmd_test_alert;
pub use classify::cmd_classify;
pub use config::cmd_config;
pub use identities::{EncodingArgs, ListFormat, cmd_enroll, cmd_list, cmd_remove};
pub use run::{RunArgs, cmd_run};

use std::sync::Arc;
use vitalwatch::config::VitalwatchConfig;
use vitalwatch::services::IdentityGallery;
use vitalwatch::storage::SqliteIdentityStore;

/// Opens the configured identity database and loads the gallery.
fn open_gallery(config: &VitalwatchConfig) -> vitalwatch::Result<IdentityGallery> {
    let store = SqliteIdentityStore::open(&config.gallery.db_path)?;
    let gallery = IdentityGallery::load(Box::new(store), config.gallery.encoding_dimensions)?;
    for name in gallery.skipped() {
        eprintln!("warning: skipped malformed enrollment for '{name}'");
    }
    Ok(gallery)
}

/// Closes the gallery's store, or leaves it to close on drop if still shared.
fn close_gallery(gallery: Arc<IdentityGallery>) -> vitalwatch::Result<()> {
    match Arc::try_unwrap(gallery) {
        Ok(gallery) => gallery.close(),
        Err(shared) => {
            tracing::warn!(
                handles = Arc::strong_count(&shared),
                "identity gallery still shared at shutdown, store closes on drop"
            );
            Ok(())
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitalwatch::EnrolledIdentity;
    use vitalwatch::storage::InMemoryIdentityStore;

    fn gallery() -> Arc<IdentityGallery> {
        let gallery = IdentityGallery::load(Box::new(InMemoryIdentityStore::new()), 2).unwrap();
        gallery
            .enroll(EnrolledIdentity::new("Alice", vec![0.1, 0.2], None))
            .unwrap();
        Arc::new(gallery)
    }

    #[test]
    fn test_close_gallery_sole_owner() {
        assert!(close_gallery(gallery()).is_ok());
    }

    #[test]
    fn test_close_gallery_still_shared() {
        let gallery = gallery();
        let held = Arc::clone(&gallery);
        assert!(close_gallery(gallery).is_ok());
        assert!(held.lookup("Alice").is_some());
    }
}
