//! Per-identity alert cooldown.

use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

/// Default minimum spacing between two alerts for the same identity.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);

/// Tracks when each identity was last alerted.
///
/// Each name is either absent (never alerted) or maps to the time of its most
/// recent dispatch. The only way in is [`record_dispatch`](Self::record_dispatch),
/// and entries are never expired, so the map grows to at most the number of
/// identities that have ever been alerted.
///
/// # Thread Safety
///
/// Uses `RwLock` so suppression checks from concurrent evaluations do not
/// serialize. Poisoned locks are recovered: the map holds plain timestamps
/// that a panicking writer cannot leave half-updated.
#[derive(Debug)]
pub struct CooldownTracker {
    window: TimeDelta,
    last_dispatch: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl CooldownTracker {
    /// Creates a tracker with the given cooldown window.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window: TimeDelta::from_std(window).unwrap_or(TimeDelta::MAX),
            last_dispatch: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the cooldown window.
    #[must_use]
    pub fn window(&self) -> Duration {
        self.window.to_std().unwrap_or(Duration::ZERO)
    }

    /// Returns true if `name` was alerted less than one window before `now`.
    ///
    /// A `now` earlier than the recorded dispatch is treated as inside the window.
    #[must_use]
    pub fn should_suppress(&self, name: &str, now: DateTime<Utc>) -> bool {
        let map = self
            .last_dispatch
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        map.get(name)
            .is_some_and(|last| now.signed_duration_since(*last) < self.window)
    }

    /// Records that an alert for `name` was dispatched at `now`.
    pub fn record_dispatch(&self, name: &str, now: DateTime<Utc>) {
        let mut map = self
            .last_dispatch
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        map.insert(name.to_string(), now);
    }

    /// Returns the last dispatch time for `name`.
    #[must_use]
    pub fn last_dispatch(&self, name: &str) -> Option<DateTime<Utc>> {
        self.last_dispatch
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .copied()
    }

    /// Returns the number of identities that have been alerted.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.last_dispatch
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for CooldownTracker {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}
