//! Pipeline services.
//!
//! | Service | Role |
//! |---------|------|
//! | [`IdentityGallery`] | snapshot of enrolled identities |
//! | [`IdentityResolver`] | nearest-match with threshold and tie-break |
//! | [`classify`] | normal/critical verdict |
//! | [`CooldownTracker`] | per-identity alert spacing |
//! | [`AlertDispatcher`] | decision rule and transport call |
//! | [`MonitoringLoop`] | drives the above per face per frame |

// Lock guards live to the end of short critical sections.
#![allow(clippy::significant_drop_tightening)]

pub mod classifier;
mod cooldown;
mod dispatcher;
mod gallery;
mod monitor;
mod resolver;

pub use classifier::{BREATHING_RATE_RANGE, HEART_RATE_RANGE, assess, classify};
pub use cooldown::{CooldownTracker, DEFAULT_COOLDOWN};
pub use dispatcher::{AlertDispatcher, PendingDispatch};
pub use gallery::{GallerySnapshot, IdentityGallery};
pub use monitor::{LoopStats, MonitorConfig, MonitoringLoop, ShutdownSignal, StopReason};
pub use resolver::{DistanceMetric, IdentityResolver, ResolverConfig};
