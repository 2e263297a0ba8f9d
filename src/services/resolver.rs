//! Identity resolution.
//!
//! Matches a face observation against every enrolled encoding and accepts the
//! nearest one if it is within the acceptance threshold.
//!
//! # Tie-breaking
//!
//! All entries whose distance is within `tie_tolerance` of the minimum are
//! treated as equidistant, and the lexicographically smallest name wins. The
//! result therefore does not depend on enrollment or storage order.

use crate::models::{FaceObservation, ResolutionResult};
use crate::services::IdentityGallery;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::instrument;

/// Distance function used to compare encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// L2 distance.
    #[default]
    Euclidean,
    /// One minus cosine similarity.
    Cosine,
}

impl DistanceMetric {
    /// Default acceptance threshold for this metric.
    #[must_use]
    pub const fn default_threshold(self) -> f64 {
        match self {
            Self::Euclidean => 0.6,
            Self::Cosine => 0.4,
        }
    }

    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Euclidean => "euclidean",
            Self::Cosine => "cosine",
        }
    }

    /// Computes the distance between two encodings of equal length.
    ///
    /// Identical encodings are at distance 0 under both metrics. Under cosine,
    /// a zero vector is infinitely far from anything but itself.
    #[must_use]
    pub fn distance(self, a: &[f64], b: &[f64]) -> f64 {
        if a == b {
            return 0.0;
        }
        match self {
            Self::Euclidean => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f64>()
                .sqrt(),
            Self::Cosine => {
                let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
                let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
                let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
                if norm_a == 0.0 || norm_b == 0.0 {
                    return f64::INFINITY;
                }
                (1.0 - dot / (norm_a * norm_b)).max(0.0)
            },
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Matching parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolverConfig {
    /// Distance function.
    pub metric: DistanceMetric,
    /// Largest accepted distance (inclusive).
    pub threshold: f64,
    /// Distances closer than this are treated as equal.
    pub tie_tolerance: f64,
}

impl ResolverConfig {
    /// Creates a config for `metric` with its default threshold.
    #[must_use]
    pub const fn for_metric(metric: DistanceMetric) -> Self {
        Self {
            metric,
            threshold: metric.default_threshold(),
            tie_tolerance: 1e-9,
        }
    }

    /// Sets the acceptance threshold.
    #[must_use]
    pub const fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self::for_metric(DistanceMetric::default())
    }
}

/// Resolves face observations to enrolled identities.
#[derive(Clone)]
pub struct IdentityResolver {
    gallery: Arc<IdentityGallery>,
    config: ResolverConfig,
}

impl IdentityResolver {
    /// Creates a resolver over `gallery`.
    #[must_use]
    pub const fn new(gallery: Arc<IdentityGallery>, config: ResolverConfig) -> Self {
        Self { gallery, config }
    }

    /// Returns the matching parameters.
    #[must_use]
    pub const fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolves an observation.
    ///
    /// `None` means feature extraction failed upstream; it always resolves to
    /// [`ResolutionResult::Unknown`]. So does an observation whose encoding has
    /// the wrong length or non-finite values.
    #[instrument(skip_all, fields(metric = %self.config.metric))]
    pub fn resolve(&self, observation: Option<&FaceObservation>) -> ResolutionResult {
        let result = self.resolve_inner(observation);
        let label = if result.is_unknown() { "unknown" } else { "identified" };
        metrics::counter!("vitalwatch_resolutions_total", "result" => label).increment(1);
        result
    }

    fn resolve_inner(&self, observation: Option<&FaceObservation>) -> ResolutionResult {
        let Some(observation) = observation else {
            return ResolutionResult::Unknown;
        };

        let probe = observation.encoding.as_slice();
        if probe.len() != self.gallery.dimensions() || !observation.encoding.is_finite() {
            tracing::warn!(
                dimensions = probe.len(),
                expected = self.gallery.dimensions(),
                "observation encoding is unusable, treating face as unknown"
            );
            return ResolutionResult::Unknown;
        }

        let identities = self.gallery.identities();
        let distances: Vec<f64> = identities
            .iter()
            .map(|identity| self.config.metric.distance(probe, identity.encoding.as_slice()))
            .collect();

        let Some(best) = distances.iter().copied().filter(|d| !d.is_nan()).reduce(f64::min) else {
            return ResolutionResult::Unknown;
        };

        if best > self.config.threshold {
            tracing::debug!(best, threshold = self.config.threshold, "no match within threshold");
            return ResolutionResult::Unknown;
        }

        // The snapshot is sorted by name, so the first candidate is the smallest name.
        identities
            .iter()
            .zip(&distances)
            .find(|(_, distance)| {
                **distance - best <= self.config.tie_tolerance
                    && **distance <= self.config.threshold
            })
            .map_or(ResolutionResult::Unknown, |(identity, distance)| {
                ResolutionResult::Identified {
                    identity: identity.clone(),
                    distance: *distance,
                }
            })
    }
}
