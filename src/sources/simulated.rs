//! Simulated vitals.

use super::VitalsSource;
use crate::models::{FaceRegion, Frame, VitalReading};
use crate::services::classifier::{BREATHING_RATE_RANGE, HEART_RATE_RANGE};
use crate::{Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Generates random readings.
///
/// By default every reading is drawn uniformly from the normal ranges. With a
/// non-zero `critical_probability`, that fraction of readings instead has a
/// heart rate drawn from an abnormal band (40..=59 or 101..=140).
#[derive(Debug)]
pub struct SimulatedVitalsSource {
    rng: StdRng,
    critical_probability: f64,
}

impl SimulatedVitalsSource {
    /// Creates a source seeded from the OS.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            critical_probability: 0.0,
        }
    }

    /// Creates a reproducible source.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            critical_probability: 0.0,
        }
    }

    /// Sets the probability that a reading is critical.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] unless `probability` is within `[0, 1]`.
    pub fn with_critical_probability(mut self, probability: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(Error::InvalidInput(format!(
                "critical probability must be within [0, 1], got {probability}"
            )));
        }
        self.critical_probability = probability;
        Ok(self)
    }

    /// Draws a reading stamped with `observed_at`.
    pub fn sample(&mut self, observed_at: chrono::DateTime<chrono::Utc>) -> VitalReading {
        let breathing_rate = self.rng.gen_range(BREATHING_RATE_RANGE);
        let heart_rate = if self.rng.gen_bool(self.critical_probability) {
            if self.rng.gen_bool(0.5) {
                self.rng.gen_range(40..*HEART_RATE_RANGE.start())
            } else {
                self.rng.gen_range(HEART_RATE_RANGE.end() + 1..=140)
            }
        } else {
            self.rng.gen_range(HEART_RATE_RANGE)
        };
        VitalReading::new(heart_rate, breathing_rate, observed_at)
    }
}

impl Default for SimulatedVitalsSource {
    fn default() -> Self {
        Self::new()
    }
}

impl VitalsSource for SimulatedVitalsSource {
    fn read(&mut self, _region: &FaceRegion, frame: &Frame) -> Result<VitalReading> {
        Ok(self.sample(frame.captured_at))
    }
}
