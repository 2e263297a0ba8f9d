//! Vital-sign classification.
//!
//! Both ranges are closed: 60 and 100 BPM are normal heart rates, 59 and 101
//! are critical. A reading is critical if either dimension is out of range.

use crate::models::{RangeStatus, VitalAssessment, VitalReading, Verdict};
use std::ops::RangeInclusive;

/// Acceptable heart rate in beats per minute.
pub const HEART_RATE_RANGE: RangeInclusive<u32> = 60..=100;

/// Acceptable breathing rate in breaths per minute.
pub const BREATHING_RATE_RANGE: RangeInclusive<u32> = 12..=20;

/// Classifies a reading as normal or critical.
#[must_use]
pub fn classify(reading: &VitalReading) -> Verdict {
    assess(reading).verdict
}

/// Classifies a reading and reports where each dimension falls.
#[must_use]
pub fn assess(reading: &VitalReading) -> VitalAssessment {
    let heart_rate = position(reading.heart_rate, &HEART_RATE_RANGE);
    let breathing_rate = position(reading.breathing_rate, &BREATHING_RATE_RANGE);
    let verdict = if heart_rate == RangeStatus::InRange && breathing_rate == RangeStatus::InRange {
        Verdict::Normal
    } else {
        Verdict::Critical
    };

    VitalAssessment {
        verdict,
        heart_rate,
        breathing_rate,
    }
}

fn position(value: u32, range: &RangeInclusive<u32>) -> RangeStatus {
    if value < *range.start() {
        RangeStatus::Low
    } else if value > *range.end() {
        RangeStatus::High
    } else {
        RangeStatus::InRange
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use test_case::test_case;

    fn reading(heart_rate: u32, breathing_rate: u32) -> VitalReading {
        VitalReading::new(heart_rate, breathing_rate, Utc::now())
    }

    #[test_case(60, 12, Verdict::Normal ; "both lower bounds")]
    #[test_case(100, 20, Verdict::Normal ; "both upper bounds")]
    #[test_case(75, 16, Verdict::Normal ; "resting")]
    #[test_case(59, 16, Verdict::Critical ; "bradycardia")]
    #[test_case(101, 16, Verdict::Critical ; "tachycardia")]
    #[test_case(75, 11, Verdict::Critical ; "slow breathing")]
    #[test_case(75, 21, Verdict::Critical ; "fast breathing")]
    #[test_case(110, 16, Verdict::Critical ; "elevated heart rate")]
    #[test_case(0, 0, Verdict::Critical ; "no signal")]
    fn test_classify(heart_rate: u32, breathing_rate: u32, expected: Verdict) {
        assert_eq!(classify(&reading(heart_rate, breathing_rate)), expected);
    }

    #[test]
    fn test_assess_reports_each_dimension() {
        let assessment = assess(&reading(45, 25));
        assert_eq!(assessment.verdict, Verdict::Critical);
        assert_eq!(assessment.heart_rate, RangeStatus::Low);
        assert_eq!(assessment.breathing_rate, RangeStatus::High);
    }
}
