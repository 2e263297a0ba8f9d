//! Classify command.

use chrono::Utc;
use vitalwatch::VitalReading;
use vitalwatch::services::{BREATHING_RATE_RANGE, HEART_RATE_RANGE, assess};

/// Prints the verdict and where each dimension falls.
pub fn cmd_classify(heart_rate: u32, breathing_rate: u32) {
    let assessment = assess(&VitalReading::new(heart_rate, breathing_rate, Utc::now()));

    println!("Verdict: {}", assessment.verdict.as_str().to_uppercase());
    println!(
        "  Heart rate:     {heart_rate} BPM ({}, normal {}-{})",
        assessment.heart_rate.as_str(),
        HEART_RATE_RANGE.start(),
        HEART_RATE_RANGE.end()
    );
    println!(
        "  Breathing rate: {breathing_rate} BPM ({}, normal {}-{})",
        assessment.breathing_rate.as_str(),
        BREATHING_RATE_RANGE.start(),
        BREATHING_RATE_RANGE.end()
    );
}
