//! Risk band classification.
//!
//! Maps a flood probability to one of four ordinal risk bands via fixed
//! thresholds. Bands are left-inclusive and right-exclusive except the
//! top band, which is closed at 1.0.

use crate::model::RiskLevel;

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Probabilities at or above this are at least MILD.
pub const MILD_THRESHOLD: f64 = 0.4;

/// Probabilities at or above this are at least HIGH (the alerting floor).
pub const HIGH_THRESHOLD: f64 = 0.6;

/// Probabilities at or above this are SEVERE.
pub const SEVERE_THRESHOLD: f64 = 0.8;

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Clamps a probability into [0, 1].
///
/// This is the single clamping policy applied immediately before
/// classification, wherever classification happens - external models can
/// report values slightly outside the unit interval and must not produce
/// an unclassifiable reading. NaN is treated as 0.0 (no evidence of
/// risk beats an unclassifiable alert).
pub fn clamp_probability(probability: f64) -> f64 {
    if probability.is_nan() {
        return 0.0;
    }
    probability.clamp(0.0, 1.0)
}

/// Classifies a probability into a risk band.
///
/// Pure and total: the input is clamped into [0, 1] first, so every f64
/// maps to exactly one band.
pub fn classify(probability: f64) -> RiskLevel {
    let p = clamp_probability(probability);
    if p >= SEVERE_THRESHOLD {
        RiskLevel::Severe
    } else if p >= HIGH_THRESHOLD {
        RiskLevel::High
    } else if p >= MILD_THRESHOLD {
        RiskLevel::Mild
    } else {
        RiskLevel::Low
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_boundaries() {
        // Left-inclusive bands: the threshold value belongs to the band above.
        assert_eq!(classify(0.39), RiskLevel::Low);
        assert_eq!(classify(0.40), RiskLevel::Mild);
        assert_eq!(classify(0.59), RiskLevel::Mild);
        assert_eq!(classify(0.60), RiskLevel::High);
        assert_eq!(classify(0.79), RiskLevel::High);
        assert_eq!(classify(0.80), RiskLevel::Severe);
        assert_eq!(classify(1.0), RiskLevel::Severe);
    }

    #[test]
    fn test_extremes() {
        assert_eq!(classify(0.0), RiskLevel::Low);
        assert_eq!(classify(0.9999), RiskLevel::Severe);
    }

    #[test]
    fn test_out_of_range_inputs_are_clamped() {
        // An external model can report slightly out-of-range values;
        // they clamp to the nearest band rather than panicking.
        assert_eq!(classify(-0.25), RiskLevel::Low);
        assert_eq!(classify(1.7), RiskLevel::Severe);
    }

    #[test]
    fn test_nan_classifies_as_low() {
        assert_eq!(classify(f64::NAN), RiskLevel::Low);
        assert_eq!(clamp_probability(f64::NAN), 0.0);
    }

    #[test]
    fn test_classification_is_idempotent() {
        for p in [0.0, 0.39, 0.40, 0.59, 0.60, 0.79, 0.80, 0.95, 1.0] {
            assert_eq!(classify(p), classify(p), "classify({}) not stable", p);
        }
    }

    #[test]
    fn test_thresholds_are_ordered() {
        assert!(MILD_THRESHOLD < HIGH_THRESHOLD);
        assert!(HIGH_THRESHOLD < SEVERE_THRESHOLD);
        assert!(SEVERE_THRESHOLD < 1.0);
    }
}
