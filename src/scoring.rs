//! Flood probability scoring.
//!
//! One parameterized scoring strategy replaces the assortment of
//! near-identical probability formulas the demo accumulated over time:
//!
//! - `SyntheticWeighted` draws a base probability from the scenario's
//!   risk range and adjusts it with a fixed signed weighted sum over the
//!   key factors. This is synthetic test data, not a calibrated model.
//! - `ModelBacked` runs a pre-trained regression artifact as an opaque
//!   deterministic pipeline, always in the fixed order
//!   expand -> normalize -> score.
//!
//! The scoring pipeline is stateless: every call scores exactly the
//! feature vector it is given.

use rand::Rng;
use serde::Deserialize;

use crate::model::{FACTOR_COUNT, Factor};
use crate::scenario::Scenario;

// ---------------------------------------------------------------------------
// Synthetic scoring constants
// ---------------------------------------------------------------------------

/// Factor values are normalized against this scale before weighting.
pub const FACTOR_VALUE_SCALE: f64 = 16.0;

/// Synthetic probabilities never leave this band. The band shapes the
/// generated data; it is NOT the classification clamp (see `risk`).
pub const SYNTHETIC_FLOOR: f64 = 0.15;
pub const SYNTHETIC_CEIL: f64 = 0.95;

/// Uniform jitter applied to every synthetic probability.
pub const SYNTHETIC_JITTER: f64 = 0.05;

/// Signed weights of the key factors in the synthetic weighted sum.
/// Negative weights mark protective factors (good drainage and river
/// management reduce risk); their normalized values are inverted before
/// weighting.
pub const SYNTHETIC_WEIGHTS: &[(Factor, f64)] = &[
    (Factor::MonsoonIntensity, 0.25),
    (Factor::DrainageSystems, -0.20),
    (Factor::RiverManagement, -0.15),
    (Factor::Landslides, 0.15),
    (Factor::Urbanization, 0.10),
    (Factor::ClimateChange, 0.08),
    (Factor::IneffectiveDisasterPreparedness, 0.07),
];

// ---------------------------------------------------------------------------
// Synthetic weighted scoring
// ---------------------------------------------------------------------------

/// Weighted adjustment for a factor vector, in probability units.
/// Deterministic; the random parts of synthesis live in
/// `synthetic_probability`.
pub fn weighted_adjustment(factors: &[u8; FACTOR_COUNT]) -> f64 {
    let mut score = 0.0;
    for &(factor, weight) in SYNTHETIC_WEIGHTS {
        let mut normalized = f64::from(factors[factor.index()]) / FACTOR_VALUE_SCALE;
        if weight < 0.0 {
            normalized = 1.0 - normalized;
        }
        score += normalized * weight;
    }
    score
}

/// Synthesizes a probability for a factor vector generated under the
/// given scenario: base draw from the scenario's risk range, plus the
/// weighted adjustment, plus jitter, clamped into the synthetic band.
pub fn synthetic_probability<R: Rng + ?Sized>(
    scenario: &Scenario,
    factors: &[u8; FACTOR_COUNT],
    rng: &mut R,
) -> f64 {
    let (lo, hi) = scenario.risk_range;
    let base = rng.gen_range(lo..hi);
    let jitter = rng.gen_range(-SYNTHETIC_JITTER..SYNTHETIC_JITTER);
    (base + weighted_adjustment(factors) + jitter).clamp(SYNTHETIC_FLOOR, SYNTHETIC_CEIL)
}

// ---------------------------------------------------------------------------
// Scoring errors
// ---------------------------------------------------------------------------

/// Errors that can arise when loading or running a scoring artifact.
#[derive(Debug, PartialEq)]
pub enum ScoringError {
    /// The artifact file could not be read.
    Io(String),
    /// The artifact file could not be deserialized.
    Parse(String),
    /// A pipeline stage received a vector of the wrong length.
    DimensionMismatch {
        stage: &'static str,
        expected: usize,
        got: usize,
    },
}

impl std::fmt::Display for ScoringError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoringError::Io(msg) => write!(f, "artifact read error: {}", msg),
            ScoringError::Parse(msg) => write!(f, "artifact parse error: {}", msg),
            ScoringError::DimensionMismatch {
                stage,
                expected,
                got,
            } => write!(
                f,
                "dimension mismatch in {} stage: expected {}, got {}",
                stage, expected, got
            ),
        }
    }
}

impl std::error::Error for ScoringError {}

// ---------------------------------------------------------------------------
// Model-backed pipeline stages
// ---------------------------------------------------------------------------

/// Degree-2 polynomial feature expansion: optional bias, the raw
/// features, then every pairwise product `x_i * x_j` for `i <= j`, in
/// that order. Matches the layout the training side exports.
#[derive(Debug, Clone, Deserialize)]
pub struct PolynomialExpansion {
    pub include_bias: bool,
}

impl PolynomialExpansion {
    /// Output length for a given input length.
    pub fn output_len(&self, input_len: usize) -> usize {
        let bias = if self.include_bias { 1 } else { 0 };
        bias + input_len + input_len * (input_len + 1) / 2
    }

    /// Expands a feature vector. Infallible: any input length expands.
    pub fn expand(&self, features: &[f64]) -> Vec<f64> {
        let mut expanded = Vec::with_capacity(self.output_len(features.len()));
        if self.include_bias {
            expanded.push(1.0);
        }
        expanded.extend_from_slice(features);
        for i in 0..features.len() {
            for j in i..features.len() {
                expanded.push(features[i] * features[j]);
            }
        }
        expanded
    }
}

/// Affine rescale: `(x - offset) / scale`, per expanded feature.
/// Zero scales are treated as 1.0 (constant features pass through
/// centered), matching the training-side scaler.
#[derive(Debug, Clone, Deserialize)]
pub struct AffineScaler {
    pub offsets: Vec<f64>,
    pub scales: Vec<f64>,
}

impl AffineScaler {
    pub fn normalize(&self, features: &[f64]) -> Result<Vec<f64>, ScoringError> {
        if features.len() != self.offsets.len() {
            return Err(ScoringError::DimensionMismatch {
                stage: "normalize",
                expected: self.offsets.len(),
                got: features.len(),
            });
        }
        Ok(features
            .iter()
            .zip(self.offsets.iter().zip(self.scales.iter()))
            .map(|(x, (offset, scale))| {
                let scale = if *scale == 0.0 { 1.0 } else { *scale };
                (x - offset) / scale
            })
            .collect())
    }
}

/// Linear regression head: intercept plus dot product.
#[derive(Debug, Clone, Deserialize)]
pub struct LinearModel {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LinearModel {
    pub fn score(&self, features: &[f64]) -> Result<f64, ScoringError> {
        if features.len() != self.coefficients.len() {
            return Err(ScoringError::DimensionMismatch {
                stage: "score",
                expected: self.coefficients.len(),
                got: features.len(),
            });
        }
        let dot: f64 = features
            .iter()
            .zip(self.coefficients.iter())
            .map(|(x, c)| x * c)
            .sum();
        Ok(self.intercept + dot)
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// The complete model-backed scoring pipeline. Stages are applied in
/// fixed order: expand -> normalize -> score; the result is clamped to
/// [0, 1].
#[derive(Debug, Clone, Deserialize)]
pub struct ScoringPipeline {
    pub expansion: PolynomialExpansion,
    pub scaler: AffineScaler,
    pub model: LinearModel,
}

impl ScoringPipeline {
    /// Loads a pipeline artifact from a JSON file and validates stage
    /// dimensions against the factor count.
    pub fn from_json_file(path: &str) -> Result<Self, ScoringError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ScoringError::Io(e.to_string()))?;
        let pipeline: ScoringPipeline =
            serde_json::from_str(&raw).map_err(|e| ScoringError::Parse(e.to_string()))?;
        pipeline.validate()?;
        Ok(pipeline)
    }

    /// Checks that scaler and model dimensions agree with the expansion
    /// of a FACTOR_COUNT-length input.
    pub fn validate(&self) -> Result<(), ScoringError> {
        let expanded_len = self.expansion.output_len(FACTOR_COUNT);
        if self.scaler.offsets.len() != expanded_len {
            return Err(ScoringError::DimensionMismatch {
                stage: "normalize",
                expected: expanded_len,
                got: self.scaler.offsets.len(),
            });
        }
        if self.scaler.scales.len() != expanded_len {
            return Err(ScoringError::DimensionMismatch {
                stage: "normalize",
                expected: expanded_len,
                got: self.scaler.scales.len(),
            });
        }
        if self.model.coefficients.len() != expanded_len {
            return Err(ScoringError::DimensionMismatch {
                stage: "score",
                expected: expanded_len,
                got: self.model.coefficients.len(),
            });
        }
        Ok(())
    }

    /// Scores a factor vector. Deterministic and stateless.
    pub fn score(&self, features: &[f64; FACTOR_COUNT]) -> Result<f64, ScoringError> {
        let expanded = self.expansion.expand(features);
        let normalized = self.scaler.normalize(&expanded)?;
        let raw = self.model.score(&normalized)?;
        Ok(raw.clamp(0.0, 1.0))
    }
}

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

/// How a generated reading obtains its probability.
#[derive(Debug, Clone)]
pub enum ScoringStrategy {
    /// Synthetic weighted sum - no model required.
    SyntheticWeighted,
    /// Pre-trained regression artifact.
    ModelBacked(ScoringPipeline),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
