//! Core data types for the Dehradun flood monitoring demo service.
//!
//! This module defines the shared domain model imported by all other modules.
//! It contains no logic and no I/O - only types.

use chrono::{DateTime, Utc};

// ---------------------------------------------------------------------------
// Environmental factors
// ---------------------------------------------------------------------------

/// Number of environmental factors in a sensor reading.
///
/// This is also the input dimension of the scoring pipeline; the factor
/// order below IS the model feature order and must never be reshuffled.
pub const FACTOR_COUNT: usize = 20;

/// The twenty environmental factors of a sensor reading, in model
/// feature order.
///
/// Values are small non-negative integers (0..=16 in practice), with
/// per-scenario ranges defined in `scenario::SCENARIO_REGISTRY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Factor {
    MonsoonIntensity,
    TopographyDrainage,
    RiverManagement,
    Deforestation,
    Urbanization,
    ClimateChange,
    DamsQuality,
    Siltation,
    AgriculturalPractices,
    Encroachments,
    IneffectiveDisasterPreparedness,
    DrainageSystems,
    CoastalVulnerability,
    Landslides,
    Watersheds,
    DeterioratingInfrastructure,
    PopulationScore,
    WetlandLoss,
    InadequatePlanning,
    PoliticalFactors,
}

impl Factor {
    /// All factors, in model feature order.
    pub const ALL: [Factor; FACTOR_COUNT] = [
        Factor::MonsoonIntensity,
        Factor::TopographyDrainage,
        Factor::RiverManagement,
        Factor::Deforestation,
        Factor::Urbanization,
        Factor::ClimateChange,
        Factor::DamsQuality,
        Factor::Siltation,
        Factor::AgriculturalPractices,
        Factor::Encroachments,
        Factor::IneffectiveDisasterPreparedness,
        Factor::DrainageSystems,
        Factor::CoastalVulnerability,
        Factor::Landslides,
        Factor::Watersheds,
        Factor::DeterioratingInfrastructure,
        Factor::PopulationScore,
        Factor::WetlandLoss,
        Factor::InadequatePlanning,
        Factor::PoliticalFactors,
    ];

    /// Position of this factor in the feature vector.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Snake-case field name used in broadcast payloads.
    pub fn name(self) -> &'static str {
        match self {
            Factor::MonsoonIntensity => "monsoon_intensity",
            Factor::TopographyDrainage => "topography_drainage",
            Factor::RiverManagement => "river_management",
            Factor::Deforestation => "deforestation",
            Factor::Urbanization => "urbanization",
            Factor::ClimateChange => "climate_change",
            Factor::DamsQuality => "dams_quality",
            Factor::Siltation => "siltation",
            Factor::AgriculturalPractices => "agricultural_practices",
            Factor::Encroachments => "encroachments",
            Factor::IneffectiveDisasterPreparedness => "ineffective_disaster_preparedness",
            Factor::DrainageSystems => "drainage_systems",
            Factor::CoastalVulnerability => "coastal_vulnerability",
            Factor::Landslides => "landslides",
            Factor::Watersheds => "watersheds",
            Factor::DeterioratingInfrastructure => "deteriorating_infrastructure",
            Factor::PopulationScore => "population_score",
            Factor::WetlandLoss => "wetland_loss",
            Factor::InadequatePlanning => "inadequate_planning",
            Factor::PoliticalFactors => "political_factors",
        }
    }
}

// ---------------------------------------------------------------------------
// Reading types
// ---------------------------------------------------------------------------

/// One synthesized sensor reading: all twenty factor values, the derived
/// flood probability, and the scenario that was active when it was
/// generated. Immutable after creation; never persisted as a first-class
/// object by this crate.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub taken_at: DateTime<Utc>,
    pub factors: [u8; FACTOR_COUNT],
    /// Flood probability in [0,1].
    pub probability: f64,
    /// Name of the scenario this reading was generated under.
    pub scenario: &'static str,
}

/// Factor values as an f64 vector in model feature order, suitable for
/// the scoring pipeline.
pub fn feature_vector(factors: &[u8; FACTOR_COUNT]) -> [f64; FACTOR_COUNT] {
    let mut features = [0.0; FACTOR_COUNT];
    for (slot, value) in features.iter_mut().zip(factors.iter()) {
        *slot = f64::from(*value);
    }
    features
}

impl SensorReading {
    /// Value of a single factor.
    pub fn factor(&self, factor: Factor) -> u8 {
        self.factors[factor.index()]
    }

    pub fn feature_vector(&self) -> [f64; FACTOR_COUNT] {
        feature_vector(&self.factors)
    }
}

// ---------------------------------------------------------------------------
// Risk levels
// ---------------------------------------------------------------------------

/// Flood risk bands, in ascending order of severity.
///
/// Derived deterministically from a probability by `risk::classify`.
/// The derived `Ord` follows declaration order, so `level >=
/// RiskLevel::High` is the "alerts fire" test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RiskLevel {
    Low,
    Mild,
    High,
    Severe,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Mild => "MILD",
            RiskLevel::High => "HIGH",
            RiskLevel::Severe => "SEVERE",
        }
    }

    /// Parse the canonical uppercase form stored in alert history rows.
    pub fn parse(value: &str) -> Option<RiskLevel> {
        match value {
            "LOW" => Some(RiskLevel::Low),
            "MILD" => Some(RiskLevel::Mild),
            "HIGH" => Some(RiskLevel::High),
            "SEVERE" => Some(RiskLevel::Severe),
            _ => None,
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Recipients and alert history
// ---------------------------------------------------------------------------

/// A registered SMS alert target.
///
/// `last_alert_sent` is the only field the pipeline mutates (through the
/// store); everything else is fixed at registration. Recipients are never
/// deleted, only deactivated.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipient {
    pub id: i64,
    pub phone: String,
    pub name: String,
    pub area: String,
    pub latitude: f64,
    pub longitude: f64,
    pub registered_at: DateTime<Utc>,
    pub is_active: bool,
    pub last_alert_sent: Option<DateTime<Utc>>,
}

/// Delivery outcome recorded for one dispatch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Failed => "failed",
        }
    }
}

/// Append-only log entry for one alert dispatch attempt, success or
/// failure. Exactly one record is written per attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertRecord {
    pub id: i64,
    pub recipient_id: i64,
    pub risk_level: RiskLevel,
    pub message: String,
    pub status: DeliveryStatus,
    pub sent_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Dispatch outcomes
// ---------------------------------------------------------------------------

/// Result of a single `maybe_notify` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Provider accepted the message; record written, timestamp updated.
    Sent,
    /// Provider rejected the message; record written, timestamp untouched.
    Failed,
    /// Risk below HIGH - suppressed regardless of timing.
    SkippedLowRisk,
    /// Recipient was alerted within the cool-down window.
    SkippedCooldown,
}

/// Aggregate counts returned by `notify_all`.
///
/// `considered` counts every active recipient examined; `sent` and
/// `failed` count actual dispatch attempts only (cool-down skips land in
/// neither bucket).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub considered: usize,
    pub sent: usize,
    pub failed: usize,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors surfaced by recipient/alert stores.
#[derive(Debug)]
pub enum StoreError {
    /// The phone identifier is already registered.
    DuplicatePhone(String),
    /// The referenced recipient id does not exist.
    UnknownRecipient(i64),
    /// Underlying backend failure (connection, query, ...).
    Backend(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::DuplicatePhone(phone) => {
                write!(f, "phone number already registered: {}", phone)
            }
            StoreError::UnknownRecipient(id) => write!(f, "unknown recipient id: {}", id),
            StoreError::Backend(msg) => write!(f, "store backend error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Errors from scenario lookup/switching.
#[derive(Debug, PartialEq, Eq)]
pub enum ScenarioError {
    /// The requested scenario name is not in the registry.
    Unknown(String),
}

impl std::fmt::Display for ScenarioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScenarioError::Unknown(name) => write!(f, "unknown scenario: {}", name),
        }
    }
}

impl std::error::Error for ScenarioError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factor_order_matches_indices() {
        for (i, factor) in Factor::ALL.iter().enumerate() {
            assert_eq!(factor.index(), i, "factor {} out of order", factor.name());
        }
    }

    #[test]
    fn test_factor_names_are_unique_snake_case() {
        let mut seen = std::collections::HashSet::new();
        for factor in Factor::ALL {
            let name = factor.name();
            assert!(seen.insert(name), "duplicate factor name '{}'", name);
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "factor name '{}' should be snake_case",
                name
            );
        }
    }

    #[test]
    fn test_risk_level_ordering() {
        assert!(RiskLevel::Low < RiskLevel::Mild);
        assert!(RiskLevel::Mild < RiskLevel::High);
        assert!(RiskLevel::High < RiskLevel::Severe);
    }

    #[test]
    fn test_risk_level_round_trips_through_str() {
        for level in [
            RiskLevel::Low,
            RiskLevel::Mild,
            RiskLevel::High,
            RiskLevel::Severe,
        ] {
            assert_eq!(RiskLevel::parse(level.as_str()), Some(level));
        }
        assert_eq!(RiskLevel::parse("CRITICAL"), None);
    }

    #[test]
    fn test_feature_vector_preserves_order() {
        let mut factors = [0u8; FACTOR_COUNT];
        factors[Factor::MonsoonIntensity.index()] = 12;
        factors[Factor::PoliticalFactors.index()] = 3;
        let reading = SensorReading {
            taken_at: Utc::now(),
            factors,
            probability: 0.5,
            scenario: "normal",
        };
        let features = reading.feature_vector();
        assert_eq!(features[0], 12.0);
        assert_eq!(features[FACTOR_COUNT - 1], 3.0);
    }
}
