//! Scenario registry for the Dehradun flood monitoring demo.
//!
//! Defines the canonical set of weather/risk regimes the generator can
//! run under, along with their per-factor value ranges, base risk range,
//! and optional duration. This is the single source of truth for
//! scenario names - all other modules should look scenarios up here
//! rather than hardcoding names.

use crate::model::{FACTOR_COUNT, Factor, ScenarioError};

// ---------------------------------------------------------------------------
// Scenario metadata
// ---------------------------------------------------------------------------

/// Inclusive [min, max] value range for one factor under one scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FactorRange {
    pub min: u8,
    pub max: u8,
}

const fn range(min: u8, max: u8) -> FactorRange {
    FactorRange { min, max }
}

/// A named weather/risk regime.
#[derive(Debug)]
pub struct Scenario {
    /// Stable lookup key (snake_case).
    pub name: &'static str,
    /// Human-readable title.
    pub title: &'static str,
    /// What this regime represents.
    pub description: &'static str,
    /// Base flood-probability range synthesized readings draw from.
    pub risk_range: (f64, f64),
    /// Auto-transition horizon. `None` means continuous - the scenario
    /// never reverts on its own.
    pub duration_hours: Option<i64>,
    /// Per-factor inclusive ranges, indexed by `Factor`.
    pub factor_ranges: [FactorRange; FACTOR_COUNT],
}

impl Scenario {
    /// Range for a single factor under this scenario.
    pub fn factor_range(&self, factor: Factor) -> FactorRange {
        self.factor_ranges[factor.index()]
    }
}

/// Scenario the lifecycle manager reverts to after a timed scenario
/// expires, and the one monitoring starts under.
pub const DEFAULT_SCENARIO: &str = "normal";

/// All scenarios the service can run, ordered from calmest to most
/// severe, with the dry-season regimes at the end.
///
/// Factor ranges are listed in model feature order:
///   monsoon_intensity, topography_drainage, river_management,
///   deforestation, urbanization, climate_change, dams_quality,
///   siltation, agricultural_practices, encroachments,
///   ineffective_disaster_preparedness, drainage_systems,
///   coastal_vulnerability, landslides, watersheds,
///   deteriorating_infrastructure, population_score, wetland_loss,
///   inadequate_planning, political_factors
pub static SCENARIO_REGISTRY: &[Scenario] = &[
    Scenario {
        name: "normal",
        title: "Normal Weather",
        description: "Typical weather conditions with low flood risk.",
        risk_range: (0.10, 0.40),
        duration_hours: None, // the resting state - runs until changed
        factor_ranges: [
            range(2, 6),  // monsoon_intensity
            range(3, 7),  // topography_drainage
            range(2, 6),  // river_management
            range(2, 6),  // deforestation
            range(3, 7),  // urbanization
            range(3, 7),  // climate_change
            range(3, 7),  // dams_quality
            range(1, 5),  // siltation
            range(2, 6),  // agricultural_practices
            range(2, 6),  // encroachments
            range(3, 7),  // ineffective_disaster_preparedness
            range(2, 6),  // drainage_systems
            range(1, 3),  // coastal_vulnerability - inland city
            range(3, 7),  // landslides - moderate, foothill terrain
            range(2, 6),  // watersheds
            range(3, 7),  // deteriorating_infrastructure
            range(4, 8),  // population_score - growing city
            range(3, 6),  // wetland_loss
            range(3, 7),  // inadequate_planning
            range(2, 6),  // political_factors
        ],
    },
    Scenario {
        name: "heavy_rain",
        title: "Heavy Rainfall",
        description: "Intense rainfall with increased flood risk.",
        risk_range: (0.40, 0.70),
        duration_hours: Some(6),
        factor_ranges: [
            range(7, 12), // monsoon_intensity
            range(3, 7),  // topography_drainage
            range(3, 6),  // river_management
            range(4, 8),  // deforestation
            range(5, 8),  // urbanization
            range(6, 9),  // climate_change
            range(3, 6),  // dams_quality
            range(4, 7),  // siltation
            range(3, 6),  // agricultural_practices
            range(4, 7),  // encroachments
            range(5, 8),  // ineffective_disaster_preparedness
            range(2, 6),  // drainage_systems - overwhelmed drainage
            range(1, 3),  // coastal_vulnerability
            range(5, 9),  // landslides
            range(3, 6),  // watersheds
            range(4, 7),  // deteriorating_infrastructure
            range(5, 8),  // population_score
            range(4, 7),  // wetland_loss
            range(4, 7),  // inadequate_planning
            range(4, 7),  // political_factors
        ],
    },
    Scenario {
        name: "flood",
        title: "Flood Event",
        description: "Active flooding with high risk.",
        risk_range: (0.70, 0.95),
        duration_hours: Some(12),
        factor_ranges: [
            range(10, 16), // monsoon_intensity
            range(1, 4),   // topography_drainage
            range(1, 4),   // river_management
            range(6, 10),  // deforestation
            range(7, 10),  // urbanization
            range(8, 12),  // climate_change
            range(1, 4),   // dams_quality
            range(6, 10),  // siltation
            range(2, 5),   // agricultural_practices
            range(6, 10),  // encroachments
            range(7, 10),  // ineffective_disaster_preparedness
            range(1, 4),   // drainage_systems
            range(1, 3),   // coastal_vulnerability
            range(7, 12),  // landslides
            range(2, 5),   // watersheds
            range(6, 10),  // deteriorating_infrastructure
            range(6, 10),  // population_score
            range(5, 8),   // wetland_loss
            range(6, 10),  // inadequate_planning
            range(5, 9),   // political_factors
        ],
    },
    Scenario {
        name: "pre_monsoon",
        title: "Pre-Monsoon",
        description: "Pre-monsoon preparation phase with low risk.",
        risk_range: (0.10, 0.30),
        duration_hours: None,
        factor_ranges: [
            range(1, 4),  // monsoon_intensity
            range(5, 9),  // topography_drainage
            range(6, 9),  // river_management
            range(2, 5),  // deforestation
            range(4, 7),  // urbanization
            range(3, 6),  // climate_change
            range(6, 9),  // dams_quality
            range(2, 4),  // siltation
            range(4, 7),  // agricultural_practices
            range(2, 5),  // encroachments
            range(2, 5),  // ineffective_disaster_preparedness
            range(6, 10), // drainage_systems
            range(1, 2),  // coastal_vulnerability
            range(1, 4),  // landslides
            range(5, 8),  // watersheds
            range(2, 5),  // deteriorating_infrastructure
            range(3, 6),  // population_score
            range(2, 4),  // wetland_loss
            range(2, 5),  // inadequate_planning
            range(3, 6),  // political_factors
        ],
    },
    Scenario {
        name: "drought",
        title: "Drought Conditions",
        description: "Low water levels, minimal rain.",
        risk_range: (0.05, 0.20),
        duration_hours: None,
        factor_ranges: [
            range(0, 2),  // monsoon_intensity
            range(5, 9),  // topography_drainage
            range(6, 9),  // river_management
            range(2, 5),  // deforestation
            range(4, 7),  // urbanization
            range(7, 12), // climate_change - drought is itself a climate stress signal
            range(6, 9),  // dams_quality
            range(2, 4),  // siltation
            range(4, 7),  // agricultural_practices
            range(2, 5),  // encroachments
            range(2, 5),  // ineffective_disaster_preparedness
            range(6, 10), // drainage_systems
            range(1, 2),  // coastal_vulnerability
            range(1, 4),  // landslides
            range(5, 8),  // watersheds
            range(2, 5),  // deteriorating_infrastructure
            range(3, 6),  // population_score
            range(2, 4),  // wetland_loss
            range(2, 5),  // inadequate_planning
            range(3, 6),  // political_factors
        ],
    },
];

// ---------------------------------------------------------------------------
// Lookup helpers
// ---------------------------------------------------------------------------

/// Looks up a scenario by name. Returns `None` if not found.
pub fn find_scenario(name: &str) -> Option<&'static Scenario> {
    SCENARIO_REGISTRY.iter().find(|s| s.name == name)
}

/// Looks up a scenario by name, reporting unknown names as an error.
pub fn lookup(name: &str) -> Result<&'static Scenario, ScenarioError> {
    find_scenario(name).ok_or_else(|| ScenarioError::Unknown(name.to_string()))
}

/// Returns the names of all registered scenarios.
pub fn all_scenario_names() -> Vec<&'static str> {
    SCENARIO_REGISTRY.iter().map(|s| s.name).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_duplicate_scenario_names() {
        let mut seen = std::collections::HashSet::new();
        for scenario in SCENARIO_REGISTRY {
            assert!(
                seen.insert(scenario.name),
                "duplicate scenario name '{}' found in SCENARIO_REGISTRY",
                scenario.name
            );
        }
    }

    #[test]
    fn test_registry_contains_all_expected_scenarios() {
        let expected = ["normal", "heavy_rain", "flood", "pre_monsoon", "drought"];
        let names = all_scenario_names();
        for expected_name in &expected {
            assert!(
                names.contains(expected_name),
                "SCENARIO_REGISTRY missing expected scenario '{}'",
                expected_name
            );
        }
        assert_eq!(names.len(), expected.len());
    }

    #[test]
    fn test_default_scenario_exists_and_is_continuous() {
        let default = find_scenario(DEFAULT_SCENARIO)
            .expect("default scenario must be present in the registry");
        // The revert target must not itself expire, or the lifecycle
        // manager would bounce between scenarios.
        assert!(
            default.duration_hours.is_none(),
            "default scenario '{}' must be continuous",
            DEFAULT_SCENARIO
        );
    }

    #[test]
    fn test_factor_ranges_are_well_formed() {
        for scenario in SCENARIO_REGISTRY {
            for factor in Factor::ALL {
                let r = scenario.factor_range(factor);
                assert!(
                    r.min <= r.max,
                    "scenario '{}' factor '{}' has min {} > max {}",
                    scenario.name,
                    factor.name(),
                    r.min,
                    r.max
                );
            }
        }
    }

    #[test]
    fn test_risk_ranges_are_valid_probability_intervals() {
        for scenario in SCENARIO_REGISTRY {
            let (lo, hi) = scenario.risk_range;
            assert!(
                (0.0..=1.0).contains(&lo) && (0.0..=1.0).contains(&hi),
                "scenario '{}' risk range ({}, {}) outside [0,1]",
                scenario.name,
                lo,
                hi
            );
            assert!(
                lo < hi,
                "scenario '{}' risk range must be ascending",
                scenario.name
            );
        }
    }

    #[test]
    fn test_durations_are_positive_where_defined() {
        for scenario in SCENARIO_REGISTRY {
            if let Some(hours) = scenario.duration_hours {
                assert!(
                    hours > 0,
                    "scenario '{}' has non-positive duration {}",
                    scenario.name,
                    hours
                );
            }
        }
    }

    #[test]
    fn test_flood_scenario_shifts_ranges_as_expected() {
        // The flood regime must push monsoon intensity up and drainage
        // down relative to normal, or synthesized flood readings would
        // look like calm weather.
        let normal = find_scenario("normal").unwrap();
        let flood = find_scenario("flood").unwrap();
        assert!(
            flood.factor_range(Factor::MonsoonIntensity).min
                > normal.factor_range(Factor::MonsoonIntensity).max,
            "flood monsoon range should sit above the normal range"
        );
        assert!(
            flood.factor_range(Factor::DrainageSystems).max
                <= normal.factor_range(Factor::DrainageSystems).max,
            "flood drainage range should not exceed the normal range"
        );
    }

    #[test]
    fn test_find_scenario_returns_none_for_unknown_name() {
        assert!(find_scenario("tsunami").is_none());
        assert_eq!(
            lookup("tsunami").unwrap_err(),
            ScenarioError::Unknown("tsunami".to_string())
        );
    }
}
