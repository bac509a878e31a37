//! Scenario lifecycle management.
//!
//! Tracks the active scenario, its activation time, and the optional
//! automatic reversion to the default scenario once a timed scenario has
//! run its declared duration. The auto-transition check is polled by the
//! coordinator each tick, not event-driven - a stale scenario may
//! therefore persist for up to one polling interval before reverting.
//!
//! # Clock injection
//! All time-dependent methods accept a `now: DateTime<Utc>` parameter
//! rather than calling `Utc::now()` internally, so transitions are
//! deterministic in tests. `*_now` wrappers use the real clock.

use chrono::{DateTime, Duration, Utc};

use crate::model::ScenarioError;
use crate::scenario::{self, DEFAULT_SCENARIO, Scenario};

// ---------------------------------------------------------------------------
// Scenario state
// ---------------------------------------------------------------------------

/// Owned scenario context: exactly one scenario is active at a time.
///
/// This is deliberately a plain value owned by the coordinator (not a
/// process-wide global), so independent monitoring instances can coexist
/// and tests can construct as many as they like.
#[derive(Debug)]
pub struct ScenarioState {
    current: &'static Scenario,
    activated_at: DateTime<Utc>,
    /// Per-activation duration override; cleared on every switch.
    duration_override_hours: Option<i64>,
    auto_transition: bool,
}

impl ScenarioState {
    /// Starts in the default scenario with auto-transition enabled.
    pub fn new_at(now: DateTime<Utc>) -> Self {
        let current = scenario::find_scenario(DEFAULT_SCENARIO)
            .expect("default scenario is present in the registry");
        ScenarioState {
            current,
            activated_at: now,
            duration_override_hours: None,
            auto_transition: true,
        }
    }

    pub fn new() -> Self {
        Self::new_at(Utc::now())
    }

    pub fn current(&self) -> &'static Scenario {
        self.current
    }

    pub fn activated_at(&self) -> DateTime<Utc> {
        self.activated_at
    }

    pub fn auto_transition(&self) -> bool {
        self.auto_transition
    }

    /// Toggles automatic reversion. Independent flag - has no effect on
    /// the current scenario or its activation timestamp.
    pub fn set_auto_transition(&mut self, enabled: bool) {
        self.auto_transition = enabled;
    }

    /// Switches to the named scenario, resetting the activation
    /// timestamp and clearing any duration override. Unknown names are
    /// reported and leave the state untouched.
    pub fn set_scenario_at(
        &mut self,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<&'static Scenario, ScenarioError> {
        self.set_scenario_with_duration_at(name, None, now)
    }

    /// Like `set_scenario_at`, but with a duration override (in hours)
    /// for this activation only.
    pub fn set_scenario_with_duration_at(
        &mut self,
        name: &str,
        duration_override_hours: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<&'static Scenario, ScenarioError> {
        let next = scenario::lookup(name)?;
        self.current = next;
        self.activated_at = now;
        self.duration_override_hours = duration_override_hours;
        Ok(next)
    }

    pub fn set_scenario(&mut self, name: &str) -> Result<&'static Scenario, ScenarioError> {
        self.set_scenario_at(name, Utc::now())
    }

    /// Duration governing this activation: the override if one was
    /// given, otherwise the scenario's registry duration. `None` means
    /// continuous.
    pub fn effective_duration_hours(&self) -> Option<i64> {
        self.duration_override_hours.or(self.current.duration_hours)
    }

    /// Time the current scenario has been active.
    pub fn elapsed_at(&self, now: DateTime<Utc>) -> Duration {
        now - self.activated_at
    }

    /// True when the active scenario has a duration, auto-transition is
    /// enabled, and elapsed time has reached that duration. Scenarios
    /// without a duration never transition.
    pub fn should_auto_transition_at(&self, now: DateTime<Utc>) -> bool {
        if !self.auto_transition {
            return false;
        }
        let Some(duration_hours) = self.effective_duration_hours() else {
            return false;
        };
        self.elapsed_at(now) >= Duration::hours(duration_hours)
    }

    pub fn should_auto_transition(&self) -> bool {
        self.should_auto_transition_at(Utc::now())
    }

    /// Reverts to the default scenario, resetting the activation time.
    pub fn revert_to_default_at(&mut self, now: DateTime<Utc>) -> &'static Scenario {
        self.set_scenario_at(DEFAULT_SCENARIO, now)
            .expect("default scenario is present in the registry")
    }
}

impl Default for ScenarioState {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
