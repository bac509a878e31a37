//! Alert cool-down policy.
//!
//! A recipient who was alerted recently is not alerted again until the
//! cool-down window has elapsed, however high the risk stays. This keeps
//! a sustained flood event from turning into an SMS flood of its own.
//!
//! This window is its own policy with its own configuration knob; it is
//! unrelated to any model warm-up gating and must stay that way.
//!
//! # Clock injection
//! `is_cooled_down_at` accepts `now` rather than reading the system
//! clock, so the timing rules are deterministic in tests.

use chrono::{DateTime, Duration, Utc};

/// Default minimum time between two alerts to the same recipient.
pub const DEFAULT_COOLDOWN_MINUTES: i64 = 60;

/// Returns `true` if a new alert may be dispatched to a recipient whose
/// last alert went out at `last_alert`.
///
/// A recipient who has never been alerted is always eligible. Otherwise
/// the window is inclusive at the boundary:
///   elapsed >= cooldown  ->  eligible
///   elapsed <  cooldown  ->  suppressed
pub fn is_cooled_down_at(
    last_alert: Option<DateTime<Utc>>,
    cooldown_minutes: i64,
    now: DateTime<Utc>,
) -> bool {
    match last_alert {
        None => true,
        Some(sent_at) => now - sent_at >= Duration::minutes(cooldown_minutes),
    }
}

/// Convenience wrapper using the real clock. Use `is_cooled_down_at` in
/// tests to keep them deterministic.
pub fn is_cooled_down(last_alert: Option<DateTime<Utc>>, cooldown_minutes: i64) -> bool {
    is_cooled_down_at(last_alert, cooldown_minutes, Utc::now())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
