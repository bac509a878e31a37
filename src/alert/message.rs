//! Alert message rendering.
//!
//! Produces the SMS body from a fixed template parameterized by risk
//! level, the recipient's given name, and their area. Messages must stay
//! under 160 characters to fit a single SMS segment on trial provider
//! accounts.

use chrono::{DateTime, Utc};

use crate::model::RiskLevel;

/// Hard ceiling on rendered message length, in characters.
pub const MAX_MESSAGE_CHARS: usize = 160;

/// Emergency numbers quoted in high-risk alerts.
pub const EMERGENCY_NUMBERS: &str = "100/108";

/// Renders the alert text for one recipient.
///
/// Only the first whitespace token of the recipient's name is used, to
/// keep the greeting short. HIGH and SEVERE get the full call-to-action
/// template; lower bands render a one-line notice (the notifier never
/// dispatches those, but manual/test sends still need a body).
pub fn render_alert(
    risk_level: RiskLevel,
    recipient_name: &str,
    area: &str,
    now: DateTime<Utc>,
) -> String {
    let given_name = recipient_name.split_whitespace().next().unwrap_or("there");

    match risk_level {
        RiskLevel::High | RiskLevel::Severe => format!(
            "FLOOD ALERT - {}\nHi {},\nHigh flood risk in {}.\nMove to higher ground!\nEmergency: {}\n{}",
            risk_level,
            given_name,
            area,
            EMERGENCY_NUMBERS,
            now.format("%d/%m %H:%M"),
        ),
        RiskLevel::Low | RiskLevel::Mild => {
            format!("Flood Alert - {} risk in {}. Stay safe!", risk_level, area)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 15, 14, 30, 0).unwrap()
    }

    #[test]
    fn test_high_risk_message_uses_first_name_token_only() {
        let message = render_alert(RiskLevel::High, "Asha Rawat Negi", "Rispana", fixed_now());
        assert!(message.contains("Hi Asha,"), "got: {}", message);
        assert!(!message.contains("Rawat"));
    }

    #[test]
    fn test_severe_message_contains_call_to_action() {
        let message = render_alert(RiskLevel::Severe, "Ravi", "Clock Tower", fixed_now());
        assert!(message.starts_with("FLOOD ALERT - SEVERE"));
        assert!(message.contains("Clock Tower"));
        assert!(message.contains("Move to higher ground!"));
        assert!(message.contains(EMERGENCY_NUMBERS));
        assert!(message.contains("15/07 14:30"));
    }

    #[test]
    fn test_low_bands_render_short_notice() {
        let message = render_alert(RiskLevel::Mild, "Ravi", "Paltan Bazaar", fixed_now());
        assert_eq!(message, "Flood Alert - MILD risk in Paltan Bazaar. Stay safe!");
    }

    #[test]
    fn test_messages_fit_one_sms_segment() {
        // Worst realistic case: long name token, long area name.
        let long_area = "Deteriorated Eastern Drainage Canal Resettlement Colony";
        for level in [
            RiskLevel::Low,
            RiskLevel::Mild,
            RiskLevel::High,
            RiskLevel::Severe,
        ] {
            let message = render_alert(level, "Lakshminarayanan", long_area, fixed_now());
            assert!(
                message.chars().count() <= MAX_MESSAGE_CHARS,
                "{} message is {} chars: {}",
                level,
                message.chars().count(),
                message
            );
        }
    }

    #[test]
    fn test_empty_name_falls_back_to_generic_greeting() {
        let message = render_alert(RiskLevel::High, "   ", "Bindal", fixed_now());
        assert!(message.contains("Hi there,"));
    }
}
