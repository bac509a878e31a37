//! Rate-limited alert dispatch.
//!
//! Dispatch policy, in order: suppress everything below HIGH, then
//! consult the per-recipient cool-down, then make exactly one send
//! attempt and record its outcome. No retries - a failed send is logged
//! and counted, and the operator re-triggers if needed.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::alert::cooldown::is_cooled_down_at;
use crate::alert::message::render_alert;
use crate::logging::{self, Component};
use crate::model::{DeliveryStatus, DispatchOutcome, DispatchSummary, Recipient, RiskLevel};
use crate::sms::SmsSender;
use crate::store::RecipientStore;

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

pub struct AlertNotifier {
    store: Arc<dyn RecipientStore>,
    sender: Arc<dyn SmsSender>,
    cooldown_minutes: i64,
}

impl AlertNotifier {
    pub fn new(
        store: Arc<dyn RecipientStore>,
        sender: Arc<dyn SmsSender>,
        cooldown_minutes: i64,
    ) -> Self {
        AlertNotifier {
            store,
            sender,
            cooldown_minutes,
        }
    }

    /// Decides whether to alert one recipient and, if so, makes the
    /// single dispatch attempt and records it.
    ///
    /// On a provider accept the recipient's last-alert timestamp moves
    /// to `now` and a `sent` record is appended; on a reject a `failed`
    /// record is appended and the timestamp stays put, so the next pass
    /// retries naturally. Store failures after the attempt are logged
    /// but do not change the outcome - the SMS already left.
    pub fn maybe_notify(
        &self,
        recipient: &Recipient,
        risk_level: RiskLevel,
        probability: f64,
        now: DateTime<Utc>,
    ) -> DispatchOutcome {
        if risk_level < RiskLevel::High {
            return DispatchOutcome::SkippedLowRisk;
        }

        if !is_cooled_down_at(recipient.last_alert_sent, self.cooldown_minutes, now) {
            logging::debug(
                Component::Alert,
                Some(&recipient.phone),
                "skipping: alerted within cool-down window",
            );
            return DispatchOutcome::SkippedCooldown;
        }

        let message = render_alert(risk_level, &recipient.name, &recipient.area, now);
        let accepted = self.sender.send(&recipient.phone, &message);

        if accepted {
            if let Err(e) = self.store.set_last_alert(recipient.id, Some(now)) {
                logging::log_store_failure(&recipient.phone, "set_last_alert", &e);
            }
            if let Err(e) = self.store.append_alert(
                recipient.id,
                risk_level,
                &message,
                DeliveryStatus::Sent,
                now,
            ) {
                logging::log_store_failure(&recipient.phone, "append_alert", &e);
            }
            logging::info(
                Component::Alert,
                Some(&recipient.phone),
                &format!("alert sent ({} risk, p={:.3})", risk_level, probability),
            );
            DispatchOutcome::Sent
        } else {
            if let Err(e) = self.store.append_alert(
                recipient.id,
                risk_level,
                &message,
                DeliveryStatus::Failed,
                now,
            ) {
                logging::log_store_failure(&recipient.phone, "append_alert", &e);
            }
            DispatchOutcome::Failed
        }
    }

    /// One serialized dispatch pass over every active recipient.
    ///
    /// Per-recipient failures are isolated: one recipient's store or
    /// provider trouble never aborts the rest of the pass.
    pub fn notify_all(
        &self,
        risk_level: RiskLevel,
        probability: f64,
        now: DateTime<Utc>,
    ) -> DispatchSummary {
        if risk_level < RiskLevel::High {
            logging::debug(
                Component::Alert,
                None,
                &format!("no alerts for {} risk (HIGH/SEVERE only)", risk_level),
            );
            return DispatchSummary::default();
        }

        let recipients = match self.store.list_active() {
            Ok(recipients) => recipients,
            Err(e) => {
                logging::log_store_failure("notify_all", "list_active", &e);
                return DispatchSummary::default();
            }
        };

        let mut summary = DispatchSummary {
            considered: recipients.len(),
            ..DispatchSummary::default()
        };

        for recipient in &recipients {
            match self.maybe_notify(recipient, risk_level, probability, now) {
                DispatchOutcome::Sent => summary.sent += 1,
                DispatchOutcome::Failed => summary.failed += 1,
                DispatchOutcome::SkippedLowRisk | DispatchOutcome::SkippedCooldown => {}
            }
        }

        logging::log_dispatch_summary(summary.considered, summary.sent, summary.failed);
        summary
    }

    /// Convenience wrapper using the real clock.
    pub fn notify_all_now(&self, risk_level: RiskLevel, probability: f64) -> DispatchSummary {
        self.notify_all(risk_level, probability, Utc::now())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
