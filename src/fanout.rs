//! Live-update fan-out.
//!
//! Broadcasts each computed reading to every currently connected
//! listener, best-effort: a listener whose send fails is dropped from
//! the active set and never blocks delivery to the others. Join/leave
//! may interleave freely with an in-flight broadcast - the hub snapshots
//! the listener set under the lock and delivers outside it, so the
//! guarantee is at-most-once per currently-connected listener.
//!
//! The transport is abstract: anything with `send`/`close` (a WebSocket
//! wrapper, a test probe) can attach.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value, json};

use crate::logging::{self, Component};
use crate::model::{DispatchSummary, Factor, RiskLevel, SensorReading};
use crate::scenario::Scenario;

// ---------------------------------------------------------------------------
// Listener seam
// ---------------------------------------------------------------------------

/// One connected live-update channel.
pub trait Listener: Send + Sync {
    /// Delivers one text frame. An error marks the listener dead.
    fn send(&self, text: &str) -> std::io::Result<()>;
    /// Releases the underlying channel. Must be safe to call once after
    /// a failed send.
    fn close(&self);
}

// ---------------------------------------------------------------------------
// Hub
// ---------------------------------------------------------------------------

/// Registry of connected listeners, safe for concurrent
/// attach/detach/broadcast.
pub struct FanoutHub {
    listeners: Mutex<Vec<(u64, Arc<dyn Listener>)>>,
    next_id: AtomicU64,
}

impl FanoutHub {
    pub fn new() -> Self {
        FanoutHub {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a listener; the returned id identifies it for
    /// `detach`/`handle_inbound`.
    pub fn attach(&self, listener: Arc<dyn Listener>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().unwrap().push((id, listener));
        logging::info(
            Component::Fanout,
            None,
            &format!("listener {} connected ({} active)", id, self.listener_count()),
        );
        id
    }

    /// Removes and closes a listener. Unknown ids are a no-op (the
    /// listener may already have been dropped by a failed broadcast).
    pub fn detach(&self, id: u64) {
        let removed = {
            let mut listeners = self.listeners.lock().unwrap();
            match listeners.iter().position(|(lid, _)| *lid == id) {
                Some(index) => Some(listeners.remove(index)),
                None => None,
            }
        };
        if let Some((_, listener)) = removed {
            listener.close();
            logging::info(
                Component::Fanout,
                None,
                &format!("listener {} disconnected ({} active)", id, self.listener_count()),
            );
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }

    /// Delivers a payload to every connected listener; failed listeners
    /// are removed and closed after delivery completes. Returns the
    /// number of successful deliveries.
    pub fn broadcast(&self, payload: &str) -> usize {
        let snapshot: Vec<(u64, Arc<dyn Listener>)> =
            self.listeners.lock().unwrap().clone();

        let mut delivered = 0;
        let mut dead = Vec::new();
        for (id, listener) in &snapshot {
            match listener.send(payload) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    logging::warn(
                        Component::Fanout,
                        None,
                        &format!("dropping listener {}: {}", id, e),
                    );
                    dead.push(*id);
                }
            }
        }

        for id in dead {
            self.detach(id);
        }
        delivered
    }

    /// Handles one inbound control frame from a listener. A `ping` is
    /// answered with a pong on that listener only; anything else is
    /// ignored. A failed pong drops the listener.
    pub fn handle_inbound(&self, id: u64, raw: &str) {
        let Ok(value) = serde_json::from_str::<Value>(raw) else {
            return;
        };
        if value.get("type").and_then(Value::as_str) != Some("ping") {
            return;
        }

        let listener = self
            .listeners
            .lock()
            .unwrap()
            .iter()
            .find(|(lid, _)| *lid == id)
            .map(|(_, l)| l.clone());

        if let Some(listener) = listener {
            if listener.send(&pong_payload()).is_err() {
                self.detach(id);
            }
        }
    }
}

impl Default for FanoutHub {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Payload builders
// ---------------------------------------------------------------------------

/// The `sensor_reading` message: every factor by name, the probability,
/// risk band, scenario, and (when a dispatch pass ran) its counts.
pub fn reading_payload(
    reading: &SensorReading,
    risk_level: RiskLevel,
    dispatch: Option<&DispatchSummary>,
) -> String {
    let mut data = Map::new();
    data.insert(
        "timestamp".to_string(),
        Value::String(reading.taken_at.to_rfc3339()),
    );
    for factor in Factor::ALL {
        data.insert(
            factor.name().to_string(),
            Value::from(reading.factor(factor)),
        );
    }
    data.insert("flood_probability".to_string(), json!(reading.probability));
    data.insert(
        "risk_level".to_string(),
        Value::String(risk_level.as_str().to_string()),
    );
    data.insert(
        "scenario".to_string(),
        Value::String(reading.scenario.to_string()),
    );
    data.insert(
        "alert_issued".to_string(),
        Value::Bool(risk_level >= RiskLevel::High),
    );
    if let Some(summary) = dispatch {
        data.insert(
            "sms_dispatch".to_string(),
            json!({
                "recipients_considered": summary.considered,
                "alerts_sent": summary.sent,
                "alerts_failed": summary.failed,
            }),
        );
    }

    json!({ "type": "sensor_reading", "data": Value::Object(data) }).to_string()
}

/// The `scenario_change` message.
pub fn scenario_change_payload(
    old_scenario: &str,
    new_scenario: &Scenario,
    interval_secs: u64,
) -> String {
    json!({
        "type": "scenario_change",
        "data": {
            "old_scenario": old_scenario,
            "new_scenario": new_scenario.name,
            "title": new_scenario.title,
            "description": new_scenario.description,
            "interval_secs": interval_secs,
        }
    })
    .to_string()
}

pub fn pong_payload() -> String {
    json!({ "type": "pong" }).to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::AtomicBool;

    /// Test listener: records frames, can be told to fail, counts closes.
    struct Probe {
        frames: Mutex<Vec<String>>,
        fail: AtomicBool,
        closed: AtomicBool,
    }

    impl Probe {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Probe {
                frames: Mutex::new(Vec::new()),
                fail: AtomicBool::new(fail),
                closed: AtomicBool::new(false),
            })
        }

        fn frames(&self) -> Vec<String> {
            self.frames.lock().unwrap().clone()
        }
    }

    impl Listener for Probe {
        fn send(&self, text: &str) -> std::io::Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(std::io::Error::other("connection reset"));
            }
            self.frames.lock().unwrap().push(text.to_string());
            Ok(())
        }

        fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn demo_reading() -> SensorReading {
        SensorReading {
            taken_at: Utc::now(),
            factors: [5; crate::model::FACTOR_COUNT],
            probability: 0.82,
            scenario: "flood",
        }
    }

    #[test]
    fn test_broadcast_reaches_all_healthy_listeners() {
        let hub = FanoutHub::new();
        let a = Probe::new(false);
        let b = Probe::new(false);
        hub.attach(a.clone());
        hub.attach(b.clone());

        assert_eq!(hub.broadcast("hello"), 2);
        assert_eq!(a.frames(), vec!["hello"]);
        assert_eq!(b.frames(), vec!["hello"]);
    }

    #[test]
    fn test_failing_listener_is_isolated_and_dropped() {
        let hub = FanoutHub::new();
        let first = Probe::new(false);
        let failing = Probe::new(true);
        let third = Probe::new(false);
        hub.attach(first.clone());
        hub.attach(failing.clone());
        hub.attach(third.clone());

        // Listeners 1 and 3 still receive; listener 2 is gone afterwards.
        assert_eq!(hub.broadcast("msg"), 2);
        assert_eq!(first.frames(), vec!["msg"]);
        assert_eq!(third.frames(), vec!["msg"]);
        assert!(failing.frames().is_empty());
        assert_eq!(hub.listener_count(), 2);
        assert!(failing.closed.load(Ordering::SeqCst));

        // The next broadcast no longer attempts the dead listener.
        assert_eq!(hub.broadcast("again"), 2);
    }

    #[test]
    fn test_detach_is_idempotent() {
        let hub = FanoutHub::new();
        let probe = Probe::new(false);
        let id = hub.attach(probe.clone());
        hub.detach(id);
        hub.detach(id); // already gone - no-op
        assert_eq!(hub.listener_count(), 0);
    }

    #[test]
    fn test_ping_is_answered_with_pong_on_that_listener_only() {
        let hub = FanoutHub::new();
        let pinger = Probe::new(false);
        let other = Probe::new(false);
        let id = hub.attach(pinger.clone());
        hub.attach(other.clone());

        hub.handle_inbound(id, r#"{"type":"ping"}"#);
        assert_eq!(pinger.frames(), vec![pong_payload()]);
        assert!(other.frames().is_empty());
    }

    #[test]
    fn test_non_ping_and_garbage_inbound_are_ignored() {
        let hub = FanoutHub::new();
        let probe = Probe::new(false);
        let id = hub.attach(probe.clone());

        hub.handle_inbound(id, r#"{"type":"subscribe"}"#);
        hub.handle_inbound(id, "not json at all");
        assert!(probe.frames().is_empty());
        assert_eq!(hub.listener_count(), 1);
    }

    #[test]
    fn test_reading_payload_carries_factors_risk_and_dispatch() {
        let summary = DispatchSummary {
            considered: 3,
            sent: 2,
            failed: 1,
        };
        let payload = reading_payload(&demo_reading(), RiskLevel::Severe, Some(&summary));
        let value: Value = serde_json::from_str(&payload).unwrap();

        assert_eq!(value["type"], "sensor_reading");
        let data = &value["data"];
        assert_eq!(data["monsoon_intensity"], 5);
        assert_eq!(data["political_factors"], 5);
        assert_eq!(data["flood_probability"], 0.82);
        assert_eq!(data["risk_level"], "SEVERE");
        assert_eq!(data["scenario"], "flood");
        assert_eq!(data["alert_issued"], true);
        assert_eq!(data["sms_dispatch"]["alerts_sent"], 2);
    }

    #[test]
    fn test_reading_payload_omits_dispatch_when_no_pass_ran() {
        let payload = reading_payload(&demo_reading(), RiskLevel::Mild, None);
        let value: Value = serde_json::from_str(&payload).unwrap();
        assert!(value["data"].get("sms_dispatch").is_none());
        assert_eq!(value["data"]["alert_issued"], false);
    }
}
