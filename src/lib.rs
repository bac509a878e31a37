//! Scenario-driven flood monitoring demo service for Dehradun.
//!
//! Pipeline: the coordinator generates scenario-driven sensor readings
//! on a timer, scores them into a flood probability, classifies the risk
//! band, broadcasts each reading to connected live listeners, and
//! dispatches rate-limited SMS alerts to registered recipients when risk
//! reaches HIGH or SEVERE. An optional advisory client produces
//! flood-management recommendations with a static local fallback.

pub mod advisor;
pub mod alert;
pub mod config;
pub mod coordinator;
pub mod fanout;
pub mod generator;
pub mod lifecycle;
pub mod logging;
pub mod model;
pub mod risk;
pub mod scenario;
pub mod scoring;
pub mod sms;
pub mod store;

pub use model::{RiskLevel, SensorReading};
