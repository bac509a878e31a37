//! Monitoring coordinator.
//!
//! Owns the whole pipeline - scenario state, generator, notifier,
//! fan-out hub, optional advisor - as one explicit context object, and
//! runs the periodic generation loop as its single producer. Control
//! arrives over a command channel, decoupling whoever produces commands
//! (stdin, an API layer, a test) from the scheduling loop.
//!
//! A tick is strictly sequential: ticks never overlap, and `Stop` lets
//! the in-flight tick finish before the loop exits. No failure inside a
//! tick terminates the loop - every collaborator degrades internally and
//! the coordinator just logs and moves on to the next tick.

use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::advisor::{FloodAdvisor, LocationContext};
use crate::alert::notifier::AlertNotifier;
use crate::fanout::{self, FanoutHub};
use crate::generator::ReadingGenerator;
use crate::lifecycle::ScenarioState;
use crate::logging::{self, Component};
use crate::model::{DispatchSummary, RiskLevel, SensorReading};
use crate::risk;

// ---------------------------------------------------------------------------
// Interval bounds
// ---------------------------------------------------------------------------

/// Fastest permitted generation cadence.
pub const MIN_INTERVAL_SECS: u64 = 5;

/// Slowest permitted generation cadence.
pub const MAX_INTERVAL_SECS: u64 = 120;

/// Clamps a requested interval into the permitted band.
pub fn clamp_interval_secs(secs: u64) -> u64 {
    secs.clamp(MIN_INTERVAL_SECS, MAX_INTERVAL_SECS)
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Control messages consumed by the run loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ChangeScenario(String),
    SetInterval(u64),
    ToggleAutoTransition,
    Status,
    Stop,
}

impl Command {
    /// Parses one control line. Accepted forms:
    ///   scenario <name> | interval <secs> | auto | status | stop
    pub fn parse(line: &str) -> Option<Command> {
        let mut words = line.split_whitespace();
        match words.next()? {
            "scenario" => Some(Command::ChangeScenario(words.next()?.to_string())),
            "interval" => words.next()?.parse().ok().map(Command::SetInterval),
            "auto" => Some(Command::ToggleAutoTransition),
            "status" => Some(Command::Status),
            "stop" | "quit" | "q" => Some(Command::Stop),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct MonitorStatus {
    pub scenario: &'static str,
    pub auto_transition: bool,
    pub interval_secs: u64,
    pub total_readings: u64,
    pub uptime_secs: i64,
    pub listener_count: usize,
}

/// What one tick produced; returned for tests and callers that embed
/// the coordinator.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub reading: SensorReading,
    pub risk_level: RiskLevel,
    pub dispatch: Option<DispatchSummary>,
    pub delivered: usize,
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

pub struct MonitorCoordinator {
    state: ScenarioState,
    generator: ReadingGenerator,
    notifier: AlertNotifier,
    hub: Arc<FanoutHub>,
    advisor: Option<FloodAdvisor>,
    location: LocationContext,
    interval_secs: u64,
    total_readings: u64,
    started_at: DateTime<Utc>,
}

impl MonitorCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        generator: ReadingGenerator,
        notifier: AlertNotifier,
        hub: Arc<FanoutHub>,
        advisor: Option<FloodAdvisor>,
        location: LocationContext,
        interval_secs: u64,
        now: DateTime<Utc>,
    ) -> Self {
        MonitorCoordinator {
            state: ScenarioState::new_at(now),
            generator,
            notifier,
            hub,
            advisor,
            location,
            interval_secs: clamp_interval_secs(interval_secs),
            total_readings: 0,
            started_at: now,
        }
    }

    pub fn scenario_state(&self) -> &ScenarioState {
        &self.state
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> MonitorStatus {
        MonitorStatus {
            scenario: self.state.current().name,
            auto_transition: self.state.auto_transition(),
            interval_secs: self.interval_secs,
            total_readings: self.total_readings,
            uptime_secs: (now - self.started_at).num_seconds(),
            listener_count: self.hub.listener_count(),
        }
    }

    /// Runs the generation loop until `Stop` arrives. Commands received
    /// between ticks apply immediately; the loop sleeps on the channel
    /// so control stays responsive at any interval.
    pub fn run(&mut self, commands: Receiver<Command>) {
        logging::info(
            Component::System,
            None,
            &format!(
                "monitoring started: scenario '{}', interval {}s",
                self.state.current().name,
                self.interval_secs
            ),
        );

        let mut channel_open = true;
        let mut next_tick = Instant::now();
        loop {
            while channel_open {
                let wait = next_tick.saturating_duration_since(Instant::now());
                match commands.recv_timeout(wait) {
                    Ok(Command::Stop) => {
                        logging::info(Component::System, None, "monitoring stopped");
                        return;
                    }
                    Ok(command) => self.handle_command(command, Utc::now()),
                    Err(RecvTimeoutError::Timeout) => break,
                    Err(RecvTimeoutError::Disconnected) => {
                        // Control side went away; keep generating on the timer.
                        channel_open = false;
                    }
                }
            }
            if !channel_open {
                std::thread::sleep(next_tick.saturating_duration_since(Instant::now()));
            }

            let now = Utc::now();
            self.poll_auto_transition(now);
            self.tick(now);
            next_tick = Instant::now() + Duration::from_secs(self.interval_secs);
        }
    }

    /// Applies one command. `Stop` is handled by the run loop.
    pub fn handle_command(&mut self, command: Command, now: DateTime<Utc>) {
        match command {
            Command::ChangeScenario(name) => {
                let old = self.state.current().name;
                match self.state.set_scenario_at(&name, now) {
                    Ok(scenario) => {
                        logging::info(
                            Component::Lifecycle,
                            None,
                            &format!("scenario changed: {} -> {}", old, scenario.name),
                        );
                        self.hub.broadcast(&fanout::scenario_change_payload(
                            old,
                            scenario,
                            self.interval_secs,
                        ));
                    }
                    Err(e) => {
                        logging::warn(Component::Lifecycle, None, &e.to_string());
                    }
                }
            }
            Command::SetInterval(secs) => {
                self.interval_secs = clamp_interval_secs(secs);
                logging::info(
                    Component::System,
                    None,
                    &format!("generation interval set to {}s", self.interval_secs),
                );
            }
            Command::ToggleAutoTransition => {
                let enabled = !self.state.auto_transition();
                self.state.set_auto_transition(enabled);
                logging::info(
                    Component::Lifecycle,
                    None,
                    &format!(
                        "auto-transition {}",
                        if enabled { "enabled" } else { "disabled" }
                    ),
                );
            }
            Command::Status => {
                let status = self.status_at(now);
                logging::info(
                    Component::System,
                    None,
                    &format!(
                        "scenario '{}' | auto {} | interval {}s | readings {} | uptime {}s | listeners {}",
                        status.scenario,
                        if status.auto_transition { "on" } else { "off" },
                        status.interval_secs,
                        status.total_readings,
                        status.uptime_secs,
                        status.listener_count
                    ),
                );
            }
            Command::Stop => {}
        }
    }

    /// Polled auto-transition check; reverts an expired timed scenario
    /// to the default one. Up to one interval of latency by design.
    fn poll_auto_transition(&mut self, now: DateTime<Utc>) {
        if !self.state.should_auto_transition_at(now) {
            return;
        }
        let old = self.state.current().name;
        let next = self.state.revert_to_default_at(now);
        logging::info(
            Component::Lifecycle,
            None,
            &format!("scenario '{}' expired, reverting to '{}'", old, next.name),
        );
        self.hub.broadcast(&fanout::scenario_change_payload(
            old,
            next,
            self.interval_secs,
        ));
    }

    /// One generation tick: generate, classify, alert, broadcast.
    pub fn tick(&mut self, now: DateTime<Utc>) -> TickReport {
        let scenario = self.state.current();
        let reading = self.generator.generate(scenario, now);
        let risk_level = risk::classify(reading.probability);

        let dispatch = if risk_level >= RiskLevel::High {
            Some(
                self.notifier
                    .notify_all(risk_level, reading.probability, now),
            )
        } else {
            None
        };

        let payload = fanout::reading_payload(&reading, risk_level, dispatch.as_ref());
        let delivered = self.hub.broadcast(&payload);

        if risk_level == RiskLevel::Severe {
            if let Some(advisor) = &self.advisor {
                let recommendation = advisor.recommend_at(&reading, &self.location, now);
                logging::info(Component::Advisory, None, &recommendation.summary);
            }
        }

        self.total_readings += 1;
        logging::info(
            Component::Generator,
            Some(scenario.name),
            &format!(
                "{} {:.3} | reading #{} | {} listeners",
                risk_level, reading.probability, self.total_readings, delivered
            ),
        );

        TickReport {
            reading,
            risk_level,
            dispatch,
            delivered,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
