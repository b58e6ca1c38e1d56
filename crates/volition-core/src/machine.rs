//! Executor state machine with tick-driven timeouts.
//!
//! There are no timer callbacks: the owner calls [`ExecutorMachine::tick`]
//! with the current clock and every timed transition is a pure function
//! of that clock plus the machine's state. Lifecycle changes publish
//! typed [`ExecutorEvent`]s.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::events::{ExecutorEvent, Observer, ObserverSet};

/// Default ceiling on time spent in one state.
pub const MAX_STATE_DURATION_MS: i64 = 5 * 60 * 1000;
/// A state older than this is flagged stuck.
pub const STUCK_AFTER_MS: i64 = 60 * 1000;

/// Health verdict from one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineHealth {
    Nominal,
    Stuck,
    Expired,
}

/// The executor's lifecycle machine.
pub struct ExecutorMachine {
    state: String,
    entered_at: DateTime<Utc>,
    max_state_duration: Duration,
    stuck_after: Duration,
    stuck_flagged: bool,
    paused: bool,
    stopped: bool,
    observers: ObserverSet<ExecutorEvent>,
}

impl ExecutorMachine {
    pub fn new(initial_state: impl Into<String>, now: DateTime<Utc>) -> Self {
        let mut machine = Self {
            state: initial_state.into(),
            entered_at: now,
            max_state_duration: Duration::milliseconds(MAX_STATE_DURATION_MS),
            stuck_after: Duration::milliseconds(STUCK_AFTER_MS),
            stuck_flagged: false,
            paused: false,
            stopped: false,
            observers: ObserverSet::new(),
        };
        machine.observers.publish(ExecutorEvent::Initialized);
        machine
    }

    pub fn with_max_state_duration(mut self, duration: Duration) -> Self {
        self.max_state_duration = duration;
        self
    }

    pub fn subscribe(&mut self, observer: Arc<dyn Observer<ExecutorEvent>>) {
        self.observers.subscribe(observer);
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Move to a new state, publishing exit/enter/change events.
    pub fn transition_to(&mut self, state: impl Into<String>, now: DateTime<Utc>) {
        let to = state.into();
        if self.stopped || to == self.state {
            return;
        }
        let from = std::mem::replace(&mut self.state, to.clone());
        self.entered_at = now;
        self.stuck_flagged = false;
        self.observers
            .publish(ExecutorEvent::StateExited { state: from.clone() });
        self.observers
            .publish(ExecutorEvent::StateEntered { state: to.clone() });
        self.observers
            .publish(ExecutorEvent::StateChanged { from, to });
    }

    /// Evaluate timed transitions against the supplied clock.
    ///
    /// Flags a stuck state once per entry; past the max duration the
    /// machine stops and reports `Expired`.
    pub fn tick(&mut self, now: DateTime<Utc>) -> MachineHealth {
        if self.stopped || self.paused {
            return MachineHealth::Nominal;
        }
        let elapsed = now - self.entered_at;

        if elapsed >= self.max_state_duration {
            self.stopped = true;
            self.observers.publish(ExecutorEvent::Error {
                cause: format!(
                    "state '{}' exceeded max duration ({}ms)",
                    self.state,
                    self.max_state_duration.num_milliseconds()
                ),
            });
            self.observers.publish(ExecutorEvent::Stopped);
            return MachineHealth::Expired;
        }

        if elapsed >= self.stuck_after && !self.stuck_flagged {
            self.stuck_flagged = true;
            tracing::warn!(
                event = "machine.stuck",
                state = %self.state,
                elapsed_ms = elapsed.num_milliseconds(),
            );
            return MachineHealth::Stuck;
        }

        MachineHealth::Nominal
    }

    pub fn pause(&mut self) {
        if !self.paused && !self.stopped {
            self.paused = true;
            self.observers.publish(ExecutorEvent::Paused);
        }
    }

    pub fn resume(&mut self, now: DateTime<Utc>) {
        if self.paused && !self.stopped {
            self.paused = false;
            // Time spent paused does not count against the state budget.
            self.entered_at = now;
            self.observers.publish(ExecutorEvent::Resumed);
        }
    }

    pub fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.observers.publish(ExecutorEvent::Stopped);
        }
    }

    pub fn complete(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.observers.publish(ExecutorEvent::Completed);
        }
    }
}
