//! Per-option execution quotas.
//!
//! A token bucket per option with a fixed reset interval. Time is passed
//! in, so quota behavior is a pure function of the clock plus cell state.

use chrono::{DateTime, Duration, Utc};

/// One option's quota cell.
#[derive(Debug, Clone)]
pub struct QuotaCell {
    capacity: u32,
    tokens: u32,
    window: Duration,
    window_started: DateTime<Utc>,
}

impl QuotaCell {
    pub fn new(capacity: u32, window: Duration, now: DateTime<Utc>) -> Self {
        Self {
            capacity,
            tokens: capacity,
            window,
            window_started: now,
        }
    }

    /// Take one token, refilling first when the window has rolled over.
    pub fn try_take(&mut self, now: DateTime<Utc>) -> bool {
        if now - self.window_started >= self.window {
            self.tokens = self.capacity;
            self.window_started = now;
        }
        if self.tokens == 0 {
            return false;
        }
        self.tokens -= 1;
        true
    }

    pub fn remaining(&self) -> u32 {
        self.tokens
    }
}
