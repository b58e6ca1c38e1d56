//! Circuit breaker with a cooldown window.
//!
//! Opens after N consecutive failures and stays open until the cooldown
//! elapses. Time is passed in so timed behavior is a pure function of the
//! clock plus state.

use chrono::{DateTime, Duration, Utc};

/// Breaker state for one protected resource.
#[derive(Debug, Clone)]
pub struct CooldownBreaker {
    threshold: u32,
    cooldown: Duration,
    consecutive_failures: u32,
    opened_at: Option<DateTime<Utc>>,
}

impl CooldownBreaker {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold,
            cooldown,
            consecutive_failures: 0,
            opened_at: None,
        }
    }

    /// Whether calls are currently rejected.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        match self.opened_at {
            Some(opened) => now - opened < self.cooldown,
            None => false,
        }
    }

    /// Record a failed call; opens the breaker at the threshold.
    pub fn record_failure(&mut self, now: DateTime<Utc>) {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.threshold && self.opened_at.is_none() {
            self.opened_at = Some(now);
        }
    }

    /// Record a successful call; fully resets the breaker.
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.opened_at = None;
    }

    /// Clear an expired cooldown so the next failure window starts fresh.
    pub fn tick(&mut self, now: DateTime<Utc>) {
        if let Some(opened) = self.opened_at {
            if now - opened >= self.cooldown {
                self.opened_at = None;
                self.consecutive_failures = 0;
            }
        }
    }

    pub fn failure_count(&self) -> u32 {
        self.consecutive_failures
    }
}
