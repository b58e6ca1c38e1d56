//! Runtime configuration.
//!
//! One `Config` is constructed at startup and passed through by reference.
//! Environment parsing lives here and nowhere else.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Runtime mode for the autonomous executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeMode {
    /// Plans execute only as shadow runs.
    #[default]
    Shadow,
    /// Plans may take observable action.
    Live,
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub mode: RuntimeMode,
    /// Per-sub-planner compute budget.
    pub planner_budget_ms: u64,
    /// LLM call budget for plan execution.
    pub llm_execution_timeout_ms: u64,
    /// LLM call budget for abstract planning.
    pub llm_planning_timeout_ms: u64,
    /// Memory service base URL, e.g. `http://127.0.0.1:3100`.
    pub memory_endpoint: String,
    /// Goal-key dedup window.
    pub goal_key_window_ms: i64,
    /// Terminal goals retained before garbage collection.
    pub goal_retention: usize,
    /// Maximum wall-clock per state-machine state.
    pub max_state_duration_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: RuntimeMode::Shadow,
            planner_budget_ms: 20,
            llm_execution_timeout_ms: 5_000,
            llm_planning_timeout_ms: 40_000,
            memory_endpoint: "http://127.0.0.1:3100".to_string(),
            goal_key_window_ms: 5 * 60 * 1000,
            goal_retention: 64,
            max_state_duration_ms: 5 * 60 * 1000,
        }
    }
}

impl Config {
    /// Build from the environment, falling back to defaults per field.
    ///
    /// Recognized variables: `VOLITION_MODE` (`shadow`|`live`),
    /// `VOLITION_PLANNER_BUDGET_MS`, `VOLITION_MEMORY_ENDPOINT`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(mode) = std::env::var("VOLITION_MODE") {
            config.mode = match mode.as_str() {
                "live" => RuntimeMode::Live,
                _ => RuntimeMode::Shadow,
            };
        }
        if let Some(ms) = env_u64("VOLITION_PLANNER_BUDGET_MS") {
            config.planner_budget_ms = ms;
        }
        if let Ok(endpoint) = std::env::var("VOLITION_MEMORY_ENDPOINT") {
            config.memory_endpoint = endpoint;
        }

        config
    }

    pub fn planner_budget(&self) -> Duration {
        Duration::from_millis(self.planner_budget_ms)
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
