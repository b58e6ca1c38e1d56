//! Scenario states, actions, and safety invariants.
//!
//! Probability is integer parts-per-million throughout; no float ever
//! enters the risk ledger.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One full probability unit: 1.0 == 1_000_000 ppm.
pub const MASS_TOTAL: u32 = 1_000_000;

/// Numeric world-state literals.
pub type WorldState = BTreeMap<String, i64>;

/// Remaining failure budget per risk kind, in ppm.
pub type RiskLedger = BTreeMap<String, u32>;

/// A scenario state: world literals plus the risk ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ScenarioState {
    pub world: WorldState,
    pub risk_ledger: RiskLedger,
}

impl ScenarioState {
    pub fn get(&self, key: &str) -> i64 {
        self.world.get(key).copied().unwrap_or(0)
    }
}

/// A world-state literal that must hold: `state[key] >= min`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateLiteral {
    pub key: String,
    pub min: i64,
}

impl StateLiteral {
    pub fn new(key: impl Into<String>, min: i64) -> Self {
        Self {
            key: key.into(),
            min,
        }
    }

    pub fn holds(&self, state: &ScenarioState) -> bool {
        state.get(&self.key) >= self.min
    }
}

/// An effect applied to the world on an outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StateEffect {
    Set { key: String, value: i64 },
    Add { key: String, delta: i64 },
}

impl StateEffect {
    pub fn apply(&self, world: &mut WorldState) {
        match self {
            StateEffect::Set { key, value } => {
                world.insert(key.clone(), *value);
            }
            StateEffect::Add { key, delta } => {
                *world.entry(key.clone()).or_insert(0) += delta;
            }
        }
    }
}

/// One possible outcome of an action. The probability mass lives in the
/// risk model, keyed by this outcome's id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeSpec {
    pub id: String,
    pub effects: Vec<StateEffect>,
}

/// A stochastic action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioAction {
    pub id: String,
    pub cost: u32,
    pub preconditions: Vec<StateLiteral>,
    pub outcomes: Vec<OutcomeSpec>,
}

impl ScenarioAction {
    pub fn applicable(&self, state: &ScenarioState) -> bool {
        self.preconditions.iter().all(|p| p.holds(state))
    }
}

/// A safety invariant with the risk kind its violation charges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyInvariant {
    pub id: String,
    pub risk_kind: String,
    pub literal: StateLiteral,
}

impl SafetyInvariant {
    pub fn violated_by(&self, state: &ScenarioState) -> bool {
        !self.literal.holds(state)
    }
}
