//! Risk models: outcome probability masses and learning updates.
//!
//! Masses are integer ppm. Updates are pure: `update_risk_model` returns a
//! new model that overrides only the reported action, using
//! Laplace-smoothed counts and largest-remainder apportionment so masses
//! stay integer and sum exactly to [`MASS_TOTAL`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::state::{ScenarioState, MASS_TOTAL};

/// Probability mass assigned to one outcome id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeMass {
    pub outcome_id: String,
    pub mass_ppm: u32,
}

/// The consumed risk-model interface.
pub trait RiskModel {
    /// Outcome masses for an action in a state. An empty vector means the
    /// model knows nothing about the action.
    fn outcome_masses(&self, state: &ScenarioState, action_id: &str) -> Vec<OutcomeMass>;
}

/// A table-backed risk model with per-action observation counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TableRiskModel {
    masses: BTreeMap<String, Vec<OutcomeMass>>,
    counts: BTreeMap<String, BTreeMap<String, u64>>,
}

impl TableRiskModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the masses for one action.
    pub fn with_action(mut self, action_id: &str, masses: Vec<(&str, u32)>) -> Self {
        self.masses.insert(
            action_id.to_string(),
            masses
                .into_iter()
                .map(|(id, mass_ppm)| OutcomeMass {
                    outcome_id: id.to_string(),
                    mass_ppm,
                })
                .collect(),
        );
        self
    }

    pub fn counts_for(&self, action_id: &str) -> Option<&BTreeMap<String, u64>> {
        self.counts.get(action_id)
    }
}

impl RiskModel for TableRiskModel {
    fn outcome_masses(&self, _state: &ScenarioState, action_id: &str) -> Vec<OutcomeMass> {
        self.masses.get(action_id).cloned().unwrap_or_default()
    }
}

/// An observation of real executions of one action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationReport {
    pub action_id: String,
    pub observed_outcome_id: String,
    /// Context snapshot at execution time, carried for audit.
    pub state_context: BTreeMap<String, i64>,
    pub execution_count: u64,
}

/// Fold an observation into a new model. Only the reported action's masses
/// change; every other action is carried over untouched.
pub fn update_risk_model(model: &TableRiskModel, report: &ObservationReport) -> TableRiskModel {
    let mut updated = model.clone();

    // Seed counts from zero, covering every outcome the model already
    // names for the action plus the observed one.
    let mut counts = model
        .counts
        .get(&report.action_id)
        .cloned()
        .unwrap_or_default();
    if let Some(masses) = model.masses.get(&report.action_id) {
        for m in masses {
            counts.entry(m.outcome_id.clone()).or_insert(0);
        }
    }
    *counts
        .entry(report.observed_outcome_id.clone())
        .or_insert(0) += report.execution_count.max(1);

    // Laplace smoothing: weight = count + 1.
    let weights: Vec<(String, u64)> = counts
        .iter()
        .map(|(id, c)| (id.clone(), c + 1))
        .collect();
    let masses = apportion(&weights);

    updated.counts.insert(report.action_id.clone(), counts);
    updated.masses.insert(report.action_id.clone(), masses);
    updated
}

/// Largest-remainder apportionment of [`MASS_TOTAL`] over integer weights.
///
/// Floors every quota, then hands the leftover ppm to the largest
/// fractional remainders (ties broken by outcome id) so the result is
/// integer and sums exactly to `MASS_TOTAL`.
pub fn apportion(weights: &[(String, u64)]) -> Vec<OutcomeMass> {
    let total_weight: u64 = weights.iter().map(|(_, w)| w).sum();
    if total_weight == 0 || weights.is_empty() {
        return Vec::new();
    }

    let mut floored: Vec<(String, u32, u64)> = weights
        .iter()
        .map(|(id, w)| {
            let numerator = (MASS_TOTAL as u64) * w;
            let quota = numerator / total_weight;
            let remainder = numerator % total_weight;
            (id.clone(), quota as u32, remainder)
        })
        .collect();

    let assigned: u32 = floored.iter().map(|(_, q, _)| q).sum();
    let mut leftover = MASS_TOTAL - assigned;

    // Largest remainder first; ties break by id so the result is stable.
    let mut order: Vec<usize> = (0..floored.len()).collect();
    order.sort_by(|&a, &b| {
        floored[b]
            .2
            .cmp(&floored[a].2)
            .then_with(|| floored[a].0.cmp(&floored[b].0))
    });

    // The floor sum is within len-1 of the total, so one pass suffices.
    for &i in &order {
        if leftover == 0 {
            break;
        }
        floored[i].1 += 1;
        leftover -= 1;
    }

    floored
        .into_iter()
        .map(|(outcome_id, mass_ppm, _)| OutcomeMass {
            outcome_id,
            mass_ppm,
        })
        .collect()
}
