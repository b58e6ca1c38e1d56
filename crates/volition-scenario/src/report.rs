//! Scenario-planner result and explanation types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::state::ScenarioState;

/// Declared risk measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "measure", rename_all = "snake_case")]
pub enum RiskMeasure {
    ChanceConstraint { epsilon_ppm: u32 },
    Cvar { alpha_ppm: u32 },
    ExpectedValue,
}

/// How failure masses combine along a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskAggregation {
    UnionBound,
    IndependentProduct,
}

/// Planner configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub risk_measure: RiskMeasure,
    pub risk_aggregation: RiskAggregation,
    pub horizon_depth: usize,
}

/// Why a branch of the search stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalReason {
    GoalReached,
    RiskBudgetExhausted,
    SafetyViolated,
    HorizonReached,
    NodeCapReached,
    NoFeasibleActions,
}

/// Why the whole search result is incomplete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TruncationReason {
    DepthCap,
    NodeCap,
}

/// Node kinds in the expanded graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    Decision {
        /// The action the policy prescribes here, when any was feasible.
        prescribed_action: Option<String>,
    },
    Chance {
        action_id: String,
    },
    Terminal {
        reason: TerminalReason,
    },
}

/// One node in the scenario graph. Nodes are arena-indexed; edges refer to
/// indices, never to each other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioNode {
    pub id: usize,
    pub kind: NodeKind,
    pub state: ScenarioState,
    pub depth: usize,
    /// Worst-case cumulative failure ppm along the path to this node.
    pub cumulative_failure_ppm: u32,
}

/// An action edge connecting a decision node to its prescribed chance node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionEdge {
    pub from: usize,
    pub to: usize,
    pub action_id: String,
}

/// An outcome edge from a chance node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeEdge {
    pub from: usize,
    pub to: usize,
    pub outcome_id: String,
    pub mass_ppm: u32,
    /// Failure mass this outcome charged against the ledger.
    pub loss_ppm: u32,
}

/// An action rejected during expansion, with its reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedAction {
    pub node_id: usize,
    pub action_id: String,
    pub reason: RejectionReason,
}

/// Rejection taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    PreconditionFailed,
    MassNotConserved,
    RiskBudgetExceeded,
    OutcomeCapExceeded,
    UnknownAction,
}

/// Verdict on the declared chance constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintStatus {
    Satisfied,
    Violated,
    Unknown,
}

/// Where the failure budget came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetSource {
    State,
    ConfigDefault,
}

/// The explanation bundle attached to every result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub risk_measure: RiskMeasure,
    pub risk_aggregation: RiskAggregation,
    pub rejected_actions: Vec<RejectedAction>,
    /// Worst observed per-kind failure mass per action.
    pub risk_deltas: BTreeMap<String, BTreeMap<String, u32>>,
    pub budget_source: BudgetSource,
    pub warnings: Vec<String>,
}

/// The full result of one planning call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub nodes: Vec<ScenarioNode>,
    pub edges: Vec<OutcomeEdge>,
    pub action_edges: Vec<ActionEdge>,
    pub policy_failure_upper_bound_ppm: u32,
    pub graph_wide_cumulative_failure_ppm: u32,
    pub expected_cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cvar_cost: Option<f64>,
    pub constraint_status: ConstraintStatus,
    pub violated_constraints: Vec<String>,
    pub was_truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncation_reason: Option<TruncationReason>,
    pub safety_verified: bool,
    pub explanation: Explanation,
}
