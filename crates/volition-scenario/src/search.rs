//! Bounded best-first expansion over decision, chance, and terminal nodes.
//!
//! The planner expands the prescribed (cheapest feasible) action at every
//! decision node; alternatives that fail admission are recorded in the
//! explanation bundle. All probability arithmetic is integer ppm and the
//! ledger is monotonically non-increasing along every expanded path.

use std::collections::{BTreeMap, VecDeque};

use tracing::debug;

use crate::error::{ScenarioError, ScenarioResult};
use crate::model::RiskModel;
use crate::report::{
    ActionEdge, BudgetSource, ConstraintStatus, Explanation, NodeKind, OutcomeEdge,
    RejectedAction, RejectionReason, RiskAggregation, RiskMeasure, ScenarioConfig, ScenarioNode,
    ScenarioReport, TerminalReason, TruncationReason,
};
use crate::state::{
    RiskLedger, SafetyInvariant, ScenarioAction, ScenarioState, StateLiteral, MASS_TOTAL,
};

/// Hard cap on expanded nodes.
pub const MAX_SCENARIO_NODES: usize = 300;
/// Hard cap on search depth regardless of configured horizon.
pub const MAX_SCENARIO_DEPTH: usize = 50;
/// Maximum outcomes one action may declare.
pub const MAX_OUTCOMES_PER_ACTION: usize = 5;

/// The risk-aware scenario planner.
pub struct ScenarioPlanner {
    actions: Vec<ScenarioAction>,
    invariants: Vec<SafetyInvariant>,
    goal: Vec<StateLiteral>,
}

impl ScenarioPlanner {
    pub fn new(
        mut actions: Vec<ScenarioAction>,
        invariants: Vec<SafetyInvariant>,
        goal: Vec<StateLiteral>,
    ) -> ScenarioResult<Self> {
        if actions.is_empty() {
            return Err(ScenarioError::EmptyActionSet);
        }
        actions.sort_by(|a, b| a.cost.cmp(&b.cost).then_with(|| a.id.cmp(&b.id)));
        for window in actions.windows(2) {
            if window[0].id == window[1].id {
                return Err(ScenarioError::DuplicateActionId(window[0].id.clone()));
            }
        }
        Ok(Self {
            actions,
            invariants,
            goal,
        })
    }

    fn goal_reached(&self, state: &ScenarioState) -> bool {
        self.goal.iter().all(|l| l.holds(state))
    }

    /// Plan from `initial` under `config`, querying `model` for masses.
    pub fn plan(
        &self,
        initial: &ScenarioState,
        model: &dyn RiskModel,
        config: &ScenarioConfig,
    ) -> ScenarioResult<ScenarioReport> {
        if config.horizon_depth == 0 {
            return Err(ScenarioError::ZeroHorizon);
        }
        let horizon = config.horizon_depth.min(MAX_SCENARIO_DEPTH);

        let (root_ledger, budget_source, mut warnings) = self.seed_ledger(initial, config);

        let mut nodes: Vec<ScenarioNode> = Vec::new();
        let mut edges: Vec<OutcomeEdge> = Vec::new();
        let mut action_edges: Vec<ActionEdge> = Vec::new();
        let mut rejected: Vec<RejectedAction> = Vec::new();
        let mut risk_deltas: BTreeMap<String, BTreeMap<String, u32>> = BTreeMap::new();
        let mut truncation: Option<TruncationReason> = None;

        let root_state = ScenarioState {
            world: initial.world.clone(),
            risk_ledger: root_ledger,
        };
        nodes.push(ScenarioNode {
            id: 0,
            kind: NodeKind::Decision {
                prescribed_action: None,
            },
            state: root_state,
            depth: 0,
            cumulative_failure_ppm: 0,
        });

        let mut queue: VecDeque<usize> = VecDeque::new();
        queue.push_back(0);

        while let Some(idx) = queue.pop_front() {
            if nodes.len() >= MAX_SCENARIO_NODES {
                nodes[idx].kind = NodeKind::Terminal {
                    reason: TerminalReason::NodeCapReached,
                };
                truncation.get_or_insert(TruncationReason::NodeCap);
                continue;
            }

            let state = nodes[idx].state.clone();
            let depth = nodes[idx].depth;
            let cum = nodes[idx].cumulative_failure_ppm;

            if self.goal_reached(&state) {
                nodes[idx].kind = NodeKind::Terminal {
                    reason: TerminalReason::GoalReached,
                };
                continue;
            }
            if depth >= horizon {
                nodes[idx].kind = NodeKind::Terminal {
                    reason: TerminalReason::HorizonReached,
                };
                truncation.get_or_insert(TruncationReason::DepthCap);
                continue;
            }

            let mut prescribed: Option<String> = None;
            let mut saw_budget_rejection = false;

            for action in &self.actions {
                if prescribed.is_some() {
                    break;
                }
                if !action.applicable(&state) {
                    rejected.push(RejectedAction {
                        node_id: idx,
                        action_id: action.id.clone(),
                        reason: RejectionReason::PreconditionFailed,
                    });
                    continue;
                }

                let masses = model.outcome_masses(&state, &action.id);
                if masses.is_empty() {
                    rejected.push(RejectedAction {
                        node_id: idx,
                        action_id: action.id.clone(),
                        reason: RejectionReason::UnknownAction,
                    });
                    continue;
                }
                if masses.len() > MAX_OUTCOMES_PER_ACTION {
                    rejected.push(RejectedAction {
                        node_id: idx,
                        action_id: action.id.clone(),
                        reason: RejectionReason::OutcomeCapExceeded,
                    });
                    continue;
                }
                let mass_sum: u64 = masses.iter().map(|m| m.mass_ppm as u64).sum();
                if mass_sum != MASS_TOTAL as u64 {
                    rejected.push(RejectedAction {
                        node_id: idx,
                        action_id: action.id.clone(),
                        reason: RejectionReason::MassNotConserved,
                    });
                    continue;
                }

                // Resolve every outcome and classify failures.
                let mut resolved: Vec<(String, u32, ScenarioState, Option<String>)> = Vec::new();
                let mut failure_by_kind: BTreeMap<String, u32> = BTreeMap::new();
                let mut model_error = None;
                for mass in &masses {
                    let Some(outcome) = action.outcomes.iter().find(|o| o.id == mass.outcome_id)
                    else {
                        model_error = Some(ScenarioError::UnknownOutcome {
                            action_id: action.id.clone(),
                            outcome_id: mass.outcome_id.clone(),
                        });
                        break;
                    };
                    let mut world = state.world.clone();
                    for effect in &outcome.effects {
                        effect.apply(&mut world);
                    }
                    let result_state = ScenarioState {
                        world,
                        risk_ledger: state.risk_ledger.clone(),
                    };
                    let violated_kind = self
                        .invariants
                        .iter()
                        .find(|inv| inv.violated_by(&result_state))
                        .map(|inv| inv.risk_kind.clone());
                    if let Some(kind) = &violated_kind {
                        *failure_by_kind.entry(kind.clone()).or_insert(0) += mass.mass_ppm;
                    }
                    resolved.push((
                        mass.outcome_id.clone(),
                        mass.mass_ppm,
                        result_state,
                        violated_kind,
                    ));
                }
                if let Some(err) = model_error {
                    return Err(err);
                }

                // Charge the ledger; reject on exhaustion.
                let mut new_ledger: RiskLedger = state.risk_ledger.clone();
                let mut budget_ok = true;
                for (kind, failure_mass) in &failure_by_kind {
                    let before = state.risk_ledger.get(kind).copied().unwrap_or(0);
                    match aggregate_ledger(before, *failure_mass, config.risk_aggregation) {
                        Some(after) => {
                            new_ledger.insert(kind.clone(), after);
                        }
                        None => {
                            budget_ok = false;
                            break;
                        }
                    }
                }
                if !budget_ok {
                    saw_budget_rejection = true;
                    rejected.push(RejectedAction {
                        node_id: idx,
                        action_id: action.id.clone(),
                        reason: RejectionReason::RiskBudgetExceeded,
                    });
                    continue;
                }

                // Record the action's worst observed per-kind delta.
                let deltas = risk_deltas.entry(action.id.clone()).or_default();
                for (kind, mass) in &failure_by_kind {
                    let entry = deltas.entry(kind.clone()).or_insert(0);
                    *entry = (*entry).max(*mass);
                }

                // Expand: one chance node plus one child per outcome.
                let total_failure: u32 = failure_by_kind.values().sum();
                let chance_cum = aggregate_failure(cum, total_failure, config.risk_aggregation);

                let chance_id = nodes.len();
                nodes.push(ScenarioNode {
                    id: chance_id,
                    kind: NodeKind::Chance {
                        action_id: action.id.clone(),
                    },
                    state: state.clone(),
                    depth,
                    cumulative_failure_ppm: chance_cum,
                });
                action_edges.push(ActionEdge {
                    from: idx,
                    to: chance_id,
                    action_id: action.id.clone(),
                });

                for (outcome_id, mass_ppm, mut result_state, violated_kind) in resolved {
                    let child_id = nodes.len();
                    match violated_kind {
                        Some(_) => {
                            nodes.push(ScenarioNode {
                                id: child_id,
                                kind: NodeKind::Terminal {
                                    reason: TerminalReason::SafetyViolated,
                                },
                                state: result_state,
                                depth: depth + 1,
                                cumulative_failure_ppm: chance_cum,
                            });
                            edges.push(OutcomeEdge {
                                from: chance_id,
                                to: child_id,
                                outcome_id,
                                mass_ppm,
                                loss_ppm: mass_ppm,
                            });
                        }
                        None => {
                            result_state.risk_ledger = new_ledger.clone();
                            nodes.push(ScenarioNode {
                                id: child_id,
                                kind: NodeKind::Decision {
                                    prescribed_action: None,
                                },
                                state: result_state,
                                depth: depth + 1,
                                cumulative_failure_ppm: chance_cum,
                            });
                            edges.push(OutcomeEdge {
                                from: chance_id,
                                to: child_id,
                                outcome_id,
                                mass_ppm,
                                loss_ppm: 0,
                            });
                            queue.push_back(child_id);
                        }
                    }
                }

                prescribed = Some(action.id.clone());
            }

            match prescribed {
                Some(action_id) => {
                    nodes[idx].kind = NodeKind::Decision {
                        prescribed_action: Some(action_id),
                    };
                }
                None => {
                    let reason = if saw_budget_rejection {
                        TerminalReason::RiskBudgetExhausted
                    } else {
                        TerminalReason::NoFeasibleActions
                    };
                    nodes[idx].kind = NodeKind::Terminal { reason };
                }
            }
        }

        let policy_bound = nodes
            .iter()
            .map(|n| n.cumulative_failure_ppm)
            .max()
            .unwrap_or(0);
        // All expanded edges belong to the prescribed policy here, so the
        // graph-wide worst case coincides with the policy bound.
        let graph_wide = policy_bound;

        let expected_cost = self.expected_cost(0, &nodes, &edges, &action_edges);
        let cvar_cost = match config.risk_measure {
            RiskMeasure::Cvar { alpha_ppm } => {
                Some(self.cvar_cost(&nodes, &edges, &action_edges, alpha_ppm))
            }
            _ => None,
        };

        let was_truncated = truncation.is_some();
        let mut violated_constraints = Vec::new();
        let constraint_status = match config.risk_measure {
            RiskMeasure::ChanceConstraint { epsilon_ppm } => {
                if was_truncated {
                    ConstraintStatus::Unknown
                } else if policy_bound > epsilon_ppm {
                    violated_constraints.push(format!(
                        "policy failure {policy_bound}ppm exceeds epsilon {epsilon_ppm}ppm"
                    ));
                    ConstraintStatus::Violated
                } else {
                    ConstraintStatus::Satisfied
                }
            }
            _ => {
                if was_truncated {
                    ConstraintStatus::Unknown
                } else {
                    ConstraintStatus::Satisfied
                }
            }
        };
        if budget_source == BudgetSource::State {
            if let RiskMeasure::ChanceConstraint { epsilon_ppm } = config.risk_measure {
                for (kind, budget) in &initial.risk_ledger {
                    if *budget != epsilon_ppm {
                        warnings.push(format!(
                            "ledger budget for '{kind}' ({budget}ppm) disagrees with config epsilon ({epsilon_ppm}ppm)"
                        ));
                    }
                }
            }
        }

        let safety_verified = constraint_status == ConstraintStatus::Satisfied;
        debug!(
            event = "scenario.planned",
            nodes = nodes.len(),
            policy_bound_ppm = policy_bound,
            truncated = was_truncated,
        );

        Ok(ScenarioReport {
            nodes,
            edges,
            action_edges,
            policy_failure_upper_bound_ppm: policy_bound,
            graph_wide_cumulative_failure_ppm: graph_wide,
            expected_cost,
            cvar_cost,
            constraint_status,
            violated_constraints,
            was_truncated,
            truncation_reason: truncation,
            safety_verified,
            explanation: Explanation {
                risk_measure: config.risk_measure,
                risk_aggregation: config.risk_aggregation,
                rejected_actions: rejected,
                risk_deltas,
                budget_source,
                warnings,
            },
        })
    }

    /// Seed the root ledger, deciding the budget source.
    fn seed_ledger(
        &self,
        initial: &ScenarioState,
        config: &ScenarioConfig,
    ) -> (RiskLedger, BudgetSource, Vec<String>) {
        let mut warnings = Vec::new();
        if !initial.risk_ledger.is_empty() {
            for invariant in &self.invariants {
                if !initial.risk_ledger.contains_key(&invariant.risk_kind) {
                    warnings.push(format!(
                        "state ledger has no budget for risk kind '{}'; treating as zero",
                        invariant.risk_kind
                    ));
                }
            }
            return (initial.risk_ledger.clone(), BudgetSource::State, warnings);
        }

        let default_budget = match config.risk_measure {
            RiskMeasure::ChanceConstraint { epsilon_ppm } => epsilon_ppm,
            _ => MASS_TOTAL,
        };
        let ledger: RiskLedger = self
            .invariants
            .iter()
            .map(|inv| (inv.risk_kind.clone(), default_budget))
            .collect();
        (ledger, BudgetSource::ConfigDefault, warnings)
    }

    /// Expected cost of the policy subtree rooted at `node`.
    fn expected_cost(
        &self,
        node: usize,
        nodes: &[ScenarioNode],
        edges: &[OutcomeEdge],
        action_edges: &[ActionEdge],
    ) -> f64 {
        match &nodes[node].kind {
            NodeKind::Terminal { .. } => 0.0,
            NodeKind::Decision { prescribed_action } => {
                let Some(action_id) = prescribed_action else {
                    return 0.0;
                };
                let cost = self
                    .actions
                    .iter()
                    .find(|a| &a.id == action_id)
                    .map(|a| a.cost as f64)
                    .unwrap_or(0.0);
                let chance = action_edges
                    .iter()
                    .find(|e| e.from == node)
                    .map(|e| e.to);
                match chance {
                    Some(chance) => {
                        cost + self.expected_cost(chance, nodes, edges, action_edges)
                    }
                    None => cost,
                }
            }
            NodeKind::Chance { .. } => edges
                .iter()
                .filter(|e| e.from == node)
                .map(|e| {
                    (e.mass_ppm as f64 / MASS_TOTAL as f64)
                        * self.expected_cost(e.to, nodes, edges, action_edges)
                })
                .sum(),
        }
    }

    /// CVaR over root-to-terminal policy paths: average cost of the worst
    /// `alpha_ppm` of probability mass, apportioned so partial path masses
    /// stay integer.
    fn cvar_cost(
        &self,
        nodes: &[ScenarioNode],
        edges: &[OutcomeEdge],
        action_edges: &[ActionEdge],
        alpha_ppm: u32,
    ) -> f64 {
        let mut paths: Vec<(u32, f64)> = Vec::new();
        self.collect_paths(0, MASS_TOTAL, 0.0, nodes, edges, action_edges, &mut paths);

        if alpha_ppm == 0 || paths.is_empty() {
            return 0.0;
        }

        paths.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        let total_mass: u32 = paths.iter().map(|(m, _)| *m).sum();
        let mut remaining = alpha_ppm.min(total_mass);
        let mut taken_mass = 0u64;
        let mut weighted = 0.0f64;
        for (mass, cost) in paths {
            if remaining == 0 {
                break;
            }
            let take = mass.min(remaining);
            weighted += take as f64 * cost;
            taken_mass += take as u64;
            remaining -= take;
        }
        if taken_mass == 0 {
            0.0
        } else {
            weighted / taken_mass as f64
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn collect_paths(
        &self,
        node: usize,
        mass_ppm: u32,
        cost: f64,
        nodes: &[ScenarioNode],
        edges: &[OutcomeEdge],
        action_edges: &[ActionEdge],
        out: &mut Vec<(u32, f64)>,
    ) {
        match &nodes[node].kind {
            NodeKind::Terminal { .. } => out.push((mass_ppm, cost)),
            NodeKind::Decision { prescribed_action } => {
                let Some(action_id) = prescribed_action else {
                    out.push((mass_ppm, cost));
                    return;
                };
                let action_cost = self
                    .actions
                    .iter()
                    .find(|a| &a.id == action_id)
                    .map(|a| a.cost as f64)
                    .unwrap_or(0.0);
                match action_edges.iter().find(|e| e.from == node) {
                    Some(edge) => self.collect_paths(
                        edge.to,
                        mass_ppm,
                        cost + action_cost,
                        nodes,
                        edges,
                        action_edges,
                        out,
                    ),
                    None => out.push((mass_ppm, cost + action_cost)),
                }
            }
            NodeKind::Chance { .. } => {
                for edge in edges.iter().filter(|e| e.from == node) {
                    let child_mass =
                        ((mass_ppm as u64 * edge.mass_ppm as u64) / MASS_TOTAL as u64) as u32;
                    self.collect_paths(
                        edge.to,
                        child_mass,
                        cost,
                        nodes,
                        edges,
                        action_edges,
                        out,
                    );
                }
            }
        }
    }
}

/// Charge `failure_mass` against `before`, returning the new ledger value
/// or `None` when the budget would go negative.
fn aggregate_ledger(before: u32, failure_mass: u32, aggregation: RiskAggregation) -> Option<u32> {
    match aggregation {
        RiskAggregation::UnionBound => before.checked_sub(failure_mass),
        RiskAggregation::IndependentProduct => {
            let after =
                (before as u64) * ((MASS_TOTAL - failure_mass.min(MASS_TOTAL)) as u64)
                    / (MASS_TOTAL as u64);
            Some(after as u32)
        }
    }
}

/// Accumulate failure probability along a path.
fn aggregate_failure(cum: u32, failure_mass: u32, aggregation: RiskAggregation) -> u32 {
    match aggregation {
        RiskAggregation::UnionBound => (cum + failure_mass).min(MASS_TOTAL),
        RiskAggregation::IndependentProduct => {
            let survive_before = (MASS_TOTAL - cum) as u64;
            let survive_step = (MASS_TOTAL - failure_mass.min(MASS_TOTAL)) as u64;
            let survive_after = survive_before * survive_step / MASS_TOTAL as u64;
            MASS_TOTAL - survive_after as u32
        }
    }
}
