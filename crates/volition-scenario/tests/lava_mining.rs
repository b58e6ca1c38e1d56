//! End-to-end scenarios: lava mining under a death budget, truncation
//! honesty, mass conservation, and ledger monotonicity.

use volition_scenario::{
    BudgetSource, ConstraintStatus, NodeKind, OutcomeSpec, RejectionReason, RiskAggregation,
    RiskMeasure, SafetyInvariant, ScenarioAction, ScenarioConfig, ScenarioPlanner, ScenarioState,
    StateEffect, StateLiteral, TableRiskModel, TerminalReason, TruncationReason, MASS_TOTAL,
};

fn add(key: &str, delta: i64) -> StateEffect {
    StateEffect::Add {
        key: key.to_string(),
        delta,
    }
}

fn set(key: &str, value: i64) -> StateEffect {
    StateEffect::Set {
        key: key.to_string(),
        value,
    }
}

fn lava_actions() -> Vec<ScenarioAction> {
    vec![
        ScenarioAction {
            id: "mine_near_lava".to_string(),
            cost: 2,
            preconditions: vec![],
            outcomes: vec![
                OutcomeSpec {
                    id: "rich_vein".to_string(),
                    effects: vec![add("ore", 3)],
                },
                OutcomeSpec {
                    id: "minor_burn".to_string(),
                    effects: vec![add("ore", 1), add("health", -2)],
                },
                OutcomeSpec {
                    id: "lava_death".to_string(),
                    effects: vec![set("health", 0)],
                },
            ],
        },
        ScenarioAction {
            id: "mine_safe_area".to_string(),
            cost: 3,
            preconditions: vec![],
            outcomes: vec![OutcomeSpec {
                id: "steady".to_string(),
                effects: vec![add("ore", 2)],
            }],
        },
    ]
}

fn lava_model() -> TableRiskModel {
    TableRiskModel::new()
        .with_action(
            "mine_near_lava",
            vec![
                ("rich_vein", 700_000),
                ("minor_burn", 250_000),
                ("lava_death", 50_000),
            ],
        )
        .with_action("mine_safe_area", vec![("steady", 1_000_000)])
}

fn lava_planner() -> ScenarioPlanner {
    ScenarioPlanner::new(
        lava_actions(),
        vec![SafetyInvariant {
            id: "stay_alive".to_string(),
            risk_kind: "death".to_string(),
            literal: StateLiteral::new("health", 1),
        }],
        vec![StateLiteral::new("ore", 8), StateLiteral::new("health", 1)],
    )
    .unwrap()
}

fn lava_initial() -> ScenarioState {
    let mut state = ScenarioState::default();
    state.world.insert("health".to_string(), 20);
    state.world.insert("ore".to_string(), 0);
    state.risk_ledger.insert("death".to_string(), 100_000);
    state
}

fn config(horizon: usize) -> ScenarioConfig {
    ScenarioConfig {
        risk_measure: RiskMeasure::ChanceConstraint {
            epsilon_ppm: 100_000,
        },
        risk_aggregation: RiskAggregation::UnionBound,
        horizon_depth: horizon,
    }
}

#[test]
fn lava_mining_with_ten_percent_death_budget() {
    let planner = lava_planner();
    let report = planner
        .plan(&lava_initial(), &lava_model(), &config(10))
        .unwrap();

    assert_eq!(report.constraint_status, ConstraintStatus::Satisfied);
    assert!(report.policy_failure_upper_bound_ppm <= 100_000);
    assert!(report.safety_verified);
    assert!(!report.was_truncated);
    assert_eq!(report.explanation.budget_source, BudgetSource::State);

    // The budget admits exactly two lava expansions along a path; the
    // third is rejected and mining continues in the safe area.
    assert!(report
        .explanation
        .rejected_actions
        .iter()
        .any(|r| r.action_id == "mine_near_lava"
            && r.reason == RejectionReason::RiskBudgetExceeded));

    // Some branch reaches the goal.
    assert!(report.nodes.iter().any(|n| matches!(
        n.kind,
        NodeKind::Terminal {
            reason: TerminalReason::GoalReached
        }
    )));

    // Risk deltas name the lava action's death mass.
    let deltas = &report.explanation.risk_deltas["mine_near_lava"];
    assert_eq!(deltas["death"], 50_000);

    assert!(report.expected_cost > 0.0);
}

#[test]
fn shallow_horizon_truncates_honestly() {
    let planner = lava_planner();
    let report = planner
        .plan(&lava_initial(), &lava_model(), &config(2))
        .unwrap();

    assert!(report.was_truncated);
    assert_eq!(report.truncation_reason, Some(TruncationReason::DepthCap));
    assert_eq!(report.constraint_status, ConstraintStatus::Unknown);
    assert!(!report.safety_verified);
}

#[test]
fn mass_not_conserved_rejects_action() {
    let planner = lava_planner();
    // Lava masses sum to 999_999: the action must be rejected everywhere.
    let model = TableRiskModel::new()
        .with_action(
            "mine_near_lava",
            vec![
                ("rich_vein", 700_000),
                ("minor_burn", 249_999),
                ("lava_death", 50_000),
            ],
        )
        .with_action("mine_safe_area", vec![("steady", 1_000_000)]);

    let report = planner.plan(&lava_initial(), &model, &config(10)).unwrap();

    assert!(report
        .explanation
        .rejected_actions
        .iter()
        .any(|r| r.action_id == "mine_near_lava"
            && r.reason == RejectionReason::MassNotConserved));

    // Planning continues with the safe action only, so no failure mass
    // ever accrues.
    assert_eq!(report.policy_failure_upper_bound_ppm, 0);
    assert_eq!(report.constraint_status, ConstraintStatus::Satisfied);
}

#[test]
fn ledger_is_monotone_along_every_edge() {
    let planner = lava_planner();
    let report = planner
        .plan(&lava_initial(), &lava_model(), &config(10))
        .unwrap();

    // Chance nodes carry their decision parent's state; every outcome
    // edge's child ledger must be <= the chance node's ledger per kind.
    for edge in &report.edges {
        let parent = &report.nodes[edge.from];
        let child = &report.nodes[edge.to];
        for (kind, before) in &parent.state.risk_ledger {
            let after = child.state.risk_ledger.get(kind).copied().unwrap_or(0);
            assert!(
                after <= *before,
                "ledger for '{kind}' grew along edge {} -> {}",
                edge.from,
                edge.to
            );
        }
    }
}

#[test]
fn node_cap_truncation_is_honest() {
    // One action with two non-failing outcomes and an unreachable goal:
    // the frontier doubles every depth until the node cap trips.
    let actions = vec![ScenarioAction {
        id: "wander".to_string(),
        cost: 1,
        preconditions: vec![],
        outcomes: vec![
            OutcomeSpec {
                id: "left".to_string(),
                effects: vec![add("steps", 1)],
            },
            OutcomeSpec {
                id: "right".to_string(),
                effects: vec![add("steps", 1), add("drift", 1)],
            },
        ],
    }];
    let model = TableRiskModel::new()
        .with_action("wander", vec![("left", 500_000), ("right", 500_000)]);
    let planner = ScenarioPlanner::new(
        actions,
        vec![],
        vec![StateLiteral::new("treasure", 1)],
    )
    .unwrap();

    let report = planner
        .plan(&ScenarioState::default(), &model, &config(50))
        .unwrap();

    assert!(report.was_truncated);
    assert_eq!(report.truncation_reason, Some(TruncationReason::NodeCap));
    assert_eq!(report.constraint_status, ConstraintStatus::Unknown);
    assert!(report.nodes.len() <= volition_scenario::MAX_SCENARIO_NODES + 3);
}

#[test]
fn config_default_budget_and_mismatch_warning() {
    let planner = lava_planner();

    // Empty ledger: budget comes from config epsilon.
    let mut no_ledger = lava_initial();
    no_ledger.risk_ledger.clear();
    let report = planner
        .plan(&no_ledger, &lava_model(), &config(10))
        .unwrap();
    assert_eq!(report.explanation.budget_source, BudgetSource::ConfigDefault);

    // State ledger disagreeing with epsilon produces a warning.
    let mut skewed = lava_initial();
    skewed.risk_ledger.insert("death".to_string(), 200_000);
    let report = planner.plan(&skewed, &lava_model(), &config(10)).unwrap();
    assert_eq!(report.explanation.budget_source, BudgetSource::State);
    assert!(report
        .explanation
        .warnings
        .iter()
        .any(|w| w.contains("disagrees with config epsilon")));
}

#[test]
fn independent_product_aggregation_shrinks_budget_slower() {
    let planner = lava_planner();
    let product_config = ScenarioConfig {
        risk_aggregation: RiskAggregation::IndependentProduct,
        ..config(10)
    };
    let report = planner
        .plan(&lava_initial(), &lava_model(), &product_config)
        .unwrap();

    // Under the product rule the ledger never goes negative, so the lava
    // action is never budget-rejected.
    assert!(!report
        .explanation
        .rejected_actions
        .iter()
        .any(|r| r.reason == RejectionReason::RiskBudgetExceeded));
}

#[test]
fn cvar_measure_reports_tail_cost() {
    let planner = lava_planner();
    let cvar_config = ScenarioConfig {
        risk_measure: RiskMeasure::Cvar { alpha_ppm: 100_000 },
        risk_aggregation: RiskAggregation::UnionBound,
        horizon_depth: 10,
    };
    let report = planner
        .plan(&lava_initial(), &lava_model(), &cvar_config)
        .unwrap();
    let cvar = report.cvar_cost.expect("cvar cost present");
    // The tail average can never undercut the overall expectation's
    // cheapest path and must be a finite cost.
    assert!(cvar >= 0.0);
    assert!(cvar.is_finite());
}
