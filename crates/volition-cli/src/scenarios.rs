//! The end-to-end smoke scenarios.
//!
//! Each scenario drives a full subsystem path against the sim world and
//! returns `Err` with the offending detail on any contract violation.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;

use volition_belief::{check_confidence, BeliefState, ProbBucket, DEFAULT_CONFIDENCE_THRESHOLD};
use volition_bt::fakes::standard_registry;
use volition_bt::{LeafCtx, Permission};
use volition_core::{
    derive_drives, BotObservation, Config, Coordinator, NeedType, PipelineInput, SignalProcessor,
};
use volition_registry::{
    AuditOp, CapabilityRegistry, CapabilityStatus, Provenance, RegistryConfig, RegistryError,
    ShadowConfig,
};
use volition_scenario::{
    BudgetSource, ConstraintStatus, OutcomeSpec, RiskAggregation, RiskMeasure, SafetyInvariant,
    ScenarioAction, ScenarioConfig, ScenarioPlanner, ScenarioState, StateEffect, StateLiteral,
    TableRiskModel, TruncationReason,
};

/// All scenario names, in run order.
pub const SCENARIO_NAMES: [&str; 6] = [
    "homeostasis_threshold",
    "hunger_alignment",
    "lava_mining",
    "risk_truncation",
    "village_localization",
    "torch_corridor",
];

/// Run one scenario by name.
pub async fn run_scenario(name: &str) -> Result<(), String> {
    match name {
        "homeostasis_threshold" => homeostasis_threshold(),
        "hunger_alignment" => hunger_alignment().await,
        "lava_mining" => lava_mining(),
        "risk_truncation" => risk_truncation(),
        "village_localization" => village_localization(),
        "torch_corridor" => torch_corridor().await,
        other => Err(format!("unknown scenario: {other}")),
    }
}

fn expect<T: PartialEq + std::fmt::Debug>(label: &str, got: T, want: T) -> Result<(), String> {
    if got == want {
        Ok(())
    } else {
        Err(format!("{label}: expected {want:?}, got {got:?}"))
    }
}

fn homeostasis_threshold() -> Result<(), String> {
    let obs = BotObservation {
        health: Some(16),
        food: Some(5),
        nearby_hostiles: 2,
        time_of_day: Some(18_000),
    };
    let drives = derive_drives(&obs);
    expect("health", drives.health, Some(0.80))?;
    expect("hunger", drives.hunger, Some(0.75))?;
    expect("safety", drives.safety, Some(0.50))?;
    expect("energy", drives.energy, Some(0.53))?;
    Ok(())
}

async fn hunger_alignment() -> Result<(), String> {
    let mut processor = SignalProcessor::new();

    let needs = processor.process_tick(
        &[],
        &BotObservation {
            health: Some(20),
            food: Some(5),
            nearby_hostiles: 0,
            time_of_day: Some(0),
        },
    );
    if !needs.iter().any(|n| n.need_type == NeedType::Nutrition) {
        return Err("food=5 (hunger 0.75) must trigger a nutrition need".to_string());
    }

    let needs = processor.process_tick(
        &[],
        &BotObservation {
            health: Some(20),
            food: Some(6),
            nearby_hostiles: 0,
            time_of_day: Some(0),
        },
    );
    if needs.iter().any(|n| n.need_type == NeedType::Nutrition) {
        return Err("food=6 (hunger 0.70) must not trigger eat_immediate".to_string());
    }

    // The full pipeline still plans something for the hungry case.
    let mut coordinator = Coordinator::new(Config::default());
    let input = PipelineInput {
        observation: BotObservation {
            health: Some(20),
            food: Some(5),
            nearby_hostiles: 0,
            time_of_day: Some(0),
        },
        ..Default::default()
    };
    let result = coordinator
        .plan_and_execute(&[], &input)
        .await
        .map_err(|e| e.to_string())?;
    if result.plan.is_empty() {
        return Err("pipeline produced an empty plan".to_string());
    }
    Ok(())
}

fn lava_planner() -> Result<(ScenarioPlanner, ScenarioState, TableRiskModel), String> {
    let add = |key: &str, delta: i64| StateEffect::Add {
        key: key.to_string(),
        delta,
    };
    let actions = vec![
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
                    effects: vec![StateEffect::Set {
                        key: "health".to_string(),
                        value: 0,
                    }],
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
    ];
    let planner = ScenarioPlanner::new(
        actions,
        vec![SafetyInvariant {
            id: "stay_alive".to_string(),
            risk_kind: "death".to_string(),
            literal: StateLiteral::new("health", 1),
        }],
        vec![StateLiteral::new("ore", 8), StateLiteral::new("health", 1)],
    )
    .map_err(|e| e.to_string())?;

    let mut state = ScenarioState::default();
    state.world.insert("health".to_string(), 20);
    state.world.insert("ore".to_string(), 0);
    state.risk_ledger.insert("death".to_string(), 100_000);

    let model = TableRiskModel::new()
        .with_action(
            "mine_near_lava",
            vec![
                ("rich_vein", 700_000),
                ("minor_burn", 250_000),
                ("lava_death", 50_000),
            ],
        )
        .with_action("mine_safe_area", vec![("steady", 1_000_000)]);

    Ok((planner, state, model))
}

fn lava_config(horizon: usize) -> ScenarioConfig {
    ScenarioConfig {
        risk_measure: RiskMeasure::ChanceConstraint {
            epsilon_ppm: 100_000,
        },
        risk_aggregation: RiskAggregation::UnionBound,
        horizon_depth: horizon,
    }
}

fn lava_mining() -> Result<(), String> {
    let (planner, state, model) = lava_planner()?;
    let report = planner
        .plan(&state, &model, &lava_config(10))
        .map_err(|e| e.to_string())?;

    expect(
        "constraint_status",
        report.constraint_status,
        ConstraintStatus::Satisfied,
    )?;
    if report.policy_failure_upper_bound_ppm > 100_000 {
        return Err(format!(
            "policy failure bound {}ppm exceeds the death budget",
            report.policy_failure_upper_bound_ppm
        ));
    }
    expect("safety_verified", report.safety_verified, true)?;
    expect(
        "budget_source",
        report.explanation.budget_source,
        BudgetSource::State,
    )?;
    Ok(())
}

fn risk_truncation() -> Result<(), String> {
    let (planner, state, model) = lava_planner()?;
    let report = planner
        .plan(&state, &model, &lava_config(2))
        .map_err(|e| e.to_string())?;

    expect("was_truncated", report.was_truncated, true)?;
    expect(
        "truncation_reason",
        report.truncation_reason,
        Some(TruncationReason::DepthCap),
    )?;
    expect(
        "constraint_status",
        report.constraint_status,
        ConstraintStatus::Unknown,
    )?;
    Ok(())
}

fn village_localization() -> Result<(), String> {
    let hypotheses = [
        "village_north",
        "village_south",
        "village_east",
        "village_west",
    ];
    let mut belief = BeliefState::initialize(&hypotheses, 0).map_err(|e| e.to_string())?;
    for bucket in belief.distribution.values() {
        expect("uniform snap", *bucket, ProbBucket::B3)?;
    }

    let mut evidence = BTreeMap::new();
    evidence.insert("village_north".to_string(), 0.8);
    evidence.insert("village_south".to_string(), 0.1);
    evidence.insert("village_east".to_string(), 0.1);
    evidence.insert("village_west".to_string(), 0.1);

    for tick in 1..=4u64 {
        belief = belief.update(&evidence, tick).map_err(|e| e.to_string())?;
    }

    let check = check_confidence(&belief, DEFAULT_CONFIDENCE_THRESHOLD);
    expect("confidence reached", check.reached, true)?;
    expect(
        "best hypothesis",
        check.best_hypothesis.as_deref(),
        Some("village_north"),
    )?;
    Ok(())
}

async fn torch_corridor() -> Result<(), String> {
    let registry =
        CapabilityRegistry::new(Arc::new(standard_registry()), RegistryConfig::default());
    let now = Utc::now();
    let provenance = Provenance {
        author: "llm-proposer".to_string(),
        code_hash: "0".repeat(64),
        created_at: now,
        parent_lineage: None,
    };
    let document = json!({
        "type": "sequence",
        "children": [
            {"type": "leaf", "leaf_name": "move_to", "args": {"x": 0.0, "y": 64.0, "z": 0.0}},
            {"type": "leaf", "leaf_name": "sense_hostiles"},
            {"type": "leaf", "leaf_name": "place_torch_if_needed"},
            {"type": "leaf", "leaf_name": "step_forward_safely"}
        ]
    });

    let id = registry
        .register_option(
            "opt.torch_corridor",
            "1.0.0",
            document.clone(),
            provenance.clone(),
            ShadowConfig::default(),
            now,
        )
        .map_err(|e| e.to_string())?;
    expect("capability id", id.as_str(), "opt.torch_corridor@1.0.0")?;

    let spec = registry
        .get_spec(&id)
        .ok_or("registered spec missing".to_string())?;
    expect("status", spec.status, CapabilityStatus::Shadow)?;
    let perms: Vec<Permission> = spec.permissions.iter().copied().collect();
    expect(
        "permission union",
        perms,
        vec![Permission::Movement, Permission::Place, Permission::Sense],
    )?;

    let audit = registry.get_audit_log();
    expect("audit entries", audit.len(), 1)?;
    expect("audit op", audit[0].op, AuditOp::RegisterOption)?;

    match registry.register_option(
        "opt.torch_corridor",
        "1.0.0",
        document,
        provenance,
        ShadowConfig::default(),
        now,
    ) {
        Err(RegistryError::VersionExists(_)) => {}
        other => {
            return Err(format!(
                "duplicate registration must return version_exists, got {other:?}"
            ))
        }
    }

    // A few shadow runs accrue statistics against the sim world.
    let ctx = LeafCtx::new(Arc::new(volition_core::SimWorld::new()));
    for i in 0..3 {
        let result = registry
            .execute_shadow_run(&id, &ctx, now + Duration::seconds(i))
            .await
            .map_err(|e| e.to_string())?;
        if !result.is_success() {
            return Err(format!("shadow run {i} failed: {:?}", result.error));
        }
    }
    let stats = registry
        .shadow_stats(&id)
        .ok_or("missing shadow stats".to_string())?;
    expect("total runs", stats.total_runs, 3)?;
    Ok(())
}
