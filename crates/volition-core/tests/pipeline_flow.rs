//! End-to-end pipeline scenarios over the core crate.

use volition_core::{
    derive_drives, derive_needs, BotObservation, Config, Coordinator, GoalType, HomeostasisState,
    NeedType, PipelineInput, RouterKind, Signal, SignalProcessor, SignalType, SignalUrgency,
};

#[test]
fn homeostasis_threshold_scenario() {
    // health 16, food 5, 2 hostiles, night tick 18000
    let obs = BotObservation {
        health: Some(16),
        food: Some(5),
        nearby_hostiles: 2,
        time_of_day: Some(18_000),
    };
    let drives = derive_drives(&obs);
    assert_eq!(drives.health, Some(0.80));
    assert_eq!(drives.hunger, Some(0.75));
    assert_eq!(drives.safety, Some(0.50));
    assert_eq!(drives.energy, Some(0.53));
}

#[test]
fn hunger_alignment_scenario() {
    let mut processor = SignalProcessor::new();

    // food = 5 -> hunger 0.75 > 0.7: nutrition need fires
    let needs = processor.process_tick(
        &[],
        &BotObservation {
            health: Some(20),
            food: Some(5),
            nearby_hostiles: 0,
            time_of_day: Some(0),
        },
    );
    assert!(needs.iter().any(|n| n.need_type == NeedType::Nutrition));

    // food = 6 -> hunger 0.70, not strictly greater: must not fire
    let needs = processor.process_tick(
        &[],
        &BotObservation {
            health: Some(20),
            food: Some(6),
            nearby_hostiles: 0,
            time_of_day: Some(0),
        },
    );
    assert!(!needs.iter().any(|n| n.need_type == NeedType::Nutrition));
}

#[test]
fn clamping_property_over_input_grid() {
    for health in -100..=100i64 {
        for food in -10..=40i64 {
            let obs = BotObservation {
                health: Some(health),
                food: Some(food),
                nearby_hostiles: (health.unsigned_abs() % 5) as u32,
                time_of_day: Some((food.unsigned_abs() as u32 * 600) % 24_000),
            };
            let d = derive_drives(&obs);
            for v in [d.health, d.hunger, d.energy, d.safety, d.defensive_readiness]
                .into_iter()
                .flatten()
            {
                assert!((0.0..=1.0).contains(&v));
                assert!(((v * 100.0).round() - v * 100.0).abs() < 1e-9);
            }
        }
    }
}

#[test]
fn needs_use_strict_thresholds() {
    // Exactly at every threshold: no rule may fire.
    let state = HomeostasisState {
        health: 0.3,  // survival deficit exactly 0.7
        hunger: 0.7,  // nutrition threshold
        safety: 0.5,  // safety deficit exactly 0.5
        curiosity: 0.6,
        social: 0.6,
        achievement: 0.5,
        creativity: 0.6,
        ..Default::default()
    };
    assert!(derive_needs(&state).is_empty());
}

#[tokio::test]
async fn hungry_night_pipeline_selects_survival_goal() {
    let mut coordinator = Coordinator::new(Config::default());
    let signals = vec![
        Signal::new(SignalType::Food, 5.0, SignalUrgency::High),
        Signal::new(SignalType::HostileProximity, 2.0, SignalUrgency::Medium),
    ];
    let input = PipelineInput {
        observation: BotObservation {
            health: Some(16),
            food: Some(5),
            nearby_hostiles: 2,
            time_of_day: Some(18_000),
        },
        ..Default::default()
    };

    let result = coordinator.plan_and_execute(&signals, &input).await.unwrap();

    // Nutrition and safety both fire; the primary must be one of them and
    // the plan must be well-formed.
    let primary = &result.ranked_goals[0].goal;
    assert!(matches!(
        primary.goal_type,
        GoalType::SatisfyHunger | GoalType::ReachSafety
    ));
    assert!(result.plan.validate().is_ok());
    assert_ne!(result.decision.router, RouterKind::Reactive);
}

#[tokio::test]
async fn repeated_pipelines_keep_plans_registered() {
    let mut coordinator = Coordinator::new(Config::default());
    let input = PipelineInput {
        observation: BotObservation {
            health: Some(16),
            food: Some(5),
            nearby_hostiles: 0,
            time_of_day: Some(0),
        },
        ..Default::default()
    };
    let signals = vec![Signal::new(SignalType::Food, 5.0, SignalUrgency::High)];

    let a = coordinator.plan_and_execute(&signals, &input).await.unwrap();
    let b = coordinator.plan_and_execute(&signals, &input).await.unwrap();
    assert_eq!(coordinator.active_plans().len(), 2);
    assert!(coordinator.active_plans().contains_key(&a.plan.id));
    assert!(coordinator.active_plans().contains_key(&b.plan.id));
}
