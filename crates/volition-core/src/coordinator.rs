//! Integrated planning coordinator.
//!
//! One `plan_and_execute` invocation runs the pipeline strictly in order:
//! goal formulation, cognitive routing, plan generation, quality
//! assessment, registration. A stage failure emits `PlanningError` with a
//! structured cause and never leaves the primary goal `Active`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::domain::{
    Action, BotObservation, CoreError, Goal, GoalStatus, GoalType, Plan, PlanStep, Result, Signal,
    SignalUrgency,
};
use crate::events::{Observer, ObserverSet, PlanningEvent};
use crate::goals::{generate_goals, rank_goals, GoalStore, ScoreWeights, ScoredGoal};
use crate::htn::{placeholder_plan, HtnDomain, PlanningContext};
use crate::obs;
use crate::proposer::{CapabilityProposer, Proposal, ProposalRequest};
use crate::reactive::{GoapGoal, GoapState, ReactivePlanner, Requirement};
use crate::router::{classify_goal, route, RouterKind, TaskDecision};
use crate::signals::SignalProcessor;
use crate::structured::{merge_plans, StructuredPlanner};

/// Four quality scores plus the derived contract fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanQuality {
    pub feasibility: f64,
    pub optimality: f64,
    pub coherence: f64,
    pub risk: f64,
    /// Contract: equals `feasibility`.
    pub confidence: f64,
    /// Contract: equals `optimality`.
    pub estimated_success: f64,
}

/// Everything a pipeline invocation needs from the caller.
#[derive(Debug, Clone, Default)]
pub struct PipelineInput {
    pub observation: BotObservation,
    pub planning: PlanningContext,
    /// Reactive-planner world literals.
    pub goap_state: GoapState,
    /// Overall pipeline deadline; sub-planners also honor the configured
    /// per-planner budget.
    pub deadline: Option<Instant>,
}

/// The output of one pipeline invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanningResult {
    pub pipeline_id: uuid::Uuid,
    pub ranked_goals: Vec<ScoredGoal>,
    pub decision: TaskDecision,
    pub plan: Plan,
    pub quality: PlanQuality,
}

/// The integrated planning coordinator.
pub struct Coordinator {
    config: Config,
    processor: SignalProcessor,
    htn: HtnDomain,
    structured: StructuredPlanner,
    reactive: ReactivePlanner,
    weights: ScoreWeights,
    proposer: Option<Arc<dyn CapabilityProposer>>,
    observers: ObserverSet<PlanningEvent>,
    active_plans: BTreeMap<uuid::Uuid, Plan>,
    goals: GoalStore,
}

impl Coordinator {
    pub fn new(config: Config) -> Self {
        let budget = config.planner_budget();
        let retention = config.goal_retention;
        Self {
            config,
            processor: SignalProcessor::new(),
            htn: HtnDomain::standard(),
            structured: StructuredPlanner::new(),
            reactive: ReactivePlanner::standard().with_budget(budget),
            weights: ScoreWeights::default(),
            proposer: None,
            observers: ObserverSet::new(),
            active_plans: BTreeMap::new(),
            goals: GoalStore::new(retention),
        }
    }

    pub fn with_proposer(mut self, proposer: Arc<dyn CapabilityProposer>) -> Self {
        self.proposer = Some(proposer);
        self
    }

    pub fn subscribe(&mut self, observer: Arc<dyn Observer<PlanningEvent>>) {
        self.observers.subscribe(observer);
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn active_plans(&self) -> &BTreeMap<uuid::Uuid, Plan> {
        &self.active_plans
    }

    pub fn goals(&self) -> &GoalStore {
        &self.goals
    }

    /// Impasse side-channel: ask the external proposer for either task
    /// suggestions or a BT-DSL capability document, bounded by the
    /// configured execution timeout. The caller forwards any `OptionDsl`
    /// proposal to the capability registry's shadow track.
    pub async fn propose_capability(&self, request: &ProposalRequest) -> Option<Proposal> {
        let proposer = self.proposer.as_ref()?;
        let timeout = std::time::Duration::from_millis(self.config.llm_execution_timeout_ms);
        match tokio::time::timeout(timeout, proposer.propose(request)).await {
            Ok(proposal) => proposal,
            Err(_elapsed) => {
                tracing::warn!(event = "proposer.timeout", task = %request.task);
                None
            }
        }
    }

    /// Run the full pipeline for one tick of signals.
    pub async fn plan_and_execute(
        &mut self,
        signals: &[Signal],
        input: &PipelineInput,
    ) -> Result<PlanningResult> {
        let pipeline_id = uuid::Uuid::new_v4();
        let _span = obs::PipelineSpan::enter(&pipeline_id.to_string());
        let started = Instant::now();
        obs::emit_pipeline_started(&pipeline_id.to_string(), signals.len());

        match self.run_pipeline(pipeline_id, signals, input).await {
            Ok(result) => {
                obs::emit_pipeline_finished(
                    &pipeline_id.to_string(),
                    &format!("{:?}", result.decision.router),
                    result.plan.steps.len(),
                    started.elapsed().as_millis() as u64,
                );
                Ok(result)
            }
            Err(err) => {
                let (stage, cause) = match &err {
                    CoreError::PlanningFailed { stage, cause } => (stage.clone(), cause.clone()),
                    other => ("pipeline".to_string(), other.to_string()),
                };
                obs::emit_pipeline_error(&pipeline_id.to_string(), &stage, &cause);
                self.observers
                    .publish(PlanningEvent::PlanningError { stage, cause });
                Err(err)
            }
        }
    }

    async fn run_pipeline(
        &mut self,
        pipeline_id: uuid::Uuid,
        signals: &[Signal],
        input: &PipelineInput,
    ) -> Result<PlanningResult> {
        // 1. Goal formulation
        self.check_deadline(input, "goal_formulation")?;
        let needs = self.processor.process_tick(signals, &input.observation);
        let mut goals = generate_goals(&needs);
        if goals.is_empty() {
            // A quiet world still yields an idle investigation goal so the
            // pipeline always has a primary.
            goals.push(Goal::new(GoalType::Investigate, 0.1, 0.1, 0.1));
        }
        let homeostasis = *self.processor.homeostasis();
        let ranked = rank_goals(goals, &homeostasis, &self.weights);

        // 2. Cognitive routing
        self.check_deadline(input, "routing")?;
        let urgency = signals
            .iter()
            .map(|s| s.urgency)
            .max()
            .unwrap_or(SignalUrgency::Low);
        let mut primary = ranked[0].goal.clone();
        let decision = route(&classify_goal(&primary, urgency));

        // 3. Plan generation
        self.check_deadline(input, "plan_generation")?;
        let plan = self
            .generate_plan(&primary, &decision, input)
            .await
            .map_err(|e| CoreError::PlanningFailed {
                stage: "plan_generation".to_string(),
                cause: e.to_string(),
            })?;

        // 4. Quality assessment
        self.check_deadline(input, "quality_assessment")?;
        plan.validate()?;
        let quality = assess_quality(&plan, &homeostasis, &input.goap_state);

        // 5. Register for execution. The goal goes Active only now, after
        // every fallible stage, so failures cannot strand it.
        primary.transition(GoalStatus::Active, Utc::now())?;
        self.active_plans.insert(plan.id, plan.clone());

        self.observers.publish(PlanningEvent::PlanningComplete {
            plan_id: plan.id,
            goal_id: primary.id.clone(),
            decision: decision.clone(),
        });
        self.observers
            .publish(PlanningEvent::PlanReady { plan_id: plan.id });

        let mut ranked = ranked;
        ranked[0].goal = primary;
        for scored in &ranked {
            self.goals.insert(scored.goal.clone());
        }

        Ok(PlanningResult {
            pipeline_id,
            ranked_goals: ranked,
            decision,
            plan,
            quality,
        })
    }

    async fn generate_plan(
        &self,
        goal: &Goal,
        decision: &TaskDecision,
        input: &PipelineInput,
    ) -> Result<Plan> {
        let plan = match decision.router {
            RouterKind::Reactive => self.reactive_plan(goal, input),
            RouterKind::HrmStructured => self.htn.decompose(goal, &input.planning),
            RouterKind::Collaborative => {
                let outline = self.structured.outline(goal);
                let detail = self.htn.decompose(goal, &input.planning);
                merge_plans(&outline, &detail)
            }
            RouterKind::Llm => self.llm_plan(goal).await,
        };

        // Empty decomposition: synthesize the minimal placeholder plan.
        if plan.is_empty() {
            return Ok(placeholder_plan(goal));
        }
        Ok(plan)
    }

    fn reactive_plan(&self, goal: &Goal, input: &PipelineInput) -> Plan {
        let literals: Vec<Requirement> = goal
            .effects
            .iter()
            .map(|c| Requirement {
                key: c.key.clone(),
                min: c.value,
            })
            .collect();
        let goap_goal = GoapGoal { literals };

        match self.reactive.plan(&input.goap_state, &goap_goal) {
            Some(names) => {
                let mut steps: Vec<PlanStep> = Vec::with_capacity(names.len());
                for (i, name) in names.iter().enumerate() {
                    let mut step =
                        PlanStep::new(format!("{}-r{}", goal.id, i), Action::named(name.clone()));
                    if i > 0 {
                        step.dependencies.push(format!("{}-r{}", goal.id, i - 1));
                    }
                    steps.push(step);
                }
                let mut plan = Plan::new(goal.id.clone(), steps);
                plan.priority = goal.priority;
                plan.success_probability = 0.8;
                plan
            }
            None => Plan::new(goal.id.clone(), Vec::new()),
        }
    }

    async fn llm_plan(&self, goal: &Goal) -> Plan {
        let Some(proposer) = &self.proposer else {
            return Plan::new(goal.id.clone(), Vec::new());
        };

        let request = ProposalRequest {
            task: format!("{:?}", goal.goal_type),
            recent_failures: Vec::new(),
            context: serde_json::json!({ "goal_id": goal.id }),
        };
        let timeout = std::time::Duration::from_millis(self.config.llm_planning_timeout_ms);
        let proposal = match tokio::time::timeout(timeout, proposer.propose(&request)).await {
            Ok(Some(p)) => p,
            _ => return Plan::new(goal.id.clone(), Vec::new()),
        };

        match proposal {
            Proposal::Tasks { suggestions } => {
                let mut steps: Vec<PlanStep> = Vec::with_capacity(suggestions.len());
                for (i, s) in suggestions.iter().enumerate() {
                    let mut step = PlanStep::new(
                        format!("{}-s{}", goal.id, i),
                        Action::named(s.action_type.clone()),
                    );
                    if i > 0 {
                        step.dependencies.push(format!("{}-s{}", goal.id, i - 1));
                    }
                    steps.push(step);
                }
                let mut plan = Plan::new(goal.id.clone(), steps);
                plan.priority = goal.priority;
                plan
            }
            // A BT-DSL proposal is a capability, not a plan; registration is
            // the registry's job. The pipeline falls back to the placeholder.
            Proposal::OptionDsl { .. } => Plan::new(goal.id.clone(), Vec::new()),
        }
    }

    fn check_deadline(&self, input: &PipelineInput, stage: &str) -> Result<()> {
        if let Some(deadline) = input.deadline {
            if Instant::now() >= deadline {
                return Err(CoreError::PlanningFailed {
                    stage: stage.to_string(),
                    cause: "pipeline deadline exceeded".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Mark an active plan completed.
    pub fn complete_plan(&mut self, plan_id: uuid::Uuid) -> Result<()> {
        self.active_plans
            .remove(&plan_id)
            .ok_or(CoreError::PlanNotFound(plan_id))?;
        self.observers
            .publish(PlanningEvent::PlanCompleted { plan_id });
        Ok(())
    }

    /// Mark an active plan failed.
    pub fn fail_plan(&mut self, plan_id: uuid::Uuid, cause: impl Into<String>) -> Result<()> {
        self.active_plans
            .remove(&plan_id)
            .ok_or(CoreError::PlanNotFound(plan_id))?;
        self.observers.publish(PlanningEvent::PlanFailed {
            plan_id,
            cause: cause.into(),
        });
        Ok(())
    }

    /// Report a recoverable execution error against an active plan. The
    /// plan stays registered; callers decide whether to retry or fail it.
    pub fn report_plan_error(&mut self, plan_id: uuid::Uuid, cause: impl Into<String>) -> Result<()> {
        if !self.active_plans.contains_key(&plan_id) {
            return Err(CoreError::PlanNotFound(plan_id));
        }
        self.observers.publish(PlanningEvent::PlanError {
            plan_id,
            cause: cause.into(),
        });
        Ok(())
    }
}

/// Compute the four quality scores.
///
/// Contract: `confidence = feasibility`, `estimated_success = optimality`.
pub fn assess_quality(
    plan: &Plan,
    homeostasis: &crate::domain::HomeostasisState,
    goap_state: &GoapState,
) -> PlanQuality {
    let total = plan.steps.len().max(1) as f64;
    let feasible = plan
        .steps
        .iter()
        .filter(|s| {
            s.action
                .preconditions
                .iter()
                .all(|c| goap_state.get(&c.key).copied().unwrap_or(0) >= c.value)
        })
        .count() as f64;
    let feasibility = feasible / total;

    let avg_cost = plan.total_cost() / total;
    let optimality = (1.0 / avg_cost.max(1.0)).clamp(0.0, 1.0);

    let coherence = if plan.is_empty() {
        0.0
    } else if plan.validate().is_ok() {
        1.0
    } else {
        0.2
    };

    let risk = (1.0 - homeostasis.safety).clamp(0.0, 1.0);

    PlanQuality {
        feasibility,
        optimality,
        coherence,
        risk,
        confidence: feasibility,
        estimated_success: optimality,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Signal, SignalType};
    use crate::events::CollectingObserver;

    fn hungry_input() -> (Vec<Signal>, PipelineInput) {
        let signals = vec![Signal::new(SignalType::Food, 5.0, SignalUrgency::High)];
        let input = PipelineInput {
            observation: BotObservation {
                health: Some(16),
                food: Some(5),
                nearby_hostiles: 0,
                time_of_day: Some(1_000),
            },
            ..Default::default()
        };
        (signals, input)
    }

    #[tokio::test]
    async fn test_pipeline_produces_plan_and_activates_primary() {
        let mut coordinator = Coordinator::new(Config::default());
        let (signals, input) = hungry_input();

        let result = coordinator.plan_and_execute(&signals, &input).await.unwrap();
        assert!(!result.plan.is_empty());
        assert_eq!(result.ranked_goals[0].goal.status, GoalStatus::Active);
        assert_eq!(
            result.ranked_goals[0].goal.goal_type,
            GoalType::SatisfyHunger
        );
        assert!(coordinator.active_plans().contains_key(&result.plan.id));
    }

    #[tokio::test]
    async fn test_quality_contract_fields() {
        let mut coordinator = Coordinator::new(Config::default());
        let (signals, input) = hungry_input();

        let result = coordinator.plan_and_execute(&signals, &input).await.unwrap();
        assert_eq!(result.quality.confidence, result.quality.feasibility);
        assert_eq!(result.quality.estimated_success, result.quality.optimality);
        for v in [
            result.quality.feasibility,
            result.quality.optimality,
            result.quality.coherence,
            result.quality.risk,
        ] {
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[tokio::test]
    async fn test_emergency_routes_reactive() {
        let mut coordinator = Coordinator::new(Config::default());
        let signals = vec![Signal::new(
            SignalType::HostileProximity,
            3.0,
            SignalUrgency::Emergency,
        )];
        let input = PipelineInput {
            observation: BotObservation {
                health: Some(6),
                food: Some(20),
                nearby_hostiles: 3,
                time_of_day: Some(18_000),
            },
            ..Default::default()
        };

        let result = coordinator.plan_and_execute(&signals, &input).await.unwrap();
        assert_eq!(result.decision.router, RouterKind::Reactive);
        assert!(!result.plan.is_empty());
    }

    #[tokio::test]
    async fn test_quiet_world_still_plans() {
        let mut coordinator = Coordinator::new(Config::default());
        let input = PipelineInput {
            observation: BotObservation {
                health: Some(20),
                food: Some(20),
                nearby_hostiles: 0,
                time_of_day: Some(1_000),
            },
            ..Default::default()
        };

        let result = coordinator.plan_and_execute(&[], &input).await.unwrap();
        assert_eq!(
            result.ranked_goals[0].goal.goal_type,
            GoalType::Investigate
        );
        assert!(!result.plan.is_empty());
    }

    #[tokio::test]
    async fn test_events_emitted_on_success() {
        let mut coordinator = Coordinator::new(Config::default());
        let collector = Arc::new(CollectingObserver::new());
        coordinator.subscribe(collector.clone());

        let (signals, input) = hungry_input();
        let result = coordinator.plan_and_execute(&signals, &input).await.unwrap();

        let events = collector.collected();
        assert!(events.iter().any(|e| matches!(
            &e.event,
            PlanningEvent::PlanningComplete { plan_id, .. } if *plan_id == result.plan.id
        )));
        assert!(events
            .iter()
            .any(|e| matches!(&e.event, PlanningEvent::PlanReady { .. })));
    }

    #[tokio::test]
    async fn test_plan_lifecycle_events() {
        let mut coordinator = Coordinator::new(Config::default());
        let collector = Arc::new(CollectingObserver::new());
        coordinator.subscribe(collector.clone());

        let (signals, input) = hungry_input();
        let result = coordinator.plan_and_execute(&signals, &input).await.unwrap();

        coordinator
            .report_plan_error(result.plan.id, "step retry")
            .unwrap();
        assert!(coordinator.active_plans().contains_key(&result.plan.id));
        assert!(collector
            .collected()
            .iter()
            .any(|e| matches!(&e.event, PlanningEvent::PlanError { .. })));

        coordinator.complete_plan(result.plan.id).unwrap();
        assert!(!coordinator.active_plans().contains_key(&result.plan.id));
        assert!(collector
            .collected()
            .iter()
            .any(|e| matches!(&e.event, PlanningEvent::PlanCompleted { .. })));

        // Completing again is an error.
        assert!(coordinator.complete_plan(result.plan.id).is_err());
    }

    #[tokio::test]
    async fn test_goal_store_accumulates_across_ticks() {
        let mut coordinator = Coordinator::new(Config::default());
        let (signals, input) = hungry_input();
        coordinator.plan_and_execute(&signals, &input).await.unwrap();
        coordinator.plan_and_execute(&signals, &input).await.unwrap();
        assert!(coordinator.goals().len() >= 2);
    }

    #[tokio::test]
    async fn test_propose_capability_roundtrip() {
        use crate::proposer::StaticProposer;

        let coordinator = Coordinator::new(Config::default()).with_proposer(Arc::new(
            StaticProposer::with_option_dsl(serde_json::json!({"type": "sequence"})),
        ));
        let request = ProposalRequest {
            task: "cross the ravine".to_string(),
            recent_failures: vec!["fell twice".to_string()],
            context: serde_json::Value::Null,
        };
        match coordinator.propose_capability(&request).await {
            Some(crate::proposer::Proposal::OptionDsl { document }) => {
                assert_eq!(document["type"], "sequence");
            }
            other => panic!("expected OptionDsl proposal, got {:?}", other),
        }

        // Without a proposer the impasse channel yields nothing.
        let bare = Coordinator::new(Config::default());
        assert!(bare.propose_capability(&request).await.is_none());
    }

    #[tokio::test]
    async fn test_expired_deadline_fails_cleanly() {
        let mut coordinator = Coordinator::new(Config::default());
        let collector = Arc::new(CollectingObserver::new());
        coordinator.subscribe(collector.clone());

        let (signals, mut input) = hungry_input();
        input.deadline = Some(Instant::now() - std::time::Duration::from_millis(1));

        let err = coordinator
            .plan_and_execute(&signals, &input)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::PlanningFailed { .. }));
        assert!(coordinator.active_plans().is_empty());
        assert!(collector
            .collected()
            .iter()
            .any(|e| matches!(&e.event, PlanningEvent::PlanningError { .. })));
    }
}
