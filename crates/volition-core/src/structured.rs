//! HRM-style structured planner.
//!
//! Produces a coarse, high-level phase ordering for a goal. On its own it
//! yields an abstract plan; in the collaborative route its ordering is
//! merged with HTN step detail.

use crate::domain::{Action, Goal, GoalType, Plan, PlanStep};

/// Phase names for a goal family, in execution order.
fn phases(goal_type: GoalType) -> &'static [&'static str] {
    match goal_type {
        GoalType::SatisfyHunger => &["assess_reserves", "acquire_food", "consume"],
        GoalType::RestoreHealth => &["assess_damage", "stabilize", "recover"],
        GoalType::ReachSafety => &["assess_threats", "relocate", "verify_safe"],
        GoalType::Explore => &["pick_region", "traverse", "record_findings"],
        GoalType::Socialize => &["locate_peers", "engage", "conclude"],
        GoalType::Achieve => &["scope_milestone", "prepare", "execute", "verify"],
        GoalType::Create => &["design", "prepare", "build", "review"],
        GoalType::Investigate => &["frame_question", "probe", "conclude"],
    }
}

/// Deterministic structured planner.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredPlanner;

impl StructuredPlanner {
    pub fn new() -> Self {
        Self
    }

    /// Build the high-level phase plan for a goal.
    pub fn outline(&self, goal: &Goal) -> Plan {
        let mut steps = Vec::new();
        for (i, phase) in phases(goal.goal_type).iter().enumerate() {
            let mut step = PlanStep::new(format!("{}-phase-{}", goal.id, i), Action::named(*phase));
            if i > 0 {
                step.dependencies.push(format!("{}-phase-{}", goal.id, i - 1));
            }
            steps.push(step);
        }
        let mut plan = Plan::new(goal.id.clone(), steps);
        plan.priority = goal.priority;
        plan.success_probability = 0.6;
        plan
    }
}

/// Merge an HRM-style outline with an HTN decomposition.
///
/// The outline contributes the high-level ordering; the HTN plan
/// contributes detailed steps. Merged priority is the max, success
/// probability the mean, and estimated duration the min of the inputs.
pub fn merge_plans(outline: &Plan, detail: &Plan) -> Plan {
    let steps = if detail.is_empty() {
        outline.steps.clone()
    } else {
        detail.steps.clone()
    };

    let mut merged = Plan::new(detail.goal_id.clone(), steps);
    merged.priority = outline.priority.max(detail.priority);
    merged.success_probability =
        (outline.success_probability + detail.success_probability) / 2.0;
    merged.estimated_duration_ms = outline
        .estimated_duration_ms
        .min(detail.estimated_duration_ms);
    merged
}
