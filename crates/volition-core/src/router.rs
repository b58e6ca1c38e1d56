//! Cognitive router: classify the primary goal and pick a planner.
//!
//! The mapping is deterministic; the emergency short-circuit wins over
//! every other flag.

use serde::{Deserialize, Serialize};

use crate::domain::{Goal, GoalType, SignalUrgency};

/// Planner families the router can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouterKind {
    HrmStructured,
    Llm,
    Collaborative,
    Reactive,
}

/// Classification of the primary goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskClassification {
    pub domain: String,
    pub urgency: SignalUrgency,
    pub requires_structured: bool,
    pub requires_creativity: bool,
    pub requires_world_knowledge: bool,
}

/// The routing decision with its rationale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDecision {
    pub router: RouterKind,
    pub reasoning: String,
}

/// Classify a goal for routing.
pub fn classify_goal(goal: &Goal, urgency: SignalUrgency) -> TaskClassification {
    let (domain, structured, creative, world) = match goal.goal_type {
        GoalType::SatisfyHunger => ("survival", true, false, true),
        GoalType::RestoreHealth => ("survival", true, false, true),
        GoalType::ReachSafety => ("survival", true, false, true),
        GoalType::Explore => ("exploration", false, true, true),
        GoalType::Socialize => ("social", false, true, true),
        GoalType::Achieve => ("progression", true, true, true),
        GoalType::Create => ("creative", false, true, false),
        GoalType::Investigate => ("exploration", true, true, true),
    };
    TaskClassification {
        domain: domain.to_string(),
        urgency,
        requires_structured: structured,
        requires_creativity: creative,
        requires_world_knowledge: world,
    }
}

/// Map a classification to a planner.
pub fn route(classification: &TaskClassification) -> TaskDecision {
    if classification.urgency == SignalUrgency::Emergency {
        return TaskDecision {
            router: RouterKind::Reactive,
            reasoning: "emergency urgency requires immediate reactive response".to_string(),
        };
    }

    let decision = match (
        classification.requires_structured,
        classification.requires_creativity,
    ) {
        (true, false) => (
            RouterKind::HrmStructured,
            "structured task without creative requirements",
        ),
        (false, true) => (
            RouterKind::Llm,
            "creative task without structured requirements",
        ),
        (true, true) => (
            RouterKind::Collaborative,
            "task requires both structured and creative planning",
        ),
        (false, false) => (RouterKind::Llm, "no strong signal; defaulting to llm"),
    };

    TaskDecision {
        router: decision.0,
        reasoning: format!("{} (domain: {})", decision.1, classification.domain),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Goal;

    fn classify(goal_type: GoalType, urgency: SignalUrgency) -> TaskDecision {
        let goal = Goal::new(goal_type, 0.5, 0.5, 0.5);
        route(&classify_goal(&goal, urgency))
    }

    #[test]
    fn test_emergency_short_circuits_to_reactive() {
        for goal_type in [GoalType::Create, GoalType::SatisfyHunger, GoalType::Achieve] {
            let d = classify(goal_type, SignalUrgency::Emergency);
            assert_eq!(d.router, RouterKind::Reactive);
        }
    }

    #[test]
    fn test_structured_not_creative_routes_hrm() {
        let d = classify(GoalType::SatisfyHunger, SignalUrgency::Medium);
        assert_eq!(d.router, RouterKind::HrmStructured);
    }

    #[test]
    fn test_creative_not_structured_routes_llm() {
        let d = classify(GoalType::Create, SignalUrgency::Low);
        assert_eq!(d.router, RouterKind::Llm);
    }

    #[test]
    fn test_structured_and_creative_routes_collaborative() {
        let d = classify(GoalType::Achieve, SignalUrgency::Medium);
        assert_eq!(d.router, RouterKind::Collaborative);
    }

    #[test]
    fn test_reasoning_mentions_domain() {
        let d = classify(GoalType::Explore, SignalUrgency::Low);
        assert!(d.reasoning.contains("exploration"));
    }
}
