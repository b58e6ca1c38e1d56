//! Goal generation and priority scoring.
//!
//! Each need becomes one candidate goal (`priority = intensity * urgency`,
//! `utility = intensity`). The scorer then ranks candidates by a weighted
//! utility; ties break by goal id so rankings are reproducible.

use serde::{Deserialize, Serialize};

use crate::domain::{Condition, Goal, GoalType, HomeostasisState, Need};

/// Weights for the priority scorer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub need_intensity: f64,
    pub need_urgency: f64,
    pub health_risk: f64,
    pub safety_risk: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            need_intensity: 0.4,
            need_urgency: 0.3,
            health_risk: 0.2,
            safety_risk: 0.1,
        }
    }
}

/// A ranked goal with its composite score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredGoal {
    pub goal: Goal,
    pub score: f64,
}

/// Convert each need into one candidate goal.
pub fn generate_goals(needs: &[Need]) -> Vec<Goal> {
    needs
        .iter()
        .map(|need| {
            let goal_type = GoalType::for_need(need.need_type);
            let mut goal = Goal::new(
                goal_type,
                need.intensity * need.urgency,
                need.urgency,
                need.intensity,
            );
            goal.effects.push(satisfaction_effect(goal_type));
            goal
        })
        .collect()
}

/// The world-state literal a goal family establishes when satisfied.
fn satisfaction_effect(goal_type: GoalType) -> Condition {
    let key = match goal_type {
        GoalType::SatisfyHunger => "hunger_satisfied",
        GoalType::RestoreHealth => "health_restored",
        GoalType::ReachSafety => "in_safe_area",
        GoalType::Explore => "area_explored",
        GoalType::Socialize => "social_contact",
        GoalType::Achieve => "achievement_made",
        GoalType::Create => "artifact_created",
        GoalType::Investigate => "question_answered",
    };
    Condition {
        key: key.to_string(),
        value: 1,
    }
}

/// Rank candidate goals by weighted utility, descending. Ties break by id.
pub fn rank_goals(
    goals: Vec<Goal>,
    homeostasis: &HomeostasisState,
    weights: &ScoreWeights,
) -> Vec<ScoredGoal> {
    let health_risk = 1.0 - homeostasis.health;
    let safety_risk = 1.0 - homeostasis.safety.min(homeostasis.defensive_readiness);

    let mut scored: Vec<ScoredGoal> = goals
        .into_iter()
        .map(|goal| {
            let score = weights.need_intensity * goal.utility
                + weights.need_urgency * goal.urgency
                + weights.health_risk * health_risk
                + weights.safety_risk * safety_risk;
            ScoredGoal { goal, score }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.goal.id.cmp(&b.goal.id))
    });
    scored
}

/// Retains goals across ticks; terminal goals are garbage-collected
/// beyond a retention cap (oldest first).
pub struct GoalStore {
    goals: std::collections::BTreeMap<String, Goal>,
    retention: usize,
}

impl GoalStore {
    pub fn new(retention: usize) -> Self {
        Self {
            goals: std::collections::BTreeMap::new(),
            retention,
        }
    }

    pub fn insert(&mut self, goal: Goal) {
        self.goals.insert(goal.id.clone(), goal);
        self.gc_terminal();
    }

    pub fn get(&self, id: &str) -> Option<&Goal> {
        self.goals.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Goal> {
        self.goals.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.goals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.goals.is_empty()
    }

    fn gc_terminal(&mut self) {
        let mut terminal: Vec<(chrono::DateTime<chrono::Utc>, String)> = self
            .goals
            .values()
            .filter(|g| g.status.is_terminal())
            .map(|g| (g.updated_at, g.id.clone()))
            .collect();
        if terminal.len() <= self.retention {
            return;
        }
        terminal.sort();
        let excess = terminal.len() - self.retention;
        for (_, id) in terminal.into_iter().take(excess) {
            self.goals.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GoalStatus, NeedType};
    use chrono::Utc;

    #[test]
    fn test_goal_from_need_priority_contract() {
        let need = Need::new(NeedType::Nutrition, 0.8, 0.9);
        let goals = generate_goals(&[need]);
        assert_eq!(goals.len(), 1);
        let g = &goals[0];
        assert_eq!(g.goal_type, GoalType::SatisfyHunger);
        assert!((g.priority - 0.72).abs() < 1e-9);
        assert!((g.utility - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_rank_orders_by_weighted_score() {
        let urgent = Need::new(NeedType::Safety, 0.9, 0.9);
        let mild = Need::new(NeedType::Creativity, 0.3, 0.2);
        let goals = generate_goals(&[mild, urgent]);
        let ranked = rank_goals(goals, &HomeostasisState::default(), &ScoreWeights::default());
        assert_eq!(ranked[0].goal.goal_type, GoalType::ReachSafety);
        assert!(ranked[0].score > ranked[1].score);
    }

    #[test]
    fn test_rank_ties_break_by_id() {
        let a = Need::new(NeedType::Social, 0.7, 0.7);
        let b = Need::new(NeedType::Creativity, 0.7, 0.7);
        let goals = generate_goals(&[a, b]);
        let ranked = rank_goals(
            goals.clone(),
            &HomeostasisState::default(),
            &ScoreWeights::default(),
        );
        let ranked2 = rank_goals(goals, &HomeostasisState::default(), &ScoreWeights::default());
        let ids: Vec<_> = ranked.iter().map(|s| s.goal.id.clone()).collect();
        let ids2: Vec<_> = ranked2.iter().map(|s| s.goal.id.clone()).collect();
        assert_eq!(ids, ids2);
        assert!(ids[0] < ids[1]);
    }

    #[test]
    fn test_goal_store_gc_keeps_recent_terminals() {
        let mut store = GoalStore::new(2);
        let now = Utc::now();
        let mut ids = Vec::new();
        for i in 0..4 {
            let mut goal = Goal::new(GoalType::Explore, 0.5, 0.5, 0.5);
            goal.transition(GoalStatus::Active, now).unwrap();
            goal.transition(GoalStatus::Completed, now + chrono::Duration::seconds(i))
                .unwrap();
            ids.push(goal.id.clone());
            store.insert(goal);
        }
        assert_eq!(store.len(), 2, "only the retention cap survives");
        assert!(store.get(&ids[3]).is_some(), "newest terminal retained");
        assert!(store.get(&ids[0]).is_none(), "oldest terminal collected");
    }

    #[test]
    fn test_goal_store_never_collects_live_goals() {
        let mut store = GoalStore::new(1);
        let mut live_ids = Vec::new();
        for _ in 0..5 {
            let goal = Goal::new(GoalType::Explore, 0.5, 0.5, 0.5);
            live_ids.push(goal.id.clone());
            store.insert(goal);
        }
        assert_eq!(store.len(), 5);
        for id in &live_ids {
            assert!(store.get(id).is_some());
        }
    }

    #[test]
    fn test_health_risk_raises_scores() {
        let need = Need::new(NeedType::Nutrition, 0.8, 0.8);
        let goals = generate_goals(&[need]);

        let healthy = rank_goals(
            goals.clone(),
            &HomeostasisState::default(),
            &ScoreWeights::default(),
        );
        let wounded_state = HomeostasisState {
            health: 0.1,
            ..Default::default()
        };
        let wounded = rank_goals(goals, &wounded_state, &ScoreWeights::default());
        assert!(wounded[0].score > healthy[0].score);
    }
}
