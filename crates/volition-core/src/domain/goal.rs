//! Goals and their status machine.
//!
//! Status transitions form a DAG: `Pending -> Active -> (Completed | Failed |
//! Suspended)`, `Suspended -> Pending`. Terminal states are sticky; illegal
//! transitions are rejected without mutating the goal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::digest::compute_digest;
use crate::domain::error::{CoreError, Result};
use crate::domain::need::NeedType;

/// Closed goal taxonomy, one per need family plus structured work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    SatisfyHunger,
    RestoreHealth,
    ReachSafety,
    Explore,
    Socialize,
    Achieve,
    Create,
    Investigate,
}

impl GoalType {
    /// The goal family that addresses a need.
    pub fn for_need(need: NeedType) -> Self {
        match need {
            NeedType::Nutrition => GoalType::SatisfyHunger,
            NeedType::Survival => GoalType::RestoreHealth,
            NeedType::Safety => GoalType::ReachSafety,
            NeedType::Exploration => GoalType::Explore,
            NeedType::Social => GoalType::Socialize,
            NeedType::Achievement => GoalType::Achieve,
            NeedType::Creativity => GoalType::Create,
            NeedType::Curiosity => GoalType::Investigate,
        }
    }
}

/// Goal lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Pending,
    Active,
    Suspended,
    Completed,
    Failed,
}

impl GoalStatus {
    /// Whether `self -> to` is a legal transition.
    pub fn can_transition(self, to: GoalStatus) -> bool {
        use GoalStatus::*;
        matches!(
            (self, to),
            (Pending, Active)
                | (Active, Completed)
                | (Active, Failed)
                | (Active, Suspended)
                | (Suspended, Pending)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, GoalStatus::Completed | GoalStatus::Failed)
    }
}

/// A world-state literal used in goal preconditions and effects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub key: String,
    pub value: i64,
}

/// A candidate or active goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub goal_type: GoalType,
    pub priority: f64,
    pub urgency: f64,
    pub utility: f64,
    pub status: GoalStatus,
    pub preconditions: Vec<Condition>,
    pub effects: Vec<Condition>,
    pub sub_goals: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
}

impl Goal {
    pub fn new(goal_type: GoalType, priority: f64, urgency: f64, utility: f64) -> Self {
        let now = Utc::now();
        Self {
            id: format!("goal-{}", uuid::Uuid::new_v4()),
            goal_type,
            priority: priority.clamp(0.0, 1.0),
            urgency: urgency.clamp(0.0, 1.0),
            utility: utility.clamp(0.0, 1.0),
            status: GoalStatus::Pending,
            preconditions: Vec::new(),
            effects: Vec::new(),
            sub_goals: Vec::new(),
            created_at: now,
            updated_at: now,
            deadline: None,
        }
    }

    /// Apply a status transition, rejecting illegal moves without mutation.
    pub fn transition(&mut self, to: GoalStatus, now: DateTime<Utc>) -> Result<()> {
        if !self.status.can_transition(to) {
            return Err(CoreError::InvalidGoalTransition {
                from: format!("{:?}", self.status).to_lowercase(),
                to: format!("{:?}", to).to_lowercase(),
            });
        }
        self.status = to;
        self.updated_at = now;
        Ok(())
    }

    /// Content-addressed key identifying this goal instance for dedup.
    ///
    /// Derived from the goal type and its effect literals, so two goals that
    /// would do the same thing collide regardless of id.
    pub fn goal_key(&self) -> Result<String> {
        let value = serde_json::json!({
            "goal_type": self.goal_type,
            "effects": self.effects,
        });
        compute_digest(&value)
    }
}
