//! Plans: ordered steps with dependency DAGs.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::{CoreError, Result};
use crate::domain::goal::Condition;

/// Step lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

/// The action a step performs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub action_type: String,
    pub parameters: serde_json::Value,
    pub preconditions: Vec<Condition>,
    pub effects: Vec<Condition>,
    pub cost: f64,
    pub estimated_duration_ms: u64,
}

impl Action {
    pub fn named(action_type: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            parameters: serde_json::Value::Null,
            preconditions: Vec::new(),
            effects: Vec::new(),
            cost: 1.0,
            estimated_duration_ms: 1_000,
        }
    }
}

/// One step of a plan. May start only when all dependencies are Completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: String,
    pub action: Action,
    pub status: StepStatus,
    pub dependencies: Vec<String>,
    pub resources: Vec<String>,
}

impl PlanStep {
    pub fn new(id: impl Into<String>, action: Action) -> Self {
        Self {
            id: id.into(),
            action,
            status: StepStatus::Pending,
            dependencies: Vec::new(),
            resources: Vec::new(),
        }
    }

    pub fn after(mut self, dep: impl Into<String>) -> Self {
        self.dependencies.push(dep.into());
        self
    }
}

/// An ordered sequence of steps produced by a planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: uuid::Uuid,
    pub goal_id: String,
    pub steps: Vec<PlanStep>,
    /// Mean success probability estimated by the producing planner.
    pub success_probability: f64,
    pub priority: f64,
    pub estimated_duration_ms: u64,
    pub created_at: DateTime<Utc>,
}

impl Plan {
    pub fn new(goal_id: impl Into<String>, steps: Vec<PlanStep>) -> Self {
        let estimated_duration_ms = steps
            .iter()
            .map(|s| s.action.estimated_duration_ms)
            .sum::<u64>();
        Self {
            id: uuid::Uuid::new_v4(),
            goal_id: goal_id.into(),
            steps,
            success_probability: 0.5,
            priority: 0.5,
            estimated_duration_ms,
            created_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn total_cost(&self) -> f64 {
        self.steps.iter().map(|s| s.action.cost).sum()
    }

    /// Validate that all dependencies exist and that the dependency graph is
    /// acyclic (Kahn's algorithm).
    pub fn validate(&self) -> Result<()> {
        let ids: BTreeMap<&str, &PlanStep> =
            self.steps.iter().map(|s| (s.id.as_str(), s)).collect();

        for step in &self.steps {
            for dep in &step.dependencies {
                if !ids.contains_key(dep.as_str()) {
                    return Err(CoreError::MissingDependency {
                        step_id: step.id.clone(),
                        missing_dependency: dep.clone(),
                    });
                }
            }
        }

        let mut indegree: BTreeMap<&str, usize> =
            self.steps.iter().map(|s| (s.id.as_str(), 0usize)).collect();
        let mut edges: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for step in &self.steps {
            for dep in &step.dependencies {
                edges
                    .entry(dep.as_str())
                    .or_default()
                    .push(step.id.as_str());
                *indegree.get_mut(step.id.as_str()).expect("step in indegree") += 1;
            }
        }

        let mut queue: VecDeque<&str> = indegree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(k, _)| *k)
            .collect();

        let mut visited = 0usize;
        while let Some(node) = queue.pop_front() {
            visited += 1;
            if let Some(neighbors) = edges.get(node) {
                for n in neighbors {
                    let entry = indegree.get_mut(n).expect("neighbor in indegree");
                    *entry -= 1;
                    if *entry == 0 {
                        queue.push_back(n);
                    }
                }
            }
        }

        if visited != self.steps.len() {
            return Err(CoreError::CycleDetected);
        }
        Ok(())
    }

    /// Steps whose dependencies are all Completed and which are still Pending.
    pub fn ready_steps(&self) -> Vec<&PlanStep> {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Pending)
            .filter(|s| {
                s.dependencies.iter().all(|dep| {
                    self.steps
                        .iter()
                        .any(|t| t.id == *dep && t.status == StepStatus::Completed)
                })
            })
            .collect()
    }
}
