//! Reactive planner: GOAP-style A* over action preconditions and effects.
//!
//! Built for emergencies: short plans (cap 10), a hard compute budget
//! (default 20 ms), and deterministic expansion order (cost ascending,
//! then action name).

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, HashSet};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Maximum number of actions in a reactive plan.
pub const MAX_PLAN_LEN: usize = 10;

/// Default compute budget per planning call.
pub const DEFAULT_BUDGET: Duration = Duration::from_millis(20);

/// World-state literals: `key -> value`. Booleans are 0/1.
pub type GoapState = BTreeMap<String, i64>;

/// A precondition literal: `state[key] >= min`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub key: String,
    pub min: i64,
}

/// An effect applied to the state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Effect {
    Set { key: String, value: i64 },
    Add { key: String, delta: i64 },
}

impl Effect {
    fn apply(&self, state: &mut GoapState) {
        match self {
            Effect::Set { key, value } => {
                state.insert(key.clone(), *value);
            }
            Effect::Add { key, delta } => {
                *state.entry(key.clone()).or_insert(0) += delta;
            }
        }
    }
}

/// A reactive action with preconditions and effects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoapAction {
    pub name: String,
    pub cost: u32,
    pub preconditions: Vec<Requirement>,
    pub effects: Vec<Effect>,
}

impl GoapAction {
    fn applicable(&self, state: &GoapState) -> bool {
        self.preconditions
            .iter()
            .all(|p| state.get(&p.key).copied().unwrap_or(0) >= p.min)
    }

    fn apply(&self, state: &GoapState) -> GoapState {
        let mut next = state.clone();
        for effect in &self.effects {
            effect.apply(&mut next);
        }
        next
    }
}

/// Goal literals that must all hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoapGoal {
    pub literals: Vec<Requirement>,
}

impl GoapGoal {
    pub fn satisfied_by(&self, state: &GoapState) -> bool {
        self.literals
            .iter()
            .all(|l| state.get(&l.key).copied().unwrap_or(0) >= l.min)
    }

    fn unsatisfied_count(&self, state: &GoapState) -> u32 {
        self.literals
            .iter()
            .filter(|l| state.get(&l.key).copied().unwrap_or(0) < l.min)
            .count() as u32
    }
}

/// A* search node.
#[derive(Clone)]
struct SearchNode {
    state: GoapState,
    path: Vec<String>,
    g_cost: u32,
    h_cost: u32,
}

impl SearchNode {
    fn f_cost(&self) -> u32 {
        self.g_cost + self.h_cost
    }
}

impl PartialEq for SearchNode {
    fn eq(&self, other: &Self) -> bool {
        self.f_cost() == other.f_cost() && self.path == other.path
    }
}

impl Eq for SearchNode {}

impl PartialOrd for SearchNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SearchNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap; ties resolve lexicographically on the
        // path so expansion order is reproducible.
        other
            .f_cost()
            .cmp(&self.f_cost())
            .then_with(|| other.path.cmp(&self.path))
    }
}

/// The reactive planner over a fixed action set.
pub struct ReactivePlanner {
    actions: Vec<GoapAction>,
    budget: Duration,
}

impl ReactivePlanner {
    pub fn new(mut actions: Vec<GoapAction>) -> Self {
        actions.sort_by(|a, b| a.cost.cmp(&b.cost).then_with(|| a.name.cmp(&b.name)));
        Self {
            actions,
            budget: DEFAULT_BUDGET,
        }
    }

    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    /// The built-in emergency action set.
    pub fn standard() -> Self {
        let req = |key: &str, min: i64| Requirement {
            key: key.to_string(),
            min,
        };
        let set = |key: &str, value: i64| Effect::Set {
            key: key.to_string(),
            value,
        };
        Self::new(vec![
            GoapAction {
                name: "flee_danger".to_string(),
                cost: 1,
                preconditions: vec![],
                effects: vec![set("distance_from_threat", 1)],
            },
            GoapAction {
                name: "reach_light".to_string(),
                cost: 2,
                preconditions: vec![req("distance_from_threat", 1)],
                effects: vec![set("in_lit_area", 1)],
            },
            GoapAction {
                name: "barricade".to_string(),
                cost: 2,
                preconditions: vec![req("in_lit_area", 1)],
                effects: vec![set("in_safe_area", 1)],
            },
            GoapAction {
                name: "eat_emergency_ration".to_string(),
                cost: 1,
                preconditions: vec![req("has_ration", 1)],
                effects: vec![set("hunger_satisfied", 1)],
            },
            GoapAction {
                name: "drink_potion".to_string(),
                cost: 1,
                preconditions: vec![req("has_potion", 1)],
                effects: vec![set("health_restored", 1)],
            },
        ])
    }

    /// Find the shortest plan satisfying `goal`, or `None` when the search
    /// exhausts its caps without reaching it.
    pub fn plan(&self, start: &GoapState, goal: &GoapGoal) -> Option<Vec<String>> {
        if goal.satisfied_by(start) {
            return Some(Vec::new());
        }

        let deadline = Instant::now() + self.budget;
        let mut open = BinaryHeap::new();
        let mut visited: HashSet<String> = HashSet::new();

        open.push(SearchNode {
            state: start.clone(),
            path: Vec::new(),
            g_cost: 0,
            h_cost: goal.unsatisfied_count(start),
        });

        while let Some(node) = open.pop() {
            if Instant::now() >= deadline {
                tracing::debug!(event = "reactive.budget_exhausted", expanded = visited.len());
                return None;
            }

            let state_key = state_fingerprint(&node.state);
            if !visited.insert(state_key) {
                continue;
            }

            if node.path.len() >= MAX_PLAN_LEN {
                continue;
            }

            for action in &self.actions {
                if !action.applicable(&node.state) {
                    continue;
                }
                let next_state = action.apply(&node.state);
                let mut next_path = node.path.clone();
                next_path.push(action.name.clone());

                if goal.satisfied_by(&next_state) {
                    return Some(next_path);
                }

                open.push(SearchNode {
                    h_cost: goal.unsatisfied_count(&next_state),
                    state: next_state,
                    path: next_path,
                    g_cost: node.g_cost + action.cost,
                });
            }
        }

        None
    }
}

fn state_fingerprint(state: &GoapState) -> String {
    let mut out = String::new();
    for (k, v) in state {
        out.push_str(k);
        out.push('=');
        out.push_str(&v.to_string());
        out.push(';');
    }
    out
}
