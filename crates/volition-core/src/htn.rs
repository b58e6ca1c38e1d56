//! Hierarchical task-network planner.
//!
//! Each goal family has an ordered method table; the first method whose
//! precondition holds is selected (deterministic). A method expands into
//! ordered steps chained by dependencies. When no method applies the
//! decomposition is empty and the coordinator synthesizes a placeholder
//! plan instead.

use std::collections::BTreeMap;

use crate::domain::{Action, Goal, GoalType, HomeostasisState, Plan, PlanStep};
use crate::world::{Inventory, WorldSnapshot};

/// Facts available to method preconditions and step builders.
#[derive(Debug, Clone, Default)]
pub struct PlanningContext {
    pub homeostasis: HomeostasisState,
    pub inventory: Inventory,
    pub snapshot: WorldSnapshot,
}

/// One decomposition method.
pub struct Method {
    pub name: &'static str,
    pub precondition: fn(&PlanningContext) -> bool,
    pub steps: fn(&PlanningContext) -> Vec<&'static str>,
}

/// Method tables per goal family.
pub struct HtnDomain {
    methods: BTreeMap<GoalType, Vec<Method>>,
}

impl HtnDomain {
    pub fn new() -> Self {
        Self {
            methods: BTreeMap::new(),
        }
    }

    pub fn add_method(&mut self, goal_type: GoalType, method: Method) {
        self.methods.entry(goal_type).or_default().push(method);
    }

    /// The built-in survival/exploration domain.
    pub fn standard() -> Self {
        let mut domain = Self::new();

        domain.add_method(
            GoalType::SatisfyHunger,
            Method {
                name: "eat_from_inventory",
                precondition: |ctx| ctx.inventory.count_of("food") > 0,
                steps: |_| vec!["select_food", "eat_food"],
            },
        );
        domain.add_method(
            GoalType::SatisfyHunger,
            Method {
                name: "forage_then_eat",
                precondition: |_| true,
                steps: |_| vec!["locate_food_source", "gather_food", "eat_food"],
            },
        );

        domain.add_method(
            GoalType::RestoreHealth,
            Method {
                name: "retreat_and_recover",
                precondition: |ctx| !ctx.snapshot.nearby_hostiles.is_empty(),
                steps: |_| vec!["disengage", "find_shelter", "rest_until_recovered"],
            },
        );
        domain.add_method(
            GoalType::RestoreHealth,
            Method {
                name: "rest_in_place",
                precondition: |_| true,
                steps: |_| vec!["find_shelter", "rest_until_recovered"],
            },
        );

        domain.add_method(
            GoalType::ReachSafety,
            Method {
                name: "flee_to_light",
                precondition: |ctx| ctx.snapshot.light_level < 8,
                steps: |_| vec!["scan_for_threats", "move_to_lit_area", "secure_perimeter"],
            },
        );
        domain.add_method(
            GoalType::ReachSafety,
            Method {
                name: "fortify_position",
                precondition: |_| true,
                steps: |_| vec!["scan_for_threats", "secure_perimeter"],
            },
        );

        domain.add_method(
            GoalType::Explore,
            Method {
                name: "survey_frontier",
                precondition: |_| true,
                steps: |_| vec!["pick_frontier", "travel_to_frontier", "survey_area"],
            },
        );

        domain.add_method(
            GoalType::Investigate,
            Method {
                name: "probe_unknown",
                precondition: |_| true,
                steps: |_| vec!["select_probe_site", "travel_to_site", "inspect_site"],
            },
        );

        domain.add_method(
            GoalType::Socialize,
            Method {
                name: "seek_contact",
                precondition: |_| true,
                steps: |_| vec!["locate_peers", "approach_peer", "interact"],
            },
        );

        domain.add_method(
            GoalType::Achieve,
            Method {
                name: "advance_project",
                precondition: |_| true,
                steps: |_| vec!["review_progress", "gather_materials", "execute_milestone"],
            },
        );

        domain.add_method(
            GoalType::Create,
            Method {
                name: "build_artifact",
                precondition: |_| true,
                steps: |_| vec!["choose_design", "gather_materials", "construct"],
            },
        );

        domain
    }

    /// Decompose a goal into an ordered plan.
    ///
    /// Returns an empty plan when no method's precondition holds; the
    /// caller decides how to recover.
    pub fn decompose(&self, goal: &Goal, ctx: &PlanningContext) -> Plan {
        let Some(methods) = self.methods.get(&goal.goal_type) else {
            return Plan::new(goal.id.clone(), Vec::new());
        };

        let Some(method) = methods.iter().find(|m| (m.precondition)(ctx)) else {
            return Plan::new(goal.id.clone(), Vec::new());
        };

        let names = (method.steps)(ctx);
        let mut steps: Vec<PlanStep> = Vec::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            let mut step = PlanStep::new(format!("{}-{}", goal.id, i), Action::named(*name));
            if i > 0 {
                step.dependencies.push(format!("{}-{}", goal.id, i - 1));
            }
            steps.push(step);
        }

        let mut plan = Plan::new(goal.id.clone(), steps);
        plan.priority = goal.priority;
        plan.success_probability = 0.7;
        plan
    }
}

impl Default for HtnDomain {
    fn default() -> Self {
        Self::standard()
    }
}

/// The minimal two-step placeholder plan used when decomposition is empty.
pub fn placeholder_plan(goal: &Goal) -> Plan {
    let analyze = PlanStep::new(
        format!("{}-analyze", goal.id),
        Action::named("analyze_situation"),
    );
    let act = PlanStep::new(format!("{}-act", goal.id), Action::named("take_best_action"))
        .after(format!("{}-analyze", goal.id));
    let mut plan = Plan::new(goal.id.clone(), vec![analyze, act]);
    plan.priority = goal.priority;
    plan.success_probability = 0.3;
    plan
}
