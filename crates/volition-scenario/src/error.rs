//! Error taxonomy for the scenario planner.

/// Scenario-planner errors.
///
/// Most rejection conditions (non-conserved masses, exhausted budgets) are
/// not errors: they are recorded in the result's explanation bundle and
/// the search continues. Errors here abort a planning call entirely.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ScenarioError {
    #[error("empty action set")]
    EmptyActionSet,

    #[error("duplicate action id: {0}")]
    DuplicateActionId(String),

    #[error("action '{action_id}' references unknown outcome '{outcome_id}'")]
    UnknownOutcome {
        action_id: String,
        outcome_id: String,
    },

    #[error("horizon depth must be positive")]
    ZeroHorizon,
}

/// Result type for scenario-planner operations.
pub type ScenarioResult<T> = std::result::Result<T, ScenarioError>;
