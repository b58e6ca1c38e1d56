//! Domain-level error taxonomy for Volition.

/// Volition domain errors.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid signal: {0}")]
    InvalidSignal(String),

    #[error("invalid goal transition: {from} -> {to}")]
    InvalidGoalTransition { from: String, to: String },

    #[error("goal not found: {0}")]
    GoalNotFound(String),

    #[error("plan not found: {0}")]
    PlanNotFound(uuid::Uuid),

    #[error("step '{step_id}' has missing dependency '{missing_dependency}'")]
    MissingDependency {
        step_id: String,
        missing_dependency: String,
    },

    #[error("dependency cycle detected in plan")]
    CycleDetected,

    #[error("duplicate goal key: {0}")]
    DuplicateGoalKey(String),

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("planning failed in stage '{stage}': {cause}")]
    PlanningFailed { stage: String, cause: String },

    #[error("planner budget exhausted after {elapsed_ms}ms (limit {limit_ms}ms)")]
    BudgetExhausted { elapsed_ms: u64, limit_ms: u64 },

    #[error("digest error: {0}")]
    Digest(String),

    #[error("memory service unavailable: {0}")]
    MemoryUnavailable(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for Volition domain operations.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_display() {
        let err = CoreError::InvalidGoalTransition {
            from: "completed".to_string(),
            to: "active".to_string(),
        };
        assert!(err.to_string().contains("completed"));
        assert!(err.to_string().contains("active"));

        let err = CoreError::CycleDetected;
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_planning_failed_carries_stage() {
        let err = CoreError::PlanningFailed {
            stage: "goal_formulation".to_string(),
            cause: "no signals".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("goal_formulation"));
        assert!(msg.contains("no signals"));
    }
}
