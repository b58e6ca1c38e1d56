//! Structured execution errors shared across component boundaries.
//!
//! Leaves and nodes never throw across boundaries; they return results
//! carrying an [`ExecError`] with a closed wire-level code set.

use serde::{Deserialize, Serialize};

/// Wire-level error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecErrorCode {
    #[serde(rename = "permission.denied")]
    PermissionDenied,
    Aborted,
    Timeout,
    Unknown,
    PreconditionFailed,
    MassNotConserved,
    RiskBudgetExceeded,
    InvalidArgs,
    UnknownPredicate,
    QuotaExceeded,
    CircuitOpen,
    MaxIterations,
    RateLimited,
}

/// A structured execution error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecError {
    pub code: ExecErrorCode,
    pub detail: String,
    pub retryable: bool,
}

impl ExecError {
    pub fn new(code: ExecErrorCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: detail.into(),
            retryable: false,
        }
    }

    pub fn retryable(code: ExecErrorCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: detail.into(),
            retryable: true,
        }
    }

    pub fn aborted(detail: impl Into<String>) -> Self {
        Self::new(ExecErrorCode::Aborted, detail)
    }

    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::new(ExecErrorCode::Timeout, detail)
    }
}

impl std::fmt::Display for ExecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.detail)
    }
}

/// Outcome status of a leaf or tree execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecStatus {
    Success,
    Failure,
    Timeout,
}

/// Counters aggregated while evaluating a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ExecMetrics {
    pub node_executions: u64,
    pub leaf_executions: u64,
}

impl ExecMetrics {
    pub fn absorb(&mut self, other: ExecMetrics) {
        self.node_executions += other.node_executions;
        self.leaf_executions += other.leaf_executions;
    }
}

/// Result of running a leaf or a compiled tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecResult {
    pub status: ExecStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecError>,
    pub duration_ms: u64,
    pub metrics: ExecMetrics,
}

impl ExecResult {
    pub fn success(result: Option<serde_json::Value>, duration_ms: u64) -> Self {
        Self {
            status: ExecStatus::Success,
            result,
            error: None,
            duration_ms,
            metrics: ExecMetrics::default(),
        }
    }

    pub fn failure(error: ExecError, duration_ms: u64) -> Self {
        let status = if error.code == ExecErrorCode::Timeout {
            ExecStatus::Timeout
        } else {
            ExecStatus::Failure
        };
        Self {
            status,
            result: None,
            error: Some(error),
            duration_ms,
            metrics: ExecMetrics::default(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecStatus::Success
    }
}
