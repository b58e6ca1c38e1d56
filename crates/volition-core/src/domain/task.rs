//! Autonomous task-queue items and their block policy metadata.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::plan::PlanStep;

/// Task lifecycle status in the autonomous queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Active,
    InProgress,
    PendingPlanning,
    Unplannable,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Statuses that count as outstanding for goal-key dedup.
    pub fn is_outstanding(self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::Active)
    }
}

/// Why a task is blocked. Closed taxonomy; free-form causes use `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum BlockedReason {
    WaitingOnPrereq,
    InfraErrorTripped,
    MaxRetriesExceeded,
    ShadowMode,
    NoExecutablePlan,
    Other { detail: String },
}

/// Default TTL for blocked tasks that are not exempt.
pub const DEFAULT_BLOCKED_TTL_MS: i64 = 2 * 60 * 1000;

impl BlockedReason {
    /// TTL after which a blocked task is auto-failed. `None` means exempt.
    pub fn ttl(&self) -> Option<Duration> {
        match self {
            BlockedReason::WaitingOnPrereq
            | BlockedReason::InfraErrorTripped
            | BlockedReason::MaxRetriesExceeded => None,
            BlockedReason::ShadowMode
            | BlockedReason::NoExecutablePlan
            | BlockedReason::Other { .. } => {
                Some(Duration::milliseconds(DEFAULT_BLOCKED_TTL_MS))
            }
        }
    }

    /// Snake-case label used in failure reasons and logs.
    pub fn label(&self) -> &str {
        match self {
            BlockedReason::WaitingOnPrereq => "waiting_on_prereq",
            BlockedReason::InfraErrorTripped => "infra_error_tripped",
            BlockedReason::MaxRetriesExceeded => "max_retries_exceeded",
            BlockedReason::ShadowMode => "shadow_mode",
            BlockedReason::NoExecutablePlan => "no_executable_plan",
            BlockedReason::Other { .. } => "other",
        }
    }
}

/// Block record attached to a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedState {
    pub reason: BlockedReason,
    pub blocked_at: DateTime<Utc>,
}

/// Structured task metadata. Free-form extensions live in `extensions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TaskMetadata {
    pub goal_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked: Option<BlockedState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_eligible_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: BTreeMap<String, String>,
}

/// An autonomous queue item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    pub steps: Vec<PlanStep>,
    pub metadata: TaskMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl Task {
    pub fn new(title: impl Into<String>, goal_key: impl Into<String>, steps: Vec<PlanStep>) -> Self {
        let now = Utc::now();
        Self {
            id: format!("task-{}", uuid::Uuid::new_v4()),
            title: title.into(),
            status: TaskStatus::Pending,
            steps,
            metadata: TaskMetadata {
                goal_key: goal_key.into(),
                ..Default::default()
            },
            created_at: now,
            updated_at: now,
            failure_reason: None,
        }
    }

    pub fn block(&mut self, reason: BlockedReason, now: DateTime<Utc>) {
        self.metadata.blocked = Some(BlockedState {
            reason,
            blocked_at: now,
        });
        self.updated_at = now;
    }

    pub fn unblock(&mut self, now: DateTime<Utc>) {
        self.metadata.blocked = None;
        self.updated_at = now;
    }

    pub fn is_blocked(&self) -> bool {
        self.metadata.blocked.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exempt_reasons_have_no_ttl() {
        assert!(BlockedReason::WaitingOnPrereq.ttl().is_none());
        assert!(BlockedReason::InfraErrorTripped.ttl().is_none());
        assert!(BlockedReason::MaxRetriesExceeded.ttl().is_none());
    }

    #[test]
    fn test_default_ttl_is_two_minutes() {
        let ttl = BlockedReason::ShadowMode.ttl().unwrap();
        assert_eq!(ttl.num_milliseconds(), 120_000);
        let ttl = BlockedReason::Other {
            detail: "novel".to_string(),
        }
        .ttl()
        .unwrap();
        assert_eq!(ttl.num_milliseconds(), 120_000);
    }

    #[test]
    fn test_outstanding_statuses() {
        assert!(TaskStatus::Pending.is_outstanding());
        assert!(TaskStatus::Active.is_outstanding());
        assert!(!TaskStatus::InProgress.is_outstanding());
        assert!(!TaskStatus::Completed.is_outstanding());
    }

    #[test]
    fn test_block_unblock() {
        let mut task = Task::new("gather wood", "key-1", Vec::new());
        let now = Utc::now();
        task.block(BlockedReason::NoExecutablePlan, now);
        assert!(task.is_blocked());
        task.unblock(now);
        assert!(!task.is_blocked());
    }

    #[test]
    fn test_blocked_reason_serde_tagged() {
        let reason = BlockedReason::Other {
            detail: "world offline".to_string(),
        };
        let json = serde_json::to_value(&reason).unwrap();
        assert_eq!(json["reason"], "other");
        assert_eq!(json["detail"], "world offline");
    }
}
