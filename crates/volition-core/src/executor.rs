//! Autonomous task queue and block policy.
//!
//! Eligibility, auto-unblocking, blocked TTLs, and the goal-key dedup
//! guard are pure functions of the supplied clock plus queue state; no
//! timers fire behind the caller's back.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::config::RuntimeMode;
use crate::domain::{BlockedReason, CoreError, Result, Task, TaskStatus};
use crate::events::{ExecutorEvent, Observer, ObserverSet};
use crate::obs;

/// Goal-key dedup window: younger collisions block, older ones escape.
pub const GOAL_KEY_WINDOW_MS: i64 = 5 * 60 * 1000;

/// The autonomous task queue.
#[derive(Default)]
pub struct TaskQueue {
    tasks: BTreeMap<String, Task>,
    observers: ObserverSet<ExecutorEvent>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, observer: Arc<dyn Observer<ExecutorEvent>>) {
        self.observers.subscribe(observer);
    }

    pub fn get(&self, task_id: &str) -> Option<&Task> {
        self.tasks.get(task_id)
    }

    pub fn get_mut(&mut self, task_id: &str) -> Option<&mut Task> {
        self.tasks.get_mut(task_id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Enqueue a task, enforcing the goal-key guard.
    ///
    /// An outstanding (pending or active) task with the same goal key
    /// blocks the enqueue unless it is older than the dedup window; the
    /// stale escape is logged and allowed through.
    pub fn enqueue(&mut self, task: Task, now: DateTime<Utc>) -> Result<String> {
        let window = Duration::milliseconds(GOAL_KEY_WINDOW_MS);
        for existing in self.tasks.values() {
            if !existing.status.is_outstanding() {
                continue;
            }
            if existing.metadata.goal_key != task.metadata.goal_key {
                continue;
            }
            let age = now - existing.created_at;
            if age < window {
                return Err(CoreError::DuplicateGoalKey(task.metadata.goal_key.clone()));
            }
            obs::emit_goal_key_stale_escape(&task.metadata.goal_key, age.num_milliseconds());
        }

        let id = task.id.clone();
        self.tasks.insert(id.clone(), task);
        Ok(id)
    }

    /// Ids of tasks eligible to run right now.
    ///
    /// Eligible iff status is pending (with at least one step), active, or
    /// in-progress; not blocked; and not in backoff.
    pub fn eligible(&self, now: DateTime<Utc>) -> Vec<&Task> {
        self.tasks
            .values()
            .filter(|t| match t.status {
                TaskStatus::Pending => !t.steps.is_empty(),
                TaskStatus::Active | TaskStatus::InProgress => true,
                _ => false,
            })
            .filter(|t| !t.is_blocked())
            .filter(|t| match t.metadata.next_eligible_at {
                Some(at) => at <= now,
                None => true,
            })
            .collect()
    }

    /// Advance queue housekeeping for one tick.
    ///
    /// - Auto-unblocks `shadow_mode` tasks when the runtime mode is live.
    /// - Fails blocked tasks whose TTL elapsed, with reason
    ///   `blocked-ttl-exceeded:<blocked_reason>`.
    ///
    /// Returns the ids of tasks failed by TTL expiry.
    pub fn tick(&mut self, now: DateTime<Utc>, mode: RuntimeMode) -> Vec<String> {
        let mut expired = Vec::new();

        for task in self.tasks.values_mut() {
            let Some(blocked) = task.metadata.blocked.clone() else {
                continue;
            };

            if mode == RuntimeMode::Live && blocked.reason == BlockedReason::ShadowMode {
                task.unblock(now);
                continue;
            }

            if let Some(ttl) = blocked.reason.ttl() {
                if now - blocked.blocked_at >= ttl {
                    let reason = format!("blocked-ttl-exceeded:{}", blocked.reason.label());
                    obs::emit_task_ttl_expired(&task.id, blocked.reason.label());
                    task.status = TaskStatus::Failed;
                    task.failure_reason = Some(reason);
                    task.metadata.blocked = None;
                    task.updated_at = now;
                    expired.push(task.id.clone());
                }
            }
        }

        for (task_id, cause) in expired
            .iter()
            .filter_map(|id| {
                self.tasks
                    .get(id)
                    .and_then(|t| t.failure_reason.clone())
                    .map(|cause| (id.clone(), cause))
            })
            .collect::<Vec<_>>()
        {
            self.observers.publish(ExecutorEvent::ExecutionFailed {
                task_id,
                cause,
            });
        }

        expired
    }

    /// Mark a task completed and publish the completion event.
    pub fn complete_task(&mut self, task_id: &str, now: DateTime<Utc>) -> Result<()> {
        let task = self
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| CoreError::TaskNotFound(task_id.to_string()))?;
        task.status = TaskStatus::Completed;
        task.updated_at = now;
        self.observers.publish(ExecutorEvent::ExecutionComplete {
            task_id: task_id.to_string(),
        });
        Ok(())
    }

    /// Mark a task failed and publish the failure event.
    pub fn fail_task(
        &mut self,
        task_id: &str,
        cause: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let cause = cause.into();
        let task = self
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| CoreError::TaskNotFound(task_id.to_string()))?;
        task.status = TaskStatus::Failed;
        task.failure_reason = Some(cause.clone());
        task.updated_at = now;
        self.observers.publish(ExecutorEvent::ExecutionFailed {
            task_id: task_id.to_string(),
            cause,
        });
        Ok(())
    }

    /// Block a task with a reason.
    pub fn block(&mut self, task_id: &str, reason: BlockedReason, now: DateTime<Utc>) -> Result<()> {
        let task = self
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| CoreError::TaskNotFound(task_id.to_string()))?;
        obs::emit_task_blocked(task_id, reason.label());
        task.block(reason, now);
        Ok(())
    }

    /// Apply a backoff so the task is skipped until `next_eligible_at`.
    pub fn defer(&mut self, task_id: &str, until: DateTime<Utc>) -> Result<()> {
        let task = self
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| CoreError::TaskNotFound(task_id.to_string()))?;
        task.metadata.next_eligible_at = Some(until);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Action, PlanStep};

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn task_with_step(title: &str, goal_key: &str) -> Task {
        Task::new(
            title,
            goal_key,
            vec![PlanStep::new("s0", Action::named("act"))],
        )
    }

    #[test]
    fn test_goal_key_guard_blocks_young_duplicate() {
        let mut queue = TaskQueue::new();
        let now = t0();
        let mut first = task_with_step("first", "key-a");
        first.created_at = now;
        queue.enqueue(first, now).unwrap();

        let second = task_with_step("second", "key-a");
        let err = queue.enqueue(second, now + Duration::minutes(4)).unwrap_err();
        assert!(matches!(err, CoreError::DuplicateGoalKey(_)));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_goal_key_stale_escape_allows_old_duplicate() {
        let mut queue = TaskQueue::new();
        let now = t0();
        let mut first = task_with_step("first", "key-a");
        first.created_at = now;
        queue.enqueue(first, now).unwrap();

        let second = task_with_step("second", "key-a");
        queue
            .enqueue(second, now + Duration::minutes(6))
            .expect("stale escape must allow");
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_goal_key_guard_ignores_terminal_tasks() {
        let mut queue = TaskQueue::new();
        let now = t0();
        let mut done = task_with_step("done", "key-a");
        done.status = TaskStatus::Completed;
        let id = queue.enqueue(done, now).unwrap();
        queue.get_mut(&id).unwrap().status = TaskStatus::Completed;

        queue
            .enqueue(task_with_step("fresh", "key-a"), now)
            .expect("terminal tasks do not hold the key");
    }

    #[test]
    fn test_eligibility_rules() {
        let mut queue = TaskQueue::new();
        let now = t0();

        // Pending without steps: not eligible.
        let empty = Task::new("empty", "k1", Vec::new());
        let empty_id = queue.enqueue(empty, now).unwrap();

        // Pending with steps: eligible.
        let ready_id = queue.enqueue(task_with_step("ready", "k2"), now).unwrap();

        // Deferred into the future: not eligible.
        let deferred_id = queue.enqueue(task_with_step("deferred", "k3"), now).unwrap();
        queue.defer(&deferred_id, now + Duration::minutes(1)).unwrap();

        // Blocked: not eligible.
        let blocked_id = queue.enqueue(task_with_step("blocked", "k4"), now).unwrap();
        queue
            .block(&blocked_id, BlockedReason::NoExecutablePlan, now)
            .unwrap();

        let eligible: Vec<&str> = queue.eligible(now).iter().map(|t| t.id.as_str()).collect();
        assert!(eligible.contains(&ready_id.as_str()));
        assert!(!eligible.contains(&empty_id.as_str()));
        assert!(!eligible.contains(&deferred_id.as_str()));
        assert!(!eligible.contains(&blocked_id.as_str()));

        // Backoff elapses.
        let eligible: Vec<&str> = queue
            .eligible(now + Duration::minutes(2))
            .iter()
            .map(|t| t.id.as_str())
            .collect();
        assert!(eligible.contains(&deferred_id.as_str()));
    }

    #[test]
    fn test_shadow_mode_auto_unblocks_when_live() {
        let mut queue = TaskQueue::new();
        let now = t0();
        let id = queue.enqueue(task_with_step("shadowed", "k1"), now).unwrap();
        queue.block(&id, BlockedReason::ShadowMode, now).unwrap();

        // Still blocked in shadow mode.
        queue.tick(now, RuntimeMode::Shadow);
        assert!(queue.get(&id).unwrap().is_blocked());

        // Unblocked once live.
        queue.tick(now, RuntimeMode::Live);
        assert!(!queue.get(&id).unwrap().is_blocked());
    }

    #[test]
    fn test_blocked_ttl_fails_task_with_reason() {
        let mut queue = TaskQueue::new();
        let now = t0();
        let id = queue.enqueue(task_with_step("stuck", "k1"), now).unwrap();
        queue
            .block(&id, BlockedReason::NoExecutablePlan, now)
            .unwrap();

        // Inside TTL: untouched.
        let expired = queue.tick(now + Duration::seconds(119), RuntimeMode::Shadow);
        assert!(expired.is_empty());

        // TTL fires at two minutes.
        let expired = queue.tick(now + Duration::minutes(2), RuntimeMode::Shadow);
        assert_eq!(expired, vec![id.clone()]);
        let task = queue.get(&id).unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(
            task.failure_reason.as_deref(),
            Some("blocked-ttl-exceeded:no_executable_plan")
        );
    }

    #[test]
    fn test_completion_and_failure_events() {
        use crate::events::CollectingObserver;

        let mut queue = TaskQueue::new();
        let collector = Arc::new(CollectingObserver::new());
        queue.subscribe(collector.clone());

        let now = t0();
        let done_id = queue.enqueue(task_with_step("done", "k1"), now).unwrap();
        let failed_id = queue.enqueue(task_with_step("failed", "k2"), now).unwrap();

        queue.complete_task(&done_id, now).unwrap();
        queue.fail_task(&failed_id, "world offline", now).unwrap();

        assert_eq!(queue.get(&done_id).unwrap().status, TaskStatus::Completed);
        assert_eq!(queue.get(&failed_id).unwrap().status, TaskStatus::Failed);

        let events: Vec<_> = collector.collected().into_iter().map(|e| e.event).collect();
        assert!(events.iter().any(|e| matches!(
            e,
            crate::events::ExecutorEvent::ExecutionComplete { task_id } if *task_id == done_id
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            crate::events::ExecutorEvent::ExecutionFailed { task_id, .. } if *task_id == failed_id
        )));
    }

    #[test]
    fn test_exempt_reasons_never_expire() {
        let mut queue = TaskQueue::new();
        let now = t0();
        for (key, reason) in [
            ("k1", BlockedReason::WaitingOnPrereq),
            ("k2", BlockedReason::InfraErrorTripped),
            ("k3", BlockedReason::MaxRetriesExceeded),
        ] {
            let id = queue.enqueue(task_with_step("exempt", key), now).unwrap();
            queue.block(&id, reason, now).unwrap();
        }

        let expired = queue.tick(now + Duration::hours(24), RuntimeMode::Shadow);
        assert!(expired.is_empty());
    }
}
