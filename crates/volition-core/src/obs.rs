//! Structured observability hooks for planning lifecycle events.
//!
//! Events are emitted at `info!` level; set `RUST_LOG` to filter.
//! For JSON output, initialise tracing with `json = true`.

use tracing::info;

/// RAII guard that enters a pipeline-scoped tracing span.
pub struct PipelineSpan {
    _span: tracing::span::EnteredSpan,
}

impl PipelineSpan {
    /// Create and enter a span tagged with the pipeline invocation id.
    pub fn enter(pipeline_id: &str) -> Self {
        let span = tracing::info_span!("volition.pipeline", pipeline_id = %pipeline_id);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: planning pipeline started with the signal count.
pub fn emit_pipeline_started(pipeline_id: &str, signal_count: usize) {
    info!(event = "pipeline.started", pipeline_id = %pipeline_id, signal_count = signal_count);
}

/// Emit event: pipeline finished with the chosen router and plan size.
pub fn emit_pipeline_finished(pipeline_id: &str, router: &str, steps: usize, duration_ms: u64) {
    info!(
        event = "pipeline.finished",
        pipeline_id = %pipeline_id,
        router = %router,
        steps = steps,
        duration_ms = duration_ms,
    );
}

/// Emit event: pipeline stage failed (warning level).
pub fn emit_pipeline_error(pipeline_id: &str, stage: &str, error: &dyn std::fmt::Display) {
    tracing::warn!(event = "pipeline.error", pipeline_id = %pipeline_id, stage = %stage, error = %error);
}

/// Emit event: a task was blocked.
pub fn emit_task_blocked(task_id: &str, reason: &str) {
    info!(event = "task.blocked", task_id = %task_id, reason = %reason);
}

/// Emit event: a blocked task exceeded its TTL and was failed.
pub fn emit_task_ttl_expired(task_id: &str, reason: &str) {
    tracing::warn!(event = "task.ttl_expired", task_id = %task_id, reason = %reason);
}

/// Emit event: a goal-key collision was allowed through the stale escape.
pub fn emit_goal_key_stale_escape(goal_key: &str, age_ms: i64) {
    tracing::warn!(event = "task.goal_key_stale_escape", goal_key = %goal_key, age_ms = age_ms);
}
