//! Shadow-run records, statistics, and promotion verdicts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use volition_core::{ExecMetrics, ExecStatus};

use crate::spec::ShadowConfig;

/// One recorded shadow execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowRun {
    pub id: uuid::Uuid,
    pub timestamp: DateTime<Utc>,
    pub status: ExecStatus,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub metrics: ExecMetrics,
}

/// Aggregated statistics over an option's shadow runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ShadowStats {
    pub total_runs: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub timeout_count: u64,
    /// Defined as 0 when there are no runs.
    pub success_rate: f64,
    pub mean_duration_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<DateTime<Utc>>,
}

impl ShadowStats {
    pub fn from_runs(runs: &[ShadowRun]) -> Self {
        let total_runs = runs.len() as u64;
        let success_count = runs
            .iter()
            .filter(|r| r.status == ExecStatus::Success)
            .count() as u64;
        let timeout_count = runs
            .iter()
            .filter(|r| r.status == ExecStatus::Timeout)
            .count() as u64;
        let failure_count = total_runs - success_count - timeout_count;

        let success_rate = if total_runs == 0 {
            0.0
        } else {
            success_count as f64 / total_runs as f64
        };
        let mean_duration_ms = if total_runs == 0 {
            0.0
        } else {
            runs.iter().map(|r| r.duration_ms as f64).sum::<f64>() / total_runs as f64
        };

        Self {
            total_runs,
            success_count,
            failure_count,
            timeout_count,
            success_rate,
            mean_duration_ms,
            last_run_at: runs.last().map(|r| r.timestamp),
        }
    }
}

/// What the governance probe decided after a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShadowVerdict {
    Keep,
    Promote,
    Retire,
}

/// Decide promotion/retirement from statistics and thresholds.
pub fn probe(stats: &ShadowStats, config: &ShadowConfig) -> ShadowVerdict {
    if stats.total_runs >= config.min_shadow_runs && stats.success_rate >= config.success_threshold
    {
        return ShadowVerdict::Promote;
    }
    if stats.total_runs >= config.max_shadow_runs && stats.success_rate <= config.failure_threshold
    {
        return ShadowVerdict::Retire;
    }
    ShadowVerdict::Keep
}
