//! Domain model: signals, drives, needs, goals, plans, tasks, and the
//! structured execution-result types shared across component boundaries.

pub mod digest;
pub mod error;
pub mod exec;
pub mod goal;
pub mod homeostasis;
pub mod need;
pub mod plan;
pub mod signal;
pub mod task;

pub use digest::{canonical_json, compute_digest, digest_bytes};
pub use error::{CoreError, Result};
pub use exec::{ExecError, ExecErrorCode, ExecMetrics, ExecResult, ExecStatus};
pub use goal::{Condition, Goal, GoalStatus, GoalType};
pub use homeostasis::{
    clamp_round, derive_drives, BotObservation, DerivedDrives, HomeostasisState,
};
pub use need::{Need, NeedType};
pub use plan::{Action, Plan, PlanStep, StepStatus};
pub use signal::{Signal, SignalType, SignalUrgency};
pub use task::{BlockedReason, BlockedState, Task, TaskMetadata, TaskStatus};
