//! Volition Core Library
//!
//! Re-exports the domain model and planning pipeline for programmatic
//! access to Volition functionality.

pub mod breaker;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod events;
pub mod executor;
pub mod goals;
pub mod htn;
pub mod machine;
pub mod memory;
pub mod obs;
pub mod proposer;
pub mod reactive;
pub mod router;
pub mod signals;
pub mod structured;
pub mod telemetry;
pub mod world;

pub use domain::{
    canonical_json, clamp_round, compute_digest, derive_drives, digest_bytes, Action,
    BlockedReason, BlockedState, BotObservation, Condition, CoreError, DerivedDrives, ExecError,
    ExecErrorCode, ExecMetrics, ExecResult, ExecStatus, Goal, GoalStatus, GoalType,
    HomeostasisState, Need, NeedType, Plan, PlanStep, Result, Signal, SignalType, SignalUrgency,
    StepStatus, Task, TaskMetadata, TaskStatus,
};

pub use breaker::CooldownBreaker;
pub use config::{Config, RuntimeMode};
pub use coordinator::{assess_quality, Coordinator, PipelineInput, PlanQuality, PlanningResult};
pub use events::{
    CognitiveEvent, CollectingObserver, Envelope, ExecutorEvent, Journal, Observer, ObserverSet,
    PlanningEvent,
};
pub use executor::TaskQueue;
pub use goals::{generate_goals, rank_goals, GoalStore, ScoreWeights, ScoredGoal};
pub use htn::{placeholder_plan, HtnDomain, Method, PlanningContext};
pub use machine::{ExecutorMachine, MachineHealth};
pub use memory::{MemoryClient, MemoryStateSummary, RankedMemory, SearchRequest};
pub use proposer::{CapabilityProposer, Proposal, ProposalRequest, StaticProposer, TaskSuggestion};
pub use reactive::{Effect, GoapAction, GoapGoal, GoapState, ReactivePlanner, Requirement};
pub use router::{classify_goal, route, RouterKind, TaskClassification, TaskDecision};
pub use signals::{derive_needs, SignalProcessor};
pub use structured::{merge_plans, StructuredPlanner};
pub use telemetry::init_tracing;
pub use world::{
    CancelToken, Hostile, Inventory, ItemStack, Position, SimWorld, Weather, WorldAdapter,
    WorldSnapshot,
};

/// Volition version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
