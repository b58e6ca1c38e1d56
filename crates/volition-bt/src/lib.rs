//! Volition behavior-tree layer.
//!
//! - [`leaf`]       — primitive leaf registry with typed I/O and execution controls
//! - [`schema`]     — closed structural schema subset for leaf arguments
//! - [`dsl`]        — the six-variant JSON behavior-tree description
//! - [`compile`]    — validation, leaf resolution, canonical tree hashing
//! - [`exec`]       — compiled-tree evaluation with timeouts and cancellation
//! - [`predicates`] — the closed named-sensor-predicate set
//! - [`error`]      — `BtError` / `BtResult`

pub mod compile;
pub mod dsl;
pub mod error;
pub mod exec;
pub mod fakes;
pub mod leaf;
pub mod predicates;
pub mod schema;

pub use compile::{compile, CompiledBt};
pub use dsl::{parse, BtNode, PredicateCall, DEFAULT_MAX_ITERATIONS};
pub use error::{BtError, BtResult};
pub use exec::BtExecutor;
pub use leaf::{Leaf, LeafCtx, LeafRegistry, LeafSpec, Permission};
pub use predicates::evaluate as evaluate_predicate;
pub use schema::Schema;
