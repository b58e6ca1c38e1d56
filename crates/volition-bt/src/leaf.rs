//! Primitive leaf registry: trusted atomic actions with typed I/O.
//!
//! `run` validates arguments against the leaf's input schema, enforces the
//! leaf timeout, retries only errors flagged retryable, and applies the
//! per-leaf rate limit and concurrency cap. Leaves never panic across the
//! boundary; failures surface as structured [`ExecError`]s.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use volition_core::world::{CancelToken, WorldAdapter};
use volition_core::{ExecError, ExecErrorCode, ExecResult};

use crate::error::{BtError, BtResult};
use crate::schema::Schema;

/// Capability surface a leaf may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Movement,
    Dig,
    Place,
    Sense,
    Container,
    Chat,
}

/// Declared contract of a primitive leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafSpec {
    pub name: String,
    pub version: String,
    pub input_schema: Schema,
    pub output_schema: Schema,
    pub timeout_ms: u64,
    pub retries: u32,
    pub permissions: Vec<Permission>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit_per_min: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrent: Option<u32>,
}

impl LeafSpec {
    pub fn id(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }
}

/// Execution context handed to leaves: the world adapter and the
/// cancellation token for this invocation.
#[derive(Clone)]
pub struct LeafCtx {
    pub world: Arc<dyn WorldAdapter>,
    pub cancel: CancelToken,
}

impl LeafCtx {
    pub fn new(world: Arc<dyn WorldAdapter>) -> Self {
        Self {
            world,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(world: Arc<dyn WorldAdapter>, cancel: CancelToken) -> Self {
        Self { world, cancel }
    }
}

/// A trusted atomic action.
#[async_trait]
pub trait Leaf: Send + Sync {
    fn spec(&self) -> &LeafSpec;

    async fn run(
        &self,
        ctx: &LeafCtx,
        args: &serde_json::Value,
    ) -> std::result::Result<serde_json::Value, ExecError>;
}

/// Token bucket backing the per-leaf rate limit.
#[derive(Debug)]
struct TokenBucket {
    capacity: u32,
    tokens: u32,
    window_started: Instant,
}

impl TokenBucket {
    fn new(capacity: u32) -> Self {
        Self {
            capacity,
            tokens: capacity,
            window_started: Instant::now(),
        }
    }

    fn try_take(&mut self, window: Duration) -> bool {
        if self.window_started.elapsed() >= window {
            self.tokens = self.capacity;
            self.window_started = Instant::now();
        }
        if self.tokens == 0 {
            return false;
        }
        self.tokens -= 1;
        true
    }
}

/// The registry of trusted leaves, keyed by `(name, version)`.
///
/// Interior mutability keeps registration `&self` so the registry can be
/// shared behind an `Arc` with executors and the governance layer.
#[derive(Default)]
pub struct LeafRegistry {
    leaves: RwLock<BTreeMap<(String, String), Arc<dyn Leaf>>>,
    buckets: Mutex<BTreeMap<String, TokenBucket>>,
    in_flight: Mutex<BTreeMap<String, u32>>,
}

impl LeafRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a leaf. Rejects duplicate `(name, version)` tuples.
    pub fn register(&self, leaf: Arc<dyn Leaf>) -> BtResult<String> {
        let spec = leaf.spec();
        let key = (spec.name.clone(), spec.version.clone());
        let id = spec.id();

        let mut leaves = self.leaves.write().expect("leaf table lock");
        if leaves.contains_key(&key) {
            return Err(BtError::DuplicateVersion {
                name: key.0,
                version: key.1,
            });
        }
        leaves.insert(key, leaf);
        Ok(id)
    }

    /// Look up a leaf by name, optionally pinning a version. Without a
    /// version the highest registered version wins.
    pub fn get(&self, name: &str, version: Option<&str>) -> Option<Arc<dyn Leaf>> {
        let leaves = self.leaves.read().expect("leaf table lock");
        match version {
            Some(v) => leaves.get(&(name.to_string(), v.to_string())).cloned(),
            None => leaves
                .iter()
                .filter(|((n, _), _)| n == name)
                .max_by(|((_, a), _), ((_, b), _)| compare_versions(a, b))
                .map(|(_, leaf)| leaf.clone()),
        }
    }

    pub fn contains(&self, name: &str, version: Option<&str>) -> bool {
        self.get(name, version).is_some()
    }

    /// Ids of all registered leaves, sorted.
    pub fn ids(&self) -> Vec<String> {
        self.leaves
            .read()
            .expect("leaf table lock")
            .keys()
            .map(|(n, v)| format!("{n}@{v}"))
            .collect()
    }

    /// Execute a leaf with schema validation, timeout, bounded retries,
    /// rate limiting, and the concurrency cap.
    pub async fn run(
        &self,
        name: &str,
        version: Option<&str>,
        ctx: &LeafCtx,
        args: &serde_json::Value,
    ) -> ExecResult {
        let started = Instant::now();

        let Some(leaf) = self.get(name, version) else {
            return ExecResult::failure(
                ExecError::new(
                    ExecErrorCode::Unknown,
                    format!("leaf not registered: {name}"),
                ),
                0,
            );
        };
        let spec = leaf.spec().clone();

        if ctx.cancel.is_cancelled() {
            return ExecResult::failure(ExecError::aborted("cancelled before start"), 0);
        }

        if let Err(detail) = spec.input_schema.validate(args) {
            return ExecResult::failure(ExecError::new(ExecErrorCode::InvalidArgs, detail), 0);
        }

        if let Some(limit) = spec.rate_limit_per_min {
            let mut buckets = self.buckets.lock().expect("bucket lock");
            let bucket = buckets
                .entry(spec.id())
                .or_insert_with(|| TokenBucket::new(limit));
            if !bucket.try_take(Duration::from_secs(60)) {
                return ExecResult::failure(
                    ExecError::retryable(ExecErrorCode::RateLimited, "rate limit exceeded"),
                    0,
                );
            }
        }

        if let Some(cap) = spec.max_concurrent {
            let mut in_flight = self.in_flight.lock().expect("in-flight lock");
            let count = in_flight.entry(spec.id()).or_insert(0);
            if *count >= cap {
                return ExecResult::failure(
                    ExecError::retryable(
                        ExecErrorCode::RateLimited,
                        "max concurrent executions reached",
                    ),
                    0,
                );
            }
            *count += 1;
        }

        let result = self.run_with_retries(&leaf, &spec, ctx, args).await;

        if spec.max_concurrent.is_some() {
            let mut in_flight = self.in_flight.lock().expect("in-flight lock");
            if let Some(count) = in_flight.get_mut(&spec.id()) {
                *count = count.saturating_sub(1);
            }
        }

        let mut result = result;
        result.duration_ms = started.elapsed().as_millis() as u64;
        result.metrics.leaf_executions += 1;
        result
    }

    async fn run_with_retries(
        &self,
        leaf: &Arc<dyn Leaf>,
        spec: &LeafSpec,
        ctx: &LeafCtx,
        args: &serde_json::Value,
    ) -> ExecResult {
        let timeout = Duration::from_millis(spec.timeout_ms);
        let max_attempts = spec.retries + 1;
        let mut last_error = ExecError::new(ExecErrorCode::Unknown, "no attempts made");

        for attempt in 1..=max_attempts {
            if ctx.cancel.is_cancelled() {
                return ExecResult::failure(ExecError::aborted("cancelled"), 0);
            }

            match tokio::time::timeout(timeout, leaf.run(ctx, args)).await {
                Ok(Ok(value)) => return ExecResult::success(Some(value), 0),
                Ok(Err(err)) => {
                    debug!(
                        event = "leaf.attempt_failed",
                        leaf = %spec.id(),
                        attempt = attempt,
                        code = ?err.code,
                    );
                    let retry = err.retryable && attempt < max_attempts;
                    last_error = err;
                    if !retry {
                        return ExecResult::failure(last_error, 0);
                    }
                }
                Err(_elapsed) => {
                    // Timeouts are not retried; only explicitly retryable
                    // leaf errors re-attempt.
                    return ExecResult::failure(
                        ExecError::timeout(format!("leaf exceeded {}ms", spec.timeout_ms)),
                        0,
                    );
                }
            }
        }

        ExecResult::failure(last_error, 0)
    }
}

/// Compare dotted numeric versions component-wise.
fn compare_versions(a: &str, b: &str) -> std::cmp::Ordering {
    let parse = |v: &str| -> Vec<u64> {
        v.split('.')
            .map(|p| p.parse::<u64>().unwrap_or(0))
            .collect()
    };
    parse(a).cmp(&parse(b))
}
