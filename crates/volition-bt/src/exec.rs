//! Compiled-tree executor.
//!
//! Single-threaded cooperative per invocation. The cancellation token is
//! observed at every node entry; timeouts race the child future and
//! return `aborted` on expiry. Metrics aggregate node and leaf execution
//! counts across the whole evaluation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::debug;

use volition_core::{ExecError, ExecErrorCode, ExecMetrics, ExecResult};

use crate::compile::CompiledBt;
use crate::dsl::{BtNode, PredicateCall, DEFAULT_MAX_ITERATIONS};
use crate::leaf::{LeafCtx, LeafRegistry};
use crate::predicates;

/// Executes compiled behavior trees against a leaf context.
pub struct BtExecutor {
    registry: Arc<LeafRegistry>,
}

impl BtExecutor {
    pub fn new(registry: Arc<LeafRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<LeafRegistry> {
        &self.registry
    }

    /// Evaluate a compiled tree to completion.
    pub async fn execute(&self, tree: &CompiledBt, ctx: &LeafCtx) -> ExecResult {
        let started = Instant::now();
        let mut result = self.eval(&tree.root, ctx).await;
        result.duration_ms = started.elapsed().as_millis() as u64;
        debug!(
            event = "bt.executed",
            tree_hash = %tree.tree_hash,
            status = ?result.status,
            nodes = result.metrics.node_executions,
            leaves = result.metrics.leaf_executions,
        );
        result
    }

    fn eval<'a>(&'a self, node: &'a BtNode, ctx: &'a LeafCtx) -> BoxFuture<'a, ExecResult> {
        async move {
            if ctx.cancel.is_cancelled() {
                let mut result =
                    ExecResult::failure(ExecError::aborted("cancelled at node boundary"), 0);
                result.metrics.node_executions = 1;
                return result;
            }

            match node {
                BtNode::Leaf {
                    leaf_name,
                    leaf_version,
                    args,
                } => {
                    let mut result = self
                        .registry
                        .run(leaf_name, leaf_version.as_deref(), ctx, args)
                        .await;
                    result.metrics.node_executions += 1;
                    result
                }

                BtNode::Sequence { children } => {
                    let mut metrics = ExecMetrics {
                        node_executions: 1,
                        ..Default::default()
                    };
                    let mut last = None;
                    for child in children {
                        let child_result = self.eval(child, ctx).await;
                        metrics.absorb(child_result.metrics);
                        if !child_result.is_success() {
                            let mut failed = child_result;
                            failed.metrics = metrics;
                            return failed;
                        }
                        last = Some(child_result);
                    }
                    let mut result = last.unwrap_or_else(|| ExecResult::success(None, 0));
                    result.metrics = metrics;
                    result
                }

                BtNode::Selector { children } => {
                    let mut metrics = ExecMetrics {
                        node_executions: 1,
                        ..Default::default()
                    };
                    let mut last_error: Option<ExecError> = None;
                    for child in children {
                        let child_result = self.eval(child, ctx).await;
                        metrics.absorb(child_result.metrics);
                        if child_result.is_success() {
                            let mut ok = child_result;
                            ok.metrics = metrics;
                            return ok;
                        }
                        last_error = child_result.error;
                    }
                    let error = last_error.unwrap_or_else(|| {
                        ExecError::new(ExecErrorCode::Unknown, "selector had no children")
                    });
                    let mut result = ExecResult::failure(error, 0);
                    result.metrics = metrics;
                    result
                }

                BtNode::RepeatUntil {
                    condition,
                    child,
                    max_iterations,
                } => {
                    self.eval_repeat(condition, child, max_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS), ctx)
                        .await
                }

                BtNode::Timeout { timeout_ms, child } => {
                    let deadline = Duration::from_millis(*timeout_ms);
                    match tokio::time::timeout(deadline, self.eval(child, ctx)).await {
                        Ok(mut result) => {
                            result.metrics.node_executions += 1;
                            result
                        }
                        Err(_elapsed) => {
                            let mut result = ExecResult::failure(
                                ExecError::new(
                                    ExecErrorCode::Aborted,
                                    format!("node exceeded {timeout_ms}ms"),
                                ),
                                0,
                            );
                            result.metrics.node_executions = 1;
                            result
                        }
                    }
                }

                BtNode::FailOnTrue { condition, child } => {
                    let mut metrics = ExecMetrics {
                        node_executions: 1,
                        ..Default::default()
                    };
                    match predicates::evaluate(&condition.name, &condition.params, ctx).await {
                        Ok(true) => {
                            let mut result = ExecResult::failure(
                                ExecError::new(
                                    ExecErrorCode::PreconditionFailed,
                                    format!("condition '{}' held", condition.name),
                                ),
                                0,
                            );
                            result.metrics = metrics;
                            result
                        }
                        Ok(false) => {
                            let child_result = self.eval(child, ctx).await;
                            metrics.absorb(child_result.metrics);
                            let mut result = child_result;
                            result.metrics = metrics;
                            result
                        }
                        Err(err) => {
                            let mut result = ExecResult::failure(err, 0);
                            result.metrics = metrics;
                            result
                        }
                    }
                }
            }
        }
        .boxed()
    }

    async fn eval_repeat(
        &self,
        condition: &PredicateCall,
        child: &BtNode,
        max_iterations: u32,
        ctx: &LeafCtx,
    ) -> ExecResult {
        let mut metrics = ExecMetrics {
            node_executions: 1,
            ..Default::default()
        };

        for _ in 0..max_iterations {
            if ctx.cancel.is_cancelled() {
                let mut result = ExecResult::failure(ExecError::aborted("cancelled"), 0);
                result.metrics = metrics;
                return result;
            }

            match predicates::evaluate(&condition.name, &condition.params, ctx).await {
                Ok(true) => {
                    let mut result = ExecResult::success(None, 0);
                    result.metrics = metrics;
                    return result;
                }
                Ok(false) => {}
                Err(err) => {
                    let mut result = ExecResult::failure(err, 0);
                    result.metrics = metrics;
                    return result;
                }
            }

            let child_result = self.eval(child, ctx).await;
            metrics.absorb(child_result.metrics);
            if !child_result.is_success() {
                let mut failed = child_result;
                failed.metrics = metrics;
                return failed;
            }
        }

        let mut result = ExecResult::failure(
            ExecError::new(ExecErrorCode::MaxIterations, "max_iterations"),
            0,
        );
        result.metrics = metrics;
        result
    }
}
