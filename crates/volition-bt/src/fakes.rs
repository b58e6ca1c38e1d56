//! Sim-backed leaves for tests and smoke runs.
//!
//! These leaves perform no real-world I/O; they validate against the same
//! schemas and permission surfaces as production leaves so governance and
//! executor paths are exercised end to end.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use volition_core::{ExecError, ExecErrorCode};

use crate::leaf::{Leaf, LeafCtx, LeafRegistry, LeafSpec, Permission};
use crate::schema::Schema;

/// A leaf whose run returns its name and echoes its arguments.
pub struct SimLeaf {
    spec: LeafSpec,
}

impl SimLeaf {
    pub fn new(spec: LeafSpec) -> Self {
        Self { spec }
    }
}

#[async_trait]
impl Leaf for SimLeaf {
    fn spec(&self) -> &LeafSpec {
        &self.spec
    }

    async fn run(
        &self,
        ctx: &LeafCtx,
        args: &serde_json::Value,
    ) -> std::result::Result<serde_json::Value, ExecError> {
        if ctx.cancel.is_cancelled() {
            return Err(ExecError::aborted("cancelled"));
        }
        // One tick per action keeps the sim clock honest.
        ctx.world
            .wait_for_ticks(1)
            .await
            .map_err(|e| ExecError::new(ExecErrorCode::Unknown, e.to_string()))?;
        Ok(json!({ "leaf": self.spec.name, "args": args.clone() }))
    }
}

fn number_field() -> Schema {
    Schema::Number {
        minimum: None,
        maximum: None,
    }
}

fn coords_schema(required: &[&str]) -> Schema {
    let mut properties = BTreeMap::new();
    for key in ["x", "y", "z"] {
        properties.insert(key.to_string(), number_field());
    }
    Schema::Object {
        properties,
        required: required.iter().map(|s| s.to_string()).collect(),
    }
}

fn spec(
    name: &str,
    input_schema: Schema,
    permissions: Vec<Permission>,
) -> LeafSpec {
    LeafSpec {
        name: name.to_string(),
        version: "1.0.0".to_string(),
        input_schema,
        output_schema: Schema::empty_object(),
        timeout_ms: 2_000,
        retries: 1,
        permissions,
        rate_limit_per_min: None,
        max_concurrent: None,
    }
}

/// The standard sim leaf set: movement, sensing, torch placement, and
/// careful stepping, plus food handling.
pub fn standard_leaves() -> Vec<Arc<dyn Leaf>> {
    vec![
        Arc::new(SimLeaf::new(spec(
            "move_to",
            coords_schema(&["x", "y", "z"]),
            vec![Permission::Movement],
        ))),
        Arc::new(SimLeaf::new(spec(
            "sense_hostiles",
            Schema::empty_object(),
            vec![Permission::Sense],
        ))),
        Arc::new(SimLeaf::new(spec(
            "place_torch_if_needed",
            Schema::empty_object(),
            vec![Permission::Place, Permission::Sense],
        ))),
        Arc::new(SimLeaf::new(spec(
            "step_forward_safely",
            Schema::empty_object(),
            vec![Permission::Movement, Permission::Sense],
        ))),
        Arc::new(SimLeaf::new(spec(
            "eat_food",
            Schema::empty_object(),
            vec![Permission::Container],
        ))),
    ]
}

/// A registry pre-populated with [`standard_leaves`].
pub fn standard_registry() -> LeafRegistry {
    let registry = LeafRegistry::new();
    for leaf in standard_leaves() {
        registry.register(leaf).expect("standard leaves are unique");
    }
    registry
}
