//! BT-DSL compilation: validate, resolve leaves, hash.
//!
//! Compilation is a pure function of the input JSON. The tree hash is
//! computed over the canonical serialization of the parsed tree, so two
//! documents that differ only in key ordering compile to the same hash.
//! No partial compiles are surfaced: any failure aborts the whole
//! compilation.

use volition_core::compute_digest;

use crate::dsl::{parse, BtNode};
use crate::error::{BtError, BtResult};
use crate::leaf::LeafRegistry;

/// A compiled, executable behavior tree.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledBt {
    pub root: BtNode,
    /// Content-addressed digest of the canonical tree.
    pub tree_hash: String,
    /// Resolved `(name, version)` for every leaf reference, depth-first.
    pub leaf_refs: Vec<(String, String)>,
}

/// Compile a BT-DSL document against a leaf registry.
pub fn compile(document: &serde_json::Value, registry: &LeafRegistry) -> BtResult<CompiledBt> {
    // 1-2. Shape and structural validation.
    let root = parse(document)?;
    root.validate()?;

    // 3. Leaf resolution: every reference must name a registered leaf.
    let mut leaf_refs = Vec::new();
    for (name, version) in root.leaf_refs() {
        let Some(leaf) = registry.get(&name, version.as_deref()) else {
            return Err(BtError::MissingLeaf {
                name,
                version: version.unwrap_or_else(|| "latest".to_string()),
            });
        };
        let spec = leaf.spec();
        leaf_refs.push((spec.name.clone(), spec.version.clone()));
    }

    // 4-5. Tree hash over the canonical serialization of the parsed tree.
    let canonical = serde_json::to_value(&root)?;
    let tree_hash = compute_digest(&canonical).map_err(|e| BtError::Digest(e.to_string()))?;

    Ok(CompiledBt {
        root,
        tree_hash,
        leaf_refs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaf::{Leaf, LeafCtx, LeafSpec, Permission};
    use crate::schema::Schema;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;
    use volition_core::ExecError;

    struct NopLeaf {
        spec: LeafSpec,
    }

    impl NopLeaf {
        fn new(name: &str) -> Self {
            Self {
                spec: LeafSpec {
                    name: name.to_string(),
                    version: "1.0.0".to_string(),
                    input_schema: Schema::empty_object(),
                    output_schema: Schema::empty_object(),
                    timeout_ms: 1_000,
                    retries: 0,
                    permissions: vec![Permission::Movement],
                    rate_limit_per_min: None,
                    max_concurrent: None,
                },
            }
        }
    }

    #[async_trait]
    impl Leaf for NopLeaf {
        fn spec(&self) -> &LeafSpec {
            &self.spec
        }
        async fn run(
            &self,
            _ctx: &LeafCtx,
            _args: &serde_json::Value,
        ) -> std::result::Result<serde_json::Value, ExecError> {
            Ok(json!({}))
        }
    }

    fn registry_with(names: &[&str]) -> LeafRegistry {
        let registry = LeafRegistry::new();
        for name in names {
            registry.register(Arc::new(NopLeaf::new(name))).unwrap();
        }
        registry
    }

    #[test]
    fn test_compile_resolves_versions() {
        let registry = registry_with(&["move_to"]);
        let doc = json!({"type": "leaf", "leaf_name": "move_to"});
        let compiled = compile(&doc, &registry).unwrap();
        assert_eq!(
            compiled.leaf_refs,
            vec![("move_to".to_string(), "1.0.0".to_string())]
        );
    }

    #[test]
    fn test_missing_leaf_fails_compilation() {
        let registry = registry_with(&["move_to"]);
        let doc = json!({
            "type": "sequence",
            "children": [
                {"type": "leaf", "leaf_name": "move_to"},
                {"type": "leaf", "leaf_name": "dig_block"}
            ]
        });
        match compile(&doc, &registry).unwrap_err() {
            BtError::MissingLeaf { name, .. } => assert_eq!(name, "dig_block"),
            other => panic!("expected MissingLeaf, got {:?}", other),
        }
    }

    #[test]
    fn test_hash_stable_across_key_reordering() {
        let registry = registry_with(&["move_to"]);
        let a = json!({"type": "leaf", "leaf_name": "move_to", "args": {"x": 1, "y": 2}});
        let b = json!({"args": {"y": 2, "x": 1}, "leaf_name": "move_to", "type": "leaf"});
        let ca = compile(&a, &registry).unwrap();
        let cb = compile(&b, &registry).unwrap();
        assert_eq!(ca.tree_hash, cb.tree_hash);
    }

    #[test]
    fn test_hash_differs_for_different_trees() {
        let registry = registry_with(&["move_to", "sense_hostiles"]);
        let a = json!({"type": "leaf", "leaf_name": "move_to"});
        let b = json!({"type": "leaf", "leaf_name": "sense_hostiles"});
        assert_ne!(
            compile(&a, &registry).unwrap().tree_hash,
            compile(&b, &registry).unwrap().tree_hash,
        );
    }

    #[test]
    fn test_repeated_compiles_are_identical() {
        let registry = registry_with(&["move_to"]);
        let doc = json!({
            "type": "timeout",
            "timeout_ms": 500,
            "child": {"type": "leaf", "leaf_name": "move_to"}
        });
        let first = compile(&doc, &registry).unwrap();
        let second = compile(&doc, &registry).unwrap();
        assert_eq!(first.tree_hash, second.tree_hash);
        assert_eq!(first.root, second.root);
    }
}
