//! Compile-determinism properties over the full torch-corridor tree.

use serde_json::json;
use volition_bt::fakes::standard_registry;
use volition_bt::{compile, BtError};

/// The torch-corridor option used across the governance scenarios.
fn torch_corridor_doc() -> serde_json::Value {
    json!({
        "type": "sequence",
        "children": [
            {"type": "leaf", "leaf_name": "move_to", "args": {"x": 0.0, "y": 64.0, "z": 0.0}},
            {"type": "leaf", "leaf_name": "sense_hostiles"},
            {
                "type": "repeat_until",
                "condition": {"name": "position_reached", "params": {"x": 16.0, "y": 64.0, "z": 0.0}},
                "child": {
                    "type": "sequence",
                    "children": [
                        {"type": "leaf", "leaf_name": "place_torch_if_needed"},
                        {"type": "leaf", "leaf_name": "step_forward_safely"}
                    ]
                },
                "max_iterations": 32
            }
        ]
    })
}

/// Same tree with every object's keys listed in a different order.
fn torch_corridor_doc_reordered() -> serde_json::Value {
    json!({
        "children": [
            {"args": {"z": 0.0, "x": 0.0, "y": 64.0}, "leaf_name": "move_to", "type": "leaf"},
            {"leaf_name": "sense_hostiles", "type": "leaf"},
            {
                "max_iterations": 32,
                "child": {
                    "children": [
                        {"leaf_name": "place_torch_if_needed", "type": "leaf"},
                        {"leaf_name": "step_forward_safely", "type": "leaf"}
                    ],
                    "type": "sequence"
                },
                "condition": {"params": {"y": 64.0, "z": 0.0, "x": 16.0}, "name": "position_reached"},
                "type": "repeat_until"
            }
        ],
        "type": "sequence"
    })
}

#[test]
fn compile_is_deterministic() {
    let registry = standard_registry();
    let doc = torch_corridor_doc();
    let hashes: Vec<String> = (0..5)
        .map(|_| compile(&doc, &registry).unwrap().tree_hash)
        .collect();
    assert!(hashes.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn key_order_does_not_affect_hash() {
    let registry = standard_registry();
    let a = compile(&torch_corridor_doc(), &registry).unwrap();
    let b = compile(&torch_corridor_doc_reordered(), &registry).unwrap();
    assert_eq!(a.tree_hash, b.tree_hash);
    assert_eq!(a.leaf_refs, b.leaf_refs);
}

#[test]
fn semantic_change_changes_hash() {
    let registry = standard_registry();
    let a = compile(&torch_corridor_doc(), &registry).unwrap();

    let mut changed = torch_corridor_doc();
    changed["children"][2]["max_iterations"] = json!(64);
    let b = compile(&changed, &registry).unwrap();
    assert_ne!(a.tree_hash, b.tree_hash);
}

#[test]
fn no_partial_compile_on_missing_leaf() {
    let registry = standard_registry();
    let mut doc = torch_corridor_doc();
    doc["children"][1]["leaf_name"] = json!("sense_ghosts");
    match compile(&doc, &registry).unwrap_err() {
        BtError::MissingLeaf { name, .. } => assert_eq!(name, "sense_ghosts"),
        other => panic!("expected MissingLeaf, got {:?}", other),
    }
}
