//! BT-DSL: the JSON behavior-tree description.
//!
//! Six tagged node variants. Parsing distinguishes an unrecognized `type`
//! tag (`unknown_node_type`) from a malformed node body
//! (`invalid_schema`); structural validation rejects empty composite
//! nodes so no degenerate tree reaches the executor.

use serde::{Deserialize, Serialize};

use crate::error::{BtError, BtResult};

/// Default iteration bound for `RepeatUntil`.
pub const DEFAULT_MAX_ITERATIONS: u32 = 100;

/// A named sensor-predicate invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredicateCall {
    pub name: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// A BT-DSL node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BtNode {
    Leaf {
        leaf_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        leaf_version: Option<String>,
        #[serde(default)]
        args: serde_json::Value,
    },
    Sequence {
        children: Vec<BtNode>,
    },
    Selector {
        children: Vec<BtNode>,
    },
    RepeatUntil {
        condition: PredicateCall,
        child: Box<BtNode>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_iterations: Option<u32>,
    },
    Timeout {
        timeout_ms: u64,
        child: Box<BtNode>,
    },
    FailOnTrue {
        condition: PredicateCall,
        child: Box<BtNode>,
    },
}

const KNOWN_TYPES: &[&str] = &[
    "leaf",
    "sequence",
    "selector",
    "repeat_until",
    "timeout",
    "fail_on_true",
];

/// Parse a BT-DSL document into a node tree.
pub fn parse(value: &serde_json::Value) -> BtResult<BtNode> {
    check_node_types(value)?;
    serde_json::from_value(value.clone()).map_err(|e| BtError::InvalidSchema(e.to_string()))
}

/// Recursively reject unrecognized `type` tags before serde sees them, so
/// the failure mode is `unknown_node_type` rather than a generic schema
/// error.
fn check_node_types(value: &serde_json::Value) -> BtResult<()> {
    let Some(obj) = value.as_object() else {
        return Err(BtError::InvalidSchema("node must be an object".to_string()));
    };
    let Some(node_type) = obj.get("type").and_then(|t| t.as_str()) else {
        return Err(BtError::InvalidSchema(
            "node missing 'type' tag".to_string(),
        ));
    };
    if !KNOWN_TYPES.contains(&node_type) {
        return Err(BtError::UnknownNodeType(node_type.to_string()));
    }

    if let Some(children) = obj.get("children").and_then(|c| c.as_array()) {
        for child in children {
            check_node_types(child)?;
        }
    }
    if let Some(child) = obj.get("child") {
        check_node_types(child)?;
    }
    Ok(())
}

impl BtNode {
    /// Structural validation beyond shape: composites must have children.
    pub fn validate(&self) -> BtResult<()> {
        match self {
            BtNode::Leaf { leaf_name, .. } => {
                if leaf_name.is_empty() {
                    return Err(BtError::InvalidSchema("leaf_name is empty".to_string()));
                }
                Ok(())
            }
            BtNode::Sequence { children } | BtNode::Selector { children } => {
                if children.is_empty() {
                    return Err(BtError::InvalidSchema(
                        "composite node has no children".to_string(),
                    ));
                }
                for child in children {
                    child.validate()?;
                }
                Ok(())
            }
            BtNode::RepeatUntil { child, .. }
            | BtNode::Timeout { child, .. }
            | BtNode::FailOnTrue { child, .. } => child.validate(),
        }
    }

    /// All `(leaf_name, leaf_version)` references in the tree, in
    /// depth-first order.
    pub fn leaf_refs(&self) -> Vec<(String, Option<String>)> {
        let mut refs = Vec::new();
        self.collect_leaf_refs(&mut refs);
        refs
    }

    fn collect_leaf_refs(&self, out: &mut Vec<(String, Option<String>)>) {
        match self {
            BtNode::Leaf {
                leaf_name,
                leaf_version,
                ..
            } => out.push((leaf_name.clone(), leaf_version.clone())),
            BtNode::Sequence { children } | BtNode::Selector { children } => {
                for child in children {
                    child.collect_leaf_refs(out);
                }
            }
            BtNode::RepeatUntil { child, .. }
            | BtNode::Timeout { child, .. }
            | BtNode::FailOnTrue { child, .. } => child.collect_leaf_refs(out),
        }
    }
}
