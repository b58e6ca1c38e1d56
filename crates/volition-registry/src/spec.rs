//! Capability specs, provenance, and the status machine.
//!
//! Allowed transitions: `shadow -> {active, retired, revoked}`,
//! `active -> {retired, revoked}`, `retired -> {revoked}`; `revoked` is
//! final. `(name, version)` tuples are immutable once registered.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use volition_bt::Permission;

/// Capability lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityStatus {
    Shadow,
    Active,
    Retired,
    Revoked,
}

impl CapabilityStatus {
    /// Whether `self -> to` is a legal transition.
    pub fn can_transition(self, to: CapabilityStatus) -> bool {
        use CapabilityStatus::*;
        matches!(
            (self, to),
            (Shadow, Active)
                | (Shadow, Retired)
                | (Shadow, Revoked)
                | (Active, Retired)
                | (Active, Revoked)
                | (Retired, Revoked)
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            CapabilityStatus::Shadow => "shadow",
            CapabilityStatus::Active => "active",
            CapabilityStatus::Retired => "retired",
            CapabilityStatus::Revoked => "revoked",
        }
    }
}

/// Who authored a capability and from what.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub author: String,
    pub code_hash: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_lineage: Option<String>,
}

/// Shadow governance thresholds for one option.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShadowConfig {
    /// Runs required before auto-promotion is considered.
    pub min_shadow_runs: u64,
    /// Success rate at or above which promotion fires.
    pub success_threshold: f64,
    /// Runs after which a failing option is retired.
    pub max_shadow_runs: u64,
    /// Success rate at or below which retirement fires.
    pub failure_threshold: f64,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            min_shadow_runs: 5,
            success_threshold: 0.8,
            max_shadow_runs: 20,
            failure_threshold: 0.3,
        }
    }
}

/// A registered capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilitySpec {
    /// `<name>@<version>`.
    pub id: String,
    pub name: String,
    pub version: String,
    pub status: CapabilityStatus,
    pub provenance: Provenance,
    /// Union of permissions over the referenced leaves.
    pub permissions: BTreeSet<Permission>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shadow_config: Option<ShadowConfig>,
}

impl CapabilitySpec {
    pub fn capability_id(name: &str, version: &str) -> String {
        format!("{name}@{version}")
    }
}
