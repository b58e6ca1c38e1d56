//! The capability registry.
//!
//! Two registration tracks: trusted leaves enter active; machine-proposed
//! options compile from BT-DSL and enter shadow. Shadow executions run
//! behind a per-option circuit breaker and quota, accrue statistics, and
//! either promote to active or retire. Every successful mutation appends
//! exactly one audit record.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use volition_bt::{compile, BtExecutor, CompiledBt, Leaf, LeafCtx, LeafRegistry, Permission};
use volition_core::{CooldownBreaker, ExecError, ExecErrorCode, ExecResult, ExecStatus};

use crate::audit::{AuditLog, AuditOp};
use crate::error::{RegistryError, RegistryResult};
use crate::quota::QuotaCell;
use crate::shadow::{probe, ShadowRun, ShadowStats, ShadowVerdict};
use crate::spec::{CapabilitySpec, CapabilityStatus, Provenance, ShadowConfig};

/// Optional health gate consulted before auto-promotion.
pub type HealthCheck = Arc<dyn Fn() -> bool + Send + Sync>;

/// Governance knobs.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Maximum options in shadow at once.
    pub max_shadow_active: usize,
    /// Consecutive non-success runs before the breaker opens.
    pub breaker_threshold: u32,
    /// Breaker cooldown.
    pub breaker_cooldown_secs: i64,
    /// Shadow executions allowed per quota window.
    pub quota_per_window: u32,
    /// Quota reset interval.
    pub quota_window_secs: i64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_shadow_active: 10,
            breaker_threshold: 3,
            breaker_cooldown_secs: 5 * 60,
            quota_per_window: 10,
            quota_window_secs: 60,
        }
    }
}

#[derive(Default)]
struct RegistryState {
    specs: BTreeMap<String, CapabilitySpec>,
    documents: BTreeMap<String, serde_json::Value>,
    compiled: BTreeMap<String, Arc<CompiledBt>>,
    runs: BTreeMap<String, Vec<ShadowRun>>,
    breakers: BTreeMap<String, CooldownBreaker>,
    quotas: BTreeMap<String, QuotaCell>,
    veto: BTreeSet<String>,
}

/// The two-track capability registry.
pub struct CapabilityRegistry {
    leaves: Arc<LeafRegistry>,
    executor: BtExecutor,
    config: RegistryConfig,
    health_check: Option<HealthCheck>,
    audit: AuditLog,
    state: Mutex<RegistryState>,
}

impl CapabilityRegistry {
    pub fn new(leaves: Arc<LeafRegistry>, config: RegistryConfig) -> Self {
        Self {
            executor: BtExecutor::new(leaves.clone()),
            leaves,
            config,
            health_check: None,
            audit: AuditLog::in_memory(),
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Persist the audit log as JSON lines at `path`.
    pub fn with_audit_file(mut self, path: impl AsRef<Path>) -> Self {
        self.audit = AuditLog::with_file(path.as_ref());
        self
    }

    pub fn with_health_check(mut self, check: HealthCheck) -> Self {
        self.health_check = Some(check);
        self
    }

    pub fn leaves(&self) -> &Arc<LeafRegistry> {
        &self.leaves
    }

    /// Trusted track: register a leaf and record it active.
    pub fn register_leaf(
        &self,
        leaf: Arc<dyn Leaf>,
        provenance: Provenance,
        now: DateTime<Utc>,
    ) -> RegistryResult<String> {
        let spec = leaf.spec().clone();
        let id = CapabilitySpec::capability_id(&spec.name, &spec.version);

        {
            let state = self.state.lock().expect("registry lock");
            if state.specs.contains_key(&id) {
                return Err(RegistryError::VersionExists(id));
            }
        }

        self.leaves
            .register(leaf)
            .map_err(RegistryError::Compile)?;

        let who = provenance.author.clone();
        let capability = CapabilitySpec {
            id: id.clone(),
            name: spec.name,
            version: spec.version,
            status: CapabilityStatus::Active,
            provenance,
            permissions: spec.permissions.iter().copied().collect(),
            shadow_config: None,
        };

        {
            let mut state = self.state.lock().expect("registry lock");
            state.specs.insert(id.clone(), capability);
        }
        self.audit
            .append(now, AuditOp::RegisterLeaf, &id, &who, None)?;
        Ok(id)
    }

    /// Untrusted track: compile a BT-DSL option and register it as shadow.
    pub fn register_option(
        &self,
        name: &str,
        version: &str,
        document: serde_json::Value,
        provenance: Provenance,
        shadow_config: ShadowConfig,
        now: DateTime<Utc>,
    ) -> RegistryResult<String> {
        let id = CapabilitySpec::capability_id(name, version);

        {
            let state = self.state.lock().expect("registry lock");
            if state.specs.contains_key(&id) {
                return Err(RegistryError::VersionExists(id));
            }
            if state.veto.contains(name) {
                return Err(RegistryError::Vetoed(name.to_string()));
            }
            let shadow_count = state
                .specs
                .values()
                .filter(|s| s.status == CapabilityStatus::Shadow)
                .count();
            if shadow_count >= self.config.max_shadow_active {
                return Err(RegistryError::ShadowLimit {
                    active: shadow_count,
                    max: self.config.max_shadow_active,
                });
            }
        }

        // Compilation validates structure and resolves every leaf; the
        // permission surface is the union over the referenced leaves.
        let compiled = compile(&document, &self.leaves)?;
        let mut permissions: BTreeSet<Permission> = BTreeSet::new();
        for (leaf_name, leaf_version) in &compiled.leaf_refs {
            if let Some(leaf) = self.leaves.get(leaf_name, Some(leaf_version)) {
                permissions.extend(leaf.spec().permissions.iter().copied());
            }
        }

        let who = provenance.author.clone();
        let capability = CapabilitySpec {
            id: id.clone(),
            name: name.to_string(),
            version: version.to_string(),
            status: CapabilityStatus::Shadow,
            provenance,
            permissions,
            shadow_config: Some(shadow_config),
        };

        {
            let mut state = self.state.lock().expect("registry lock");
            state.specs.insert(id.clone(), capability);
            state.documents.insert(id.clone(), document);
            state.compiled.insert(id.clone(), Arc::new(compiled));
        }
        self.audit
            .append(now, AuditOp::RegisterOption, &id, &who, None)?;
        Ok(id)
    }

    /// Execute one shadow run for an option.
    pub async fn execute_shadow_run(
        &self,
        id: &str,
        ctx: &LeafCtx,
        now: DateTime<Utc>,
    ) -> RegistryResult<ExecResult> {
        // Admission: existence, breaker, quota.
        let compiled = {
            let mut state = self.state.lock().expect("registry lock");
            let Some(spec) = state.specs.get(id) else {
                return Err(RegistryError::NotFound(id.to_string()));
            };
            if spec.status != CapabilityStatus::Shadow {
                return Err(RegistryError::InvalidTransition {
                    from: spec.status.label().to_string(),
                    to: "shadow_run".to_string(),
                });
            }

            let breaker = state.breakers.entry(id.to_string()).or_insert_with(|| {
                CooldownBreaker::new(
                    self.config.breaker_threshold,
                    Duration::seconds(self.config.breaker_cooldown_secs),
                )
            });
            breaker.tick(now);
            if breaker.is_open(now) {
                drop(state);
                self.audit.append(
                    now,
                    AuditOp::CircuitOpen,
                    id,
                    "registry",
                    Some("shadow run rejected during cooldown".to_string()),
                )?;
                return Ok(ExecResult::failure(
                    ExecError::new(ExecErrorCode::CircuitOpen, "circuit breaker open"),
                    0,
                ));
            }

            let quota = state.quotas.entry(id.to_string()).or_insert_with(|| {
                QuotaCell::new(
                    self.config.quota_per_window,
                    Duration::seconds(self.config.quota_window_secs),
                    now,
                )
            });
            if !quota.try_take(now) {
                drop(state);
                self.audit.append(
                    now,
                    AuditOp::QuotaExceeded,
                    id,
                    "registry",
                    Some("shadow run rejected by quota".to_string()),
                )?;
                return Ok(ExecResult::failure(
                    ExecError::new(ExecErrorCode::QuotaExceeded, "quota exceeded"),
                    0,
                ));
            }

            // Compile-on-first-use with a write-once cache. Registration
            // already populates it; this covers cache eviction paths.
            let cached = state.compiled.get(id).cloned();
            match cached {
                Some(compiled) => compiled,
                None => {
                    let document = state
                        .documents
                        .get(id)
                        .cloned()
                        .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
                    drop(state);
                    let compiled = Arc::new(compile(&document, &self.leaves)?);
                    let mut state = self.state.lock().expect("registry lock");
                    state
                        .compiled
                        .entry(id.to_string())
                        .or_insert_with(|| compiled.clone());
                    compiled
                }
            }
        };

        let result = self.executor.execute(&compiled, ctx).await;

        // Record the run, update the breaker, and probe governance.
        let verdict = {
            let mut state = self.state.lock().expect("registry lock");
            let run = ShadowRun {
                id: uuid::Uuid::new_v4(),
                timestamp: now,
                status: result.status,
                duration_ms: result.duration_ms,
                error: result.error.as_ref().map(|e| e.detail.clone()),
                metrics: result.metrics,
            };
            state.runs.entry(id.to_string()).or_default().push(run);

            let breaker = state.breakers.get_mut(id).expect("breaker exists");
            if result.status == ExecStatus::Success {
                breaker.record_success();
            } else {
                breaker.record_failure(now);
            }

            let spec = state.specs.get(id).expect("spec exists");
            let config = spec.shadow_config.unwrap_or_default();
            let stats = ShadowStats::from_runs(state.runs.get(id).expect("runs exist"));
            probe(&stats, &config)
        };

        match verdict {
            ShadowVerdict::Promote => {
                let healthy = self.health_check.as_ref().map(|c| c()).unwrap_or(true);
                if healthy {
                    self.transition(id, CapabilityStatus::Active, "auto", now)?;
                } else {
                    info!(event = "registry.promotion_deferred", id = %id, reason = "health check");
                }
            }
            ShadowVerdict::Retire => {
                self.transition(id, CapabilityStatus::Retired, "auto", now)?;
            }
            ShadowVerdict::Keep => {}
        }

        Ok(result)
    }

    /// Manually promote a shadow option to active.
    pub fn promote_option(
        &self,
        id: &str,
        who: &str,
        now: DateTime<Utc>,
    ) -> RegistryResult<()> {
        self.transition(id, CapabilityStatus::Active, who, now)
    }

    /// Retire an option.
    pub fn retire_option(&self, id: &str, who: &str, now: DateTime<Utc>) -> RegistryResult<()> {
        self.transition(id, CapabilityStatus::Retired, who, now)
    }

    /// Revoke an option, evicting its compiled tree and definition.
    pub fn revoke_option(&self, id: &str, who: &str, now: DateTime<Utc>) -> RegistryResult<()> {
        self.transition(id, CapabilityStatus::Revoked, who, now)?;
        let mut state = self.state.lock().expect("registry lock");
        state.compiled.remove(id);
        state.documents.remove(id);
        Ok(())
    }

    fn transition(
        &self,
        id: &str,
        to: CapabilityStatus,
        who: &str,
        now: DateTime<Utc>,
    ) -> RegistryResult<()> {
        let op = {
            let mut state = self.state.lock().expect("registry lock");
            let Some(spec) = state.specs.get_mut(id) else {
                return Err(RegistryError::NotFound(id.to_string()));
            };
            if !spec.status.can_transition(to) {
                return Err(RegistryError::InvalidTransition {
                    from: spec.status.label().to_string(),
                    to: to.label().to_string(),
                });
            }
            spec.status = to;
            match to {
                CapabilityStatus::Active => AuditOp::PromoteOption,
                CapabilityStatus::Retired => AuditOp::RetireOption,
                CapabilityStatus::Revoked => AuditOp::RevokeOption,
                CapabilityStatus::Shadow => unreachable!("no transition enters shadow"),
            }
        };
        self.audit.append(now, op, id, who, None)?;
        Ok(())
    }

    /// A spec snapshot.
    pub fn get_spec(&self, id: &str) -> Option<CapabilitySpec> {
        self.state
            .lock()
            .expect("registry lock")
            .specs
            .get(id)
            .cloned()
    }

    /// Capabilities usable by planners: active status only.
    pub fn active_capabilities(&self) -> Vec<CapabilitySpec> {
        self.state
            .lock()
            .expect("registry lock")
            .specs
            .values()
            .filter(|s| s.status == CapabilityStatus::Active)
            .cloned()
            .collect()
    }

    /// Shadow statistics for one option.
    pub fn shadow_stats(&self, id: &str) -> Option<ShadowStats> {
        let state = self.state.lock().expect("registry lock");
        if !state.specs.contains_key(id) {
            return None;
        }
        let runs = state.runs.get(id).map(Vec::as_slice).unwrap_or(&[]);
        Some(ShadowStats::from_runs(runs))
    }

    /// Counts per status.
    pub fn status_counts(&self) -> BTreeMap<CapabilityStatus, usize> {
        let state = self.state.lock().expect("registry lock");
        let mut counts = BTreeMap::new();
        for spec in state.specs.values() {
            *counts.entry(spec.status).or_insert(0) += 1;
        }
        counts
    }

    /// Whether a compiled tree is cached for this option.
    pub fn is_compiled(&self, id: &str) -> bool {
        self.state
            .lock()
            .expect("registry lock")
            .compiled
            .contains_key(id)
    }

    /// Add a name to the veto list.
    pub fn veto(&self, name: &str) {
        self.state
            .lock()
            .expect("registry lock")
            .veto
            .insert(name.to_string());
    }

    /// Audit-log snapshot, oldest first.
    pub fn get_audit_log(&self) -> Vec<crate::audit::AuditRecord> {
        self.audit.records()
    }
}
