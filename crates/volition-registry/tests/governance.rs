//! Governance scenarios: registration, shadow lifecycle, audit.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;

use volition_bt::fakes::standard_registry;
use volition_bt::{LeafCtx, Permission};
use volition_core::{ExecErrorCode, SimWorld};
use volition_registry::{
    AuditOp, CapabilityRegistry, CapabilityStatus, Provenance, RegistryConfig, RegistryError,
    ShadowConfig,
};

fn t0() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-01T00:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn provenance() -> Provenance {
    Provenance {
        author: "llm-proposer".to_string(),
        code_hash: "0".repeat(64),
        created_at: t0(),
        parent_lineage: None,
    }
}

fn torch_corridor_doc() -> serde_json::Value {
    json!({
        "type": "sequence",
        "children": [
            {"type": "leaf", "leaf_name": "move_to", "args": {"x": 0.0, "y": 64.0, "z": 0.0}},
            {"type": "leaf", "leaf_name": "sense_hostiles"},
            {"type": "leaf", "leaf_name": "place_torch_if_needed"},
            {"type": "leaf", "leaf_name": "step_forward_safely"}
        ]
    })
}

fn governed_registry() -> CapabilityRegistry {
    CapabilityRegistry::new(Arc::new(standard_registry()), RegistryConfig::default())
}

fn ctx() -> LeafCtx {
    LeafCtx::new(Arc::new(SimWorld::new()))
}

#[test]
fn torch_corridor_registration() {
    let registry = governed_registry();
    let id = registry
        .register_option(
            "opt.torch_corridor",
            "1.0.0",
            torch_corridor_doc(),
            provenance(),
            ShadowConfig::default(),
            t0(),
        )
        .unwrap();
    assert_eq!(id, "opt.torch_corridor@1.0.0");

    let spec = registry.get_spec(&id).unwrap();
    assert_eq!(spec.status, CapabilityStatus::Shadow);

    // Permission union over move_to + sense_hostiles + place_torch_if_needed
    // + step_forward_safely.
    let perms: Vec<Permission> = spec.permissions.iter().copied().collect();
    assert_eq!(
        perms,
        vec![Permission::Movement, Permission::Place, Permission::Sense]
    );

    // Exactly one register_option audit record.
    let audit = registry.get_audit_log();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].op, AuditOp::RegisterOption);
    assert_eq!(audit[0].id, id);

    // Same id again: version_exists, and no extra audit entry.
    let err = registry
        .register_option(
            "opt.torch_corridor",
            "1.0.0",
            torch_corridor_doc(),
            provenance(),
            ShadowConfig::default(),
            t0(),
        )
        .unwrap_err();
    assert!(matches!(err, RegistryError::VersionExists(_)));
    assert_eq!(registry.get_audit_log().len(), 1);
}

#[test]
fn vetoed_option_is_rejected() {
    let registry = governed_registry();
    registry.veto("opt.grief_tower");
    let err = registry
        .register_option(
            "opt.grief_tower",
            "1.0.0",
            torch_corridor_doc(),
            provenance(),
            ShadowConfig::default(),
            t0(),
        )
        .unwrap_err();
    assert!(matches!(err, RegistryError::Vetoed(_)));
    assert!(registry.get_audit_log().is_empty());
}

#[test]
fn shadow_limit_enforced() {
    let registry = CapabilityRegistry::new(
        Arc::new(standard_registry()),
        RegistryConfig {
            max_shadow_active: 2,
            ..Default::default()
        },
    );
    for i in 0..2 {
        registry
            .register_option(
                &format!("opt.filler{i}"),
                "1.0.0",
                torch_corridor_doc(),
                provenance(),
                ShadowConfig::default(),
                t0(),
            )
            .unwrap();
    }
    let err = registry
        .register_option(
            "opt.overflow",
            "1.0.0",
            torch_corridor_doc(),
            provenance(),
            ShadowConfig::default(),
            t0(),
        )
        .unwrap_err();
    assert!(matches!(err, RegistryError::ShadowLimit { .. }));
}

#[test]
fn status_fsm_walks_and_rejections() {
    let registry = governed_registry();
    let id = registry
        .register_option(
            "opt.walk",
            "1.0.0",
            torch_corridor_doc(),
            provenance(),
            ShadowConfig::default(),
            t0(),
        )
        .unwrap();

    // shadow -> active -> retired -> revoked is a legal walk.
    registry.promote_option(&id, "operator", t0()).unwrap();
    registry.retire_option(&id, "operator", t0()).unwrap();
    registry.revoke_option(&id, "operator", t0()).unwrap();

    // Everything from revoked is rejected without side effects.
    for (result, label) in [
        (registry.promote_option(&id, "operator", t0()), "promote"),
        (registry.retire_option(&id, "operator", t0()), "retire"),
        (registry.revoke_option(&id, "operator", t0()), "revoke"),
    ] {
        assert!(result.is_err(), "{label} after revoke must fail");
    }
    assert_eq!(
        registry.get_spec(&id).unwrap().status,
        CapabilityStatus::Revoked
    );

    // register + promote + retire + revoke = 4 records, rejections add none.
    assert_eq!(registry.get_audit_log().len(), 4);
}

#[test]
fn revoke_evicts_compiled_cache() {
    let registry = governed_registry();
    let id = registry
        .register_option(
            "opt.gone",
            "1.0.0",
            torch_corridor_doc(),
            provenance(),
            ShadowConfig::default(),
            t0(),
        )
        .unwrap();
    assert!(registry.is_compiled(&id));
    registry.revoke_option(&id, "operator", t0()).unwrap();
    assert!(!registry.is_compiled(&id));
}

#[tokio::test]
async fn shadow_runs_accrue_and_promote() {
    let registry = governed_registry();
    let id = registry
        .register_option(
            "opt.torch_corridor",
            "1.0.0",
            torch_corridor_doc(),
            provenance(),
            ShadowConfig {
                min_shadow_runs: 3,
                success_threshold: 0.8,
                max_shadow_runs: 20,
                failure_threshold: 0.3,
            },
            t0(),
        )
        .unwrap();

    let ctx = ctx();
    let mut now = t0();
    for _ in 0..3 {
        now += Duration::seconds(1);
        let result = registry.execute_shadow_run(&id, &ctx, now).await.unwrap();
        assert!(result.is_success());
    }

    // Promotion fired automatically at the third successful run.
    assert_eq!(
        registry.get_spec(&id).unwrap().status,
        CapabilityStatus::Active
    );
    let stats = registry.shadow_stats(&id).unwrap();
    assert_eq!(stats.total_runs, 3);
    assert_eq!(stats.success_rate, 1.0);

    let audit = registry.get_audit_log();
    let promotes = audit
        .iter()
        .filter(|r| r.op == AuditOp::PromoteOption)
        .count();
    assert_eq!(promotes, 1);
}

#[tokio::test]
async fn unhealthy_check_defers_promotion() {
    let registry = governed_registry().with_health_check(Arc::new(|| false));
    let id = registry
        .register_option(
            "opt.unwell",
            "1.0.0",
            torch_corridor_doc(),
            provenance(),
            ShadowConfig {
                min_shadow_runs: 1,
                ..Default::default()
            },
            t0(),
        )
        .unwrap();

    let result = registry
        .execute_shadow_run(&id, &ctx(), t0())
        .await
        .unwrap();
    assert!(result.is_success());
    assert_eq!(
        registry.get_spec(&id).unwrap().status,
        CapabilityStatus::Shadow
    );
}

#[tokio::test]
async fn quota_exhaustion_returns_synthetic_failure() {
    let registry = CapabilityRegistry::new(
        Arc::new(standard_registry()),
        RegistryConfig {
            quota_per_window: 2,
            ..Default::default()
        },
    );
    let id = registry
        .register_option(
            "opt.busy",
            "1.0.0",
            torch_corridor_doc(),
            provenance(),
            ShadowConfig {
                min_shadow_runs: 100,
                ..Default::default()
            },
            t0(),
        )
        .unwrap();

    let ctx = ctx();
    let now = t0();
    registry.execute_shadow_run(&id, &ctx, now).await.unwrap();
    registry.execute_shadow_run(&id, &ctx, now).await.unwrap();

    let third = registry.execute_shadow_run(&id, &ctx, now).await.unwrap();
    assert_eq!(third.error.unwrap().code, ExecErrorCode::QuotaExceeded);

    // Quota refills after the window.
    let later = now + Duration::seconds(61);
    let fourth = registry.execute_shadow_run(&id, &ctx, later).await.unwrap();
    assert!(fourth.is_success());
}

#[tokio::test]
async fn circuit_breaker_opens_after_consecutive_failures() {
    let registry = governed_registry();
    // An option whose first leaf demands coordinates it never gets: every
    // run fails with invalid_args.
    let id = registry
        .register_option(
            "opt.doomed",
            "1.0.0",
            json!({"type": "leaf", "leaf_name": "move_to", "args": {"oops": 1}}),
            provenance(),
            ShadowConfig {
                min_shadow_runs: 100,
                max_shadow_runs: 1000,
                ..Default::default()
            },
            t0(),
        )
        .unwrap();

    let ctx = ctx();
    let mut now = t0();
    for _ in 0..3 {
        now += Duration::seconds(1);
        let result = registry.execute_shadow_run(&id, &ctx, now).await.unwrap();
        assert!(!result.is_success());
    }

    // Breaker is now open: synthetic circuit_open failures during cooldown.
    now += Duration::seconds(1);
    let rejected = registry.execute_shadow_run(&id, &ctx, now).await.unwrap();
    assert_eq!(rejected.error.unwrap().code, ExecErrorCode::CircuitOpen);

    // After the five-minute cooldown runs are admitted again.
    let after_cooldown = now + Duration::seconds(5 * 60);
    let admitted = registry
        .execute_shadow_run(&id, &ctx, after_cooldown)
        .await
        .unwrap();
    assert_ne!(
        admitted.error.as_ref().map(|e| e.code),
        Some(ExecErrorCode::CircuitOpen)
    );
}

#[tokio::test]
async fn failing_option_auto_retires() {
    let registry = governed_registry();
    let id = registry
        .register_option(
            "opt.hopeless",
            "1.0.0",
            json!({"type": "leaf", "leaf_name": "move_to", "args": {"oops": 1}}),
            provenance(),
            ShadowConfig {
                min_shadow_runs: 100,
                success_threshold: 0.8,
                max_shadow_runs: 2,
                failure_threshold: 0.3,
            },
            t0(),
        )
        .unwrap();

    let ctx = ctx();
    // Space runs beyond the breaker cooldown so each one executes.
    let mut now = t0();
    registry.execute_shadow_run(&id, &ctx, now).await.unwrap();
    now += Duration::seconds(6 * 60);
    registry.execute_shadow_run(&id, &ctx, now).await.unwrap();

    assert_eq!(
        registry.get_spec(&id).unwrap().status,
        CapabilityStatus::Retired
    );
}

#[test]
fn leaf_track_registers_active() {
    let registry = CapabilityRegistry::new(Arc::new(volition_bt::LeafRegistry::new()), RegistryConfig::default());
    let leaf = volition_bt::fakes::standard_leaves().remove(0);
    let id = registry
        .register_leaf(leaf, provenance(), t0())
        .unwrap();
    assert_eq!(id, "move_to@1.0.0");
    assert_eq!(
        registry.get_spec(&id).unwrap().status,
        CapabilityStatus::Active
    );
    assert!(registry.leaves().contains("move_to", None));

    // Duplicate registration is rejected with no audit entry.
    let leaf = volition_bt::fakes::standard_leaves().remove(0);
    let err = registry.register_leaf(leaf, provenance(), t0()).unwrap_err();
    assert!(matches!(err, RegistryError::VersionExists(_)));
    assert_eq!(registry.get_audit_log().len(), 1);
}

#[test]
fn audit_file_persists_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.jsonl");
    let registry = CapabilityRegistry::new(Arc::new(standard_registry()), RegistryConfig::default())
        .with_audit_file(&path);

    registry
        .register_option(
            "opt.logged",
            "1.0.0",
            torch_corridor_doc(),
            provenance(),
            ShadowConfig::default(),
            t0(),
        )
        .unwrap();
    registry
        .promote_option("opt.logged@1.0.0", "operator", t0())
        .unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(contents.lines().count(), 2);
}
