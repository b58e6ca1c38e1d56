//! Append-only audit log.
//!
//! Every successful registry mutation appends exactly one record; failed
//! operations append none. Records are never mutated after append. The
//! log optionally persists as line-oriented JSON — the only on-disk state
//! in the system.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::RegistryResult;

/// Audited operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOp {
    RegisterLeaf,
    RegisterOption,
    PromoteOption,
    RetireOption,
    RevokeOption,
    QuotaExceeded,
    CircuitOpen,
}

/// One audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub ts: DateTime<Utc>,
    pub op: AuditOp,
    pub id: String,
    pub who: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// The append-only log with optional file persistence.
#[derive(Default)]
pub struct AuditLog {
    records: Mutex<Vec<AuditRecord>>,
    path: Option<PathBuf>,
}

impl AuditLog {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Log that also appends each record as one JSON line to `path`.
    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            path: Some(path.into()),
        }
    }

    /// Append a record. Never mutates existing entries.
    pub fn append(
        &self,
        ts: DateTime<Utc>,
        op: AuditOp,
        id: &str,
        who: &str,
        detail: Option<String>,
    ) -> RegistryResult<()> {
        let record = AuditRecord {
            ts,
            op,
            id: id.to_string(),
            who: who.to_string(),
            detail,
        };
        info!(event = "registry.audit", op = ?record.op, id = %record.id, who = %record.who);

        if let Some(path) = &self.path {
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            let line = serde_json::to_string(&record)?;
            writeln!(file, "{line}")?;
        }

        self.records.lock().expect("audit lock").push(record);
        Ok(())
    }

    /// Snapshot of all records, oldest first.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().expect("audit lock").clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("audit lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
