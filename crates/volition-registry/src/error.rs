//! Error taxonomy for the capability registry.

/// Capability-registry errors.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("version exists: {0}")]
    VersionExists(String),

    #[error("capability not found: {0}")]
    NotFound(String),

    #[error("capability vetoed: {0}")]
    Vetoed(String),

    #[error("shadow limit reached: {active} active of {max} allowed")]
    ShadowLimit { active: usize, max: usize },

    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("compilation failed: {0}")]
    Compile(#[from] volition_bt::BtError),

    #[error("audit io error: {0}")]
    AuditIo(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for registry operations.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
