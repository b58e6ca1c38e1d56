//! Error taxonomy for the behavior-tree layer.

/// Behavior-tree errors.
#[derive(Debug, thiserror::Error)]
pub enum BtError {
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("missing leaf: {name}@{version}")]
    MissingLeaf { name: String, version: String },

    #[error("duplicate leaf version: {name}@{version}")]
    DuplicateVersion { name: String, version: String },

    #[error("leaf not found: {name}@{version}")]
    LeafNotFound { name: String, version: String },

    #[error("unknown predicate: {0}")]
    UnknownPredicate(String),

    #[error("digest error: {0}")]
    Digest(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for behavior-tree operations.
pub type BtResult<T> = std::result::Result<T, BtError>;
