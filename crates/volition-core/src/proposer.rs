//! Contract for the external capability/task proposer (LLM client).
//!
//! The core never speaks to a model directly; it consumes this trait. A
//! deterministic stub ships for tests and smoke runs. Proposals are capped
//! and treated as untrusted input — composite capabilities they describe
//! enter the registry on the shadow track.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Maximum suggestions accepted from one proposal call.
pub const MAX_SUGGESTIONS: usize = 3;

/// What the proposer is asked to help with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalRequest {
    pub task: String,
    pub recent_failures: Vec<String>,
    pub context: serde_json::Value,
}

/// One structured task suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSuggestion {
    pub title: String,
    pub action_type: String,
    pub rationale: String,
}

/// A proposal: either task suggestions or a BT-DSL document describing a
/// new composite capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Proposal {
    Tasks { suggestions: Vec<TaskSuggestion> },
    OptionDsl { document: serde_json::Value },
}

/// The consumed proposer interface.
#[async_trait]
pub trait CapabilityProposer: Send + Sync {
    /// Returns at most [`MAX_SUGGESTIONS`] suggestions, or a BT-DSL
    /// document, or `None` when the proposer has nothing to offer.
    async fn propose(&self, request: &ProposalRequest) -> Option<Proposal>;
}

/// Deterministic stub proposer returning a canned proposal.
#[derive(Debug, Clone, Default)]
pub struct StaticProposer {
    proposal: Option<Proposal>,
}

impl StaticProposer {
    pub fn empty() -> Self {
        Self { proposal: None }
    }

    pub fn with_tasks(suggestions: Vec<TaskSuggestion>) -> Self {
        Self {
            proposal: Some(Proposal::Tasks { suggestions }),
        }
    }

    pub fn with_option_dsl(document: serde_json::Value) -> Self {
        Self {
            proposal: Some(Proposal::OptionDsl { document }),
        }
    }
}

#[async_trait]
impl CapabilityProposer for StaticProposer {
    async fn propose(&self, _request: &ProposalRequest) -> Option<Proposal> {
        let mut proposal = self.proposal.clone()?;
        if let Proposal::Tasks { suggestions } = &mut proposal {
            suggestions.truncate(MAX_SUGGESTIONS);
        }
        Some(proposal)
    }
}
