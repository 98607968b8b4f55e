//! Error types for the declarative crate
//!
//! [`GraphError`] aborts a pass before anything is submitted.
//! [`NodeError`] is recorded against a single node and only reaches its
//! dependents.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while building or validating a dependency graph
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// A node with the same id already exists in the graph
    #[error("duplicate node id: {id}")]
    DuplicateId { id: String },

    /// An edge references a node that is not in the graph
    #[error("unknown node: {id}")]
    UnknownNode { id: String },

    /// The dependency relation contains a cycle through `id`
    #[error("dependency cycle detected at node: {id}")]
    CycleDetected { id: String },
}

impl GraphError {
    /// Id of the node the error refers to
    pub fn node_id(&self) -> &str {
        match self {
            Self::DuplicateId { id } | Self::UnknownNode { id } | Self::CycleDetected { id } => id,
        }
    }
}

/// Per-node failure recorded in a convergence result
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum NodeError {
    /// A dependency did not reach Ready, so the node was never submitted
    #[error("dependency '{dependency}' did not converge")]
    DependencyFailed { dependency: String },

    /// The orchestrator did not signal convergence within the bounded wait
    #[error("no convergence signal after {}s", .after.as_secs())]
    ConvergenceTimeout { after: Duration },

    /// The pass was cancelled before the node was submitted
    #[error("cancelled before submission")]
    Cancelled,

    /// The orchestrator reported a failure
    #[error("orchestrator error: {detail}")]
    Orchestrator { detail: String },
}

impl NodeError {
    /// Whether the node was never handed to the orchestrator
    pub fn never_submitted(&self) -> bool {
        matches!(self, Self::DependencyFailed { .. } | Self::Cancelled)
    }
}

/// Errors that abort a submission pass before anything is submitted
#[derive(Error, Debug)]
pub enum ApplyError {
    /// The graph failed validation
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// The submission worker pool could not be created
    #[error("failed to start worker pool: {0}")]
    WorkerPool(String),
}

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, GraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_error_names_node() {
        let err = GraphError::CycleDetected { id: "a".into() };
        assert_eq!(err.node_id(), "a");
        assert_eq!(err.to_string(), "dependency cycle detected at node: a");
    }

    #[test]
    fn test_node_error_display() {
        let err = NodeError::ConvergenceTimeout {
            after: Duration::from_secs(90),
        };
        assert_eq!(err.to_string(), "no convergence signal after 90s");
        assert!(!err.never_submitted());
        assert!(NodeError::Cancelled.never_submitted());
    }
}
