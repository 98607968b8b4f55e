//! Orchestrator capability and driver callbacks
//!
//! These traits keep the driver free of any cluster, cloud or UI
//! dependency. The only way a pass mutates external state is
//! [`Orchestrator::submit`].

use crate::resource::ResourceNode;
use crate::result::{ApplySummary, NodeReport};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// What the orchestrator reports once a submission settles
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvergenceSignal {
    /// Actual state now matches desired state, after changes
    Converged,
    /// Actual state already matched; nothing was changed
    AlreadyConverged,
    /// Reconciliation failed
    Failed { detail: String },
}

impl ConvergenceSignal {
    pub fn failed(detail: impl Into<String>) -> Self {
        Self::Failed {
            detail: detail.into(),
        }
    }

    pub fn is_ready(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

/// Submits desired state and blocks until it converges
///
/// `wait` is the bound the driver enforces on this call. Implementations
/// that drive external processes should pass it on so abandoned work does
/// not outlive the pass.
pub trait Orchestrator: Send + Sync {
    fn submit(&self, node: &ResourceNode, wait: Duration) -> ConvergenceSignal;
}

/// Progress callback for a submission pass
pub trait Progress: Send {
    /// Called once the order is known and before any submission
    fn on_pass_start(&mut self, total: usize);

    /// Called when a node is handed to the orchestrator
    fn on_node_start(&mut self, node: &ResourceNode);

    /// Called when a node reaches a final state
    fn on_node_complete(&mut self, report: &NodeReport);

    /// Called after every node reached a final state
    fn on_pass_complete(&mut self, summary: &ApplySummary);
}

/// No-op progress callback
pub struct NoProgress;

impl Progress for NoProgress {
    fn on_pass_start(&mut self, _total: usize) {}
    fn on_node_start(&mut self, _node: &ResourceNode) {}
    fn on_node_complete(&mut self, _report: &NodeReport) {}
    fn on_pass_complete(&mut self, _summary: &ApplySummary) {}
}

/// Shared flag that cancels the remainder of a pass
///
/// Nodes already submitted run to completion; nodes not yet submitted are
/// marked Failed with `Cancelled`.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
