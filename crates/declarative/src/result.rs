//! Convergence results - per-node outcome of one submission pass

use crate::error::NodeError;
use crate::resource::NodeKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Lifecycle state of a node within a pass
///
/// Transitions are monotonic: Pending → Submitting → Ready | Failed, or
/// Pending → Failed for nodes that are never submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    Pending,
    Submitting,
    Ready,
    Failed,
}

impl NodeState {
    /// Whether the state can no longer change
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Ready | Self::Failed)
    }

    fn can_become(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Submitting | Self::Failed)
                | (Self::Submitting, Self::Ready | Self::Failed)
        )
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Submitting => "submitting",
            Self::Ready => "ready",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Outcome of a single node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeReport {
    pub id: String,
    pub kind: NodeKind,
    pub state: NodeState,
    /// Whether the orchestrator changed anything to converge
    #[serde(default)]
    pub changed: bool,
    /// Time spent between submission and the convergence signal
    #[serde(default)]
    pub elapsed: Duration,
    /// Present iff `state` is Failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<NodeError>,
}

impl NodeReport {
    fn pending(id: String, kind: NodeKind) -> Self {
        Self {
            id,
            kind,
            state: NodeState::Pending,
            changed: false,
            elapsed: Duration::ZERO,
            error: None,
        }
    }
}

/// Summary counts for a pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplySummary {
    pub ready: usize,
    pub changed: usize,
    pub failed: usize,
    pub pending: usize,
}

impl ApplySummary {
    pub fn total(&self) -> usize {
        self.ready + self.failed + self.pending
    }

    /// Check if every node reached Ready
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.pending == 0
    }
}

/// Per-node states of one pass, in the order nodes were scheduled
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvergenceResult {
    nodes: Vec<NodeReport>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl ConvergenceResult {
    /// Create a result with every node Pending
    pub fn new<I, S>(nodes: I) -> Self
    where
        I: IntoIterator<Item = (S, NodeKind)>,
        S: Into<String>,
    {
        let mut result = Self::default();
        for (id, kind) in nodes {
            let id = id.into();
            result.index.insert(id.clone(), result.nodes.len());
            result.nodes.push(NodeReport::pending(id, kind));
        }
        result
    }

    /// Rebuild the id index after deserialization
    pub fn reindex(&mut self) {
        self.index = self
            .nodes
            .iter()
            .enumerate()
            .map(|(idx, report)| (report.id.clone(), idx))
            .collect();
    }

    fn transition(&mut self, id: &str, next: NodeState) -> Option<&mut NodeReport> {
        let idx = *self.index.get(id)?;
        let report = &mut self.nodes[idx];
        if !report.state.can_become(next) {
            log::warn!(
                "Ignoring transition of '{}' from {} to {}",
                id,
                report.state,
                next
            );
            return None;
        }
        report.state = next;
        Some(report)
    }

    /// Pending → Submitting
    pub fn mark_submitting(&mut self, id: &str) -> bool {
        self.transition(id, NodeState::Submitting).is_some()
    }

    /// Submitting → Ready
    pub fn mark_ready(&mut self, id: &str, changed: bool, elapsed: Duration) -> bool {
        match self.transition(id, NodeState::Ready) {
            Some(report) => {
                report.changed = changed;
                report.elapsed = elapsed;
                true
            }
            None => false,
        }
    }

    /// Pending | Submitting → Failed
    pub fn mark_failed(&mut self, id: &str, error: NodeError, elapsed: Duration) -> bool {
        match self.transition(id, NodeState::Failed) {
            Some(report) => {
                report.error = Some(error);
                report.elapsed = elapsed;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<&NodeReport> {
        self.index.get(id).map(|&idx| &self.nodes[idx])
    }

    pub fn state(&self, id: &str) -> Option<NodeState> {
        self.get(id).map(|report| report.state)
    }

    pub fn error(&self, id: &str) -> Option<&NodeError> {
        self.get(id).and_then(|report| report.error.as_ref())
    }

    /// Reports in scheduling order
    pub fn reports(&self) -> &[NodeReport] {
        &self.nodes
    }

    /// Reports of failed nodes
    pub fn failed(&self) -> impl Iterator<Item = &NodeReport> {
        self.nodes
            .iter()
            .filter(|report| report.state == NodeState::Failed)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn summary(&self) -> ApplySummary {
        let mut summary = ApplySummary::default();
        for report in &self.nodes {
            match report.state {
                NodeState::Ready => {
                    summary.ready += 1;
                    if report.changed {
                        summary.changed += 1;
                    }
                }
                NodeState::Failed => summary.failed += 1,
                NodeState::Pending | NodeState::Submitting => summary.pending += 1,
            }
        }
        summary
    }

    /// Check if every node reached Ready
    pub fn is_success(&self) -> bool {
        self.summary().is_success()
    }
}
