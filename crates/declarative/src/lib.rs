//! # Declarative
//!
//! A framework for composing declarative resource graphs and converging
//! them through an external orchestrator.
//!
//! ## Core Concepts
//!
//! - **ResourceNode**: A named unit of desired state with its dependencies
//! - **DependencyGraph**: Nodes plus depends-on edges, validated acyclic
//! - **Policy**: Named flags deciding which optional nodes exist
//! - **Component**: A treelet of nodes composed from a policy
//! - **Driver**: Submits nodes in dependency order and collects a
//!   [`ConvergenceResult`]
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use declarative::{
//!     build_graph, Component, ConvergenceSignal, Driver, GraphBuilder, NodeState,
//!     Orchestrator, Policy, ResourceNode,
//! };
//! use serde_json::json;
//!
//! struct Policies;
//!
//! impl Component for Policies {
//!     fn name(&self) -> &str {
//!         "kyverno"
//!     }
//!
//!     fn compose(&self, policy: &Policy, builder: &mut GraphBuilder) -> declarative::Result<()> {
//!         builder.node(ResourceNode::helm_release("kyverno", json!({ "chart": "kyverno" })))?;
//!         builder.node_if(policy.enabled("reporter"), || {
//!             ResourceNode::helm_release("reporter", json!({ "chart": "policy-reporter" }))
//!                 .depends_on("kyverno")
//!         })?;
//!         Ok(())
//!     }
//! }
//!
//! struct AlwaysReady;
//!
//! impl Orchestrator for AlwaysReady {
//!     fn submit(&self, _node: &ResourceNode, _wait: Duration) -> ConvergenceSignal {
//!         ConvergenceSignal::Converged
//!     }
//! }
//!
//! let policy = Policy::new().with_bool("reporter", true);
//! let graph = build_graph(&policy, &[&Policies]).unwrap();
//! let result = Driver::new(Arc::new(AlwaysReady)).apply(&graph).unwrap();
//!
//! assert_eq!(result.state("reporter"), Some(NodeState::Ready));
//! ```
//!
//! ## Provider Traits
//!
//! - [`Orchestrator`]: The single effectful capability, submit and wait
//! - [`Progress`]: Receives progress updates during a pass
//!
//! The driver holds no cluster or network state of its own, so graphs and
//! passes can be tested against a fake orchestrator.

pub mod compose;
pub mod driver;
pub mod error;
pub mod graph;
pub mod orchestrator;
pub mod policy;
pub mod resource;
pub mod result;

// Re-export main types at crate root
pub use compose::{build_graph, Component, GraphBuilder};
pub use driver::{DriveOptions, Driver};
pub use error::{ApplyError, GraphError, NodeError, Result};
pub use graph::DependencyGraph;
pub use orchestrator::{CancelToken, ConvergenceSignal, NoProgress, Orchestrator, Progress};
pub use policy::{Flag, Policy};
pub use resource::{NodeKind, ResourceNode};
pub use result::{ApplySummary, ConvergenceResult, NodeReport, NodeState};
