//! Graph composition - components add nodes to a builder according to a policy
//!
//! Optional sub-trees are decided by pure functions of the [`Policy`]
//! rather than by branching inside one assembly routine. Each
//! [`Component`] contributes a treelet of nodes; the [`GraphBuilder`]
//! tracks which nodes belong to which component so that whole components
//! can be ordered after one another.

use crate::error::{GraphError, Result};
use crate::graph::DependencyGraph;
use crate::policy::Policy;
use crate::resource::ResourceNode;

/// A named group of nodes that composes itself into a graph
pub trait Component {
    /// Unique component name, used for component-level edges
    fn name(&self) -> &str;

    /// Add this component's nodes and edges for the given policy
    ///
    /// Must not perform I/O: the same policy always yields the same nodes.
    fn compose(&self, policy: &Policy, builder: &mut GraphBuilder) -> Result<()>;
}

/// Incrementally builds a [`DependencyGraph`], then freezes it with [`build`](Self::build)
#[derive(Debug, Default)]
pub struct GraphBuilder {
    graph: DependencyGraph,
    components: Vec<(String, Vec<String>)>,
    current: Vec<usize>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, attributing it to the component being composed
    pub fn node(&mut self, node: ResourceNode) -> Result<&mut Self> {
        let id = node.id.clone();
        self.graph.add_node(node)?;
        for &idx in &self.current {
            self.components[idx].1.push(id.clone());
        }
        Ok(self)
    }

    /// Add a node only when `include` holds
    pub fn node_if<F>(&mut self, include: bool, make: F) -> Result<&mut Self>
    where
        F: FnOnce() -> ResourceNode,
    {
        if include {
            self.node(make())
        } else {
            Ok(self)
        }
    }

    /// Record that `to` depends on `from`; both nodes must already exist
    pub fn edge(&mut self, from: &str, to: &str) -> Result<&mut Self> {
        self.graph.add_edge(from, to)?;
        Ok(self)
    }

    /// Compose a component into this builder
    pub fn component(&mut self, component: &dyn Component, policy: &Policy) -> Result<&mut Self> {
        let name = component.name().to_string();
        if self.components.iter().any(|(existing, _)| *existing == name) {
            return Err(GraphError::DuplicateId { id: name });
        }

        log::debug!("Composing component '{name}'");
        self.components.push((name, Vec::new()));
        self.current.push(self.components.len() - 1);
        let result = component.compose(policy, self);
        self.current.pop();
        result?;
        Ok(self)
    }

    /// Node ids contributed by a component, in insertion order
    pub fn members(&self, component: &str) -> Option<&[String]> {
        self.components
            .iter()
            .find(|(name, _)| name == component)
            .map(|(_, ids)| ids.as_slice())
    }

    /// Order a whole component after another one
    ///
    /// Every node of `dependent` without a predecessor inside `dependent`
    /// gets an edge from every node of `dependency` without a successor
    /// inside `dependency`. Either component may be empty, in which case no
    /// edges are added.
    pub fn component_depends_on(&mut self, dependent: &str, dependency: &str) -> Result<&mut Self> {
        let unknown = |id: &str| GraphError::UnknownNode { id: id.to_string() };
        let dependent_ids = self.members(dependent).ok_or_else(|| unknown(dependent))?.to_vec();
        let dependency_ids = self.members(dependency).ok_or_else(|| unknown(dependency))?.to_vec();

        let roots: Vec<&String> = dependent_ids
            .iter()
            .filter(|id| {
                self.graph.get(id).is_some_and(|node| {
                    !node.depends_on.iter().any(|dep| dependent_ids.contains(dep))
                })
            })
            .collect();
        let leaves: Vec<&String> = dependency_ids
            .iter()
            .filter(|id| {
                !self
                    .graph
                    .dependents(id)
                    .iter()
                    .any(|d| dependency_ids.iter().any(|m| m == d))
            })
            .collect();

        for root in &roots {
            for leaf in &leaves {
                self.graph.add_edge(leaf, root)?;
            }
        }
        Ok(self)
    }

    /// Validate and freeze the graph
    pub fn build(self) -> Result<DependencyGraph> {
        self.graph.validate()?;
        Ok(self.graph)
    }
}

/// Compose components in order against one policy and return the validated graph
pub fn build_graph(policy: &Policy, components: &[&dyn Component]) -> Result<DependencyGraph> {
    let mut builder = GraphBuilder::new();
    for component in components {
        builder.component(*component, policy)?;
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::NodeKind;
    use serde_json::json;

    struct Base;

    impl Component for Base {
        fn name(&self) -> &str {
            "base"
        }

        fn compose(&self, policy: &Policy, builder: &mut GraphBuilder) -> Result<()> {
            builder.node(ResourceNode::helm_release("base", json!({ "chart": "base" })))?;
            builder.node_if(policy.enabled("includeReporter"), || {
                ResourceNode::helm_release("reporter", json!({ "chart": "reporter" }))
                    .depends_on("base")
            })?;
            Ok(())
        }
    }

    struct Pipeline;

    impl Component for Pipeline {
        fn name(&self) -> &str {
            "pipeline"
        }

        fn compose(&self, _policy: &Policy, builder: &mut GraphBuilder) -> Result<()> {
            builder
                .node(ResourceNode::raw_manifest("operator", json!({ "file": "release.yaml" })))?
                .node(ResourceNode::namespace("build", json!({})))?
                .edge("operator", "build")?;
            Ok(())
        }
    }

    #[test]
    fn test_reporter_excluded_by_policy() {
        let policy = Policy::new().with_bool("includeReporter", false);
        let graph = build_graph(&policy, &[&Base]).unwrap();
        assert_eq!(graph.len(), 1);
        assert!(graph.contains("base"));
        assert!(!graph.contains("reporter"));
    }

    #[test]
    fn test_reporter_included_by_policy() {
        let policy = Policy::new().with_bool("includeReporter", true);
        let graph = build_graph(&policy, &[&Base]).unwrap();
        assert_eq!(graph.topological_order().unwrap(), vec!["base", "reporter"]);
    }

    #[test]
    fn test_build_is_pure() {
        let policy = Policy::new().with_bool("includeReporter", true);
        let a = build_graph(&policy, &[&Pipeline, &Base]).unwrap();
        let b = build_graph(&policy, &[&Pipeline, &Base]).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_value(&a).unwrap(),
            serde_json::to_value(&b).unwrap()
        );
    }

    #[test]
    fn test_component_membership() {
        let mut builder = GraphBuilder::new();
        builder.component(&Pipeline, &Policy::new()).unwrap();
        assert_eq!(
            builder.members("pipeline").unwrap(),
            ["operator".to_string(), "build".to_string()]
        );
        assert!(builder.members("base").is_none());
    }

    #[test]
    fn test_component_depends_on_wires_roots_to_leaves() {
        let policy = Policy::new().with_bool("includeReporter", true);
        let mut builder = GraphBuilder::new();
        builder.component(&Pipeline, &policy).unwrap();
        builder.component(&Base, &policy).unwrap();
        builder.component_depends_on("base", "pipeline").unwrap();
        let graph = builder.build().unwrap();

        // base is the only root of its component, build the only leaf of pipeline
        assert_eq!(graph.dependencies("base"), vec!["build"]);
        assert_eq!(graph.dependencies("reporter"), vec!["base"]);
        assert_eq!(
            graph.topological_order().unwrap(),
            vec!["operator", "build", "base", "reporter"]
        );
    }

    #[test]
    fn test_unknown_component_rejected() {
        let mut builder = GraphBuilder::new();
        builder.component(&Base, &Policy::new()).unwrap();
        let err = builder.component_depends_on("base", "missing").unwrap_err();
        assert_eq!(err, GraphError::UnknownNode { id: "missing".into() });
    }

    #[test]
    fn test_duplicate_component_rejected() {
        let mut builder = GraphBuilder::new();
        builder.component(&Base, &Policy::new()).unwrap();
        let err = builder.component(&Base, &Policy::new()).unwrap_err();
        assert_eq!(err, GraphError::DuplicateId { id: "base".into() });
    }

    #[test]
    fn test_build_rejects_cycle() {
        let mut builder = GraphBuilder::new();
        builder
            .node(ResourceNode::new("a", NodeKind::Secret, json!({})).depends_on("b"))
            .unwrap()
            .node(ResourceNode::new("b", NodeKind::Secret, json!({})).depends_on("a"))
            .unwrap();
        assert!(matches!(
            builder.build(),
            Err(GraphError::CycleDetected { .. })
        ));
    }

    #[test]
    fn test_build_rejects_self_dependency() {
        let mut builder = GraphBuilder::new();
        builder
            .node(ResourceNode::new("a", NodeKind::Secret, json!({})).depends_on("a"))
            .unwrap();
        assert_eq!(
            builder.build().unwrap_err(),
            GraphError::CycleDetected { id: "a".into() }
        );
    }
}
