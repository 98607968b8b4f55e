//! Dependency graph - nodes keyed by id, ordered by depends-on edges

use crate::error::{GraphError, Result};
use crate::resource::ResourceNode;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Write as _;

/// Visit state for the depth-first traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// A graph of resource nodes with explicit dependency edges
///
/// Nodes keep their insertion order, which is also the tie-break for
/// [`topological_order`](Self::topological_order). Edges live on the
/// dependent node (`depends_on`), so a node may name dependencies that are
/// added later; [`validate`](Self::validate) resolves them.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DependencyGraph {
    nodes: Vec<ResourceNode>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl DependencyGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from nodes and validate it
    pub fn from_nodes<I>(nodes: I) -> Result<Self>
    where
        I: IntoIterator<Item = ResourceNode>,
    {
        let mut graph = Self::new();
        for node in nodes {
            graph.add_node(node)?;
        }
        graph.validate()?;
        Ok(graph)
    }

    /// Insert a node
    pub fn add_node(&mut self, node: ResourceNode) -> Result<()> {
        if self.index.contains_key(&node.id) {
            return Err(GraphError::DuplicateId { id: node.id });
        }
        self.index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
        Ok(())
    }

    /// Record that `to` depends on `from`
    pub fn add_edge(&mut self, from: &str, to: &str) -> Result<()> {
        if !self.index.contains_key(from) {
            return Err(GraphError::UnknownNode { id: from.to_string() });
        }
        let idx = *self
            .index
            .get(to)
            .ok_or_else(|| GraphError::UnknownNode { id: to.to_string() })?;
        self.nodes[idx].depends_on.insert(from.to_string());
        Ok(())
    }

    /// Check that every edge resolves and the relation is acyclic
    pub fn validate(&self) -> Result<()> {
        self.topological_order().map(|_| ())
    }

    /// Node ids ordered so that every node follows all of its dependencies
    ///
    /// Depth-first over nodes in insertion order; dependencies of a node are
    /// visited in their own insertion order. The result is identical for
    /// identical insertion sequences.
    pub fn topological_order(&self) -> Result<Vec<String>> {
        let mut marks = vec![Mark::Unvisited; self.nodes.len()];
        let mut order = Vec::with_capacity(self.nodes.len());

        for idx in 0..self.nodes.len() {
            self.visit(idx, &mut marks, &mut order)?;
        }

        Ok(order
            .into_iter()
            .map(|idx| self.nodes[idx].id.clone())
            .collect())
    }

    fn visit(&self, idx: usize, marks: &mut [Mark], order: &mut Vec<usize>) -> Result<()> {
        match marks[idx] {
            Mark::Done => Ok(()),
            // Back edge: idx is on the current path
            Mark::InProgress => Err(GraphError::CycleDetected {
                id: self.nodes[idx].id.clone(),
            }),
            Mark::Unvisited => {
                marks[idx] = Mark::InProgress;
                for dep in self.dependency_indices(idx)? {
                    self.visit(dep, marks, order)?;
                }
                marks[idx] = Mark::Done;
                order.push(idx);
                Ok(())
            }
        }
    }

    fn dependency_indices(&self, idx: usize) -> Result<Vec<usize>> {
        let mut deps = self.nodes[idx]
            .depends_on
            .iter()
            .map(|dep| {
                self.index
                    .get(dep)
                    .copied()
                    .ok_or_else(|| GraphError::UnknownNode { id: dep.clone() })
            })
            .collect::<Result<Vec<_>>>()?;
        deps.sort_unstable();
        Ok(deps)
    }

    /// Look up a node by id
    pub fn get(&self, id: &str) -> Option<&ResourceNode> {
        self.index.get(id).map(|&idx| &self.nodes[idx])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> &[ResourceNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ids the given node depends on
    pub fn dependencies(&self, id: &str) -> Vec<&str> {
        self.get(id)
            .map(|node| node.depends_on.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Ids of nodes that depend on the given node, in insertion order
    pub fn dependents(&self, id: &str) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|node| node.depends_on.contains(id))
            .map(|node| node.id.as_str())
            .collect()
    }

    /// All edges as `(from, to)` pairs where `to` depends on `from`
    pub fn edges(&self) -> Vec<(&str, &str)> {
        self.nodes
            .iter()
            .flat_map(|node| {
                node.depends_on
                    .iter()
                    .map(move |dep| (dep.as_str(), node.id.as_str()))
            })
            .collect()
    }

    /// Render the graph in Graphviz dot format
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph resources {\n    rankdir=LR;\n");
        for node in &self.nodes {
            let _ = writeln!(
                out,
                "    \"{}\" [label=\"{}\\n{}\"];",
                node.id, node.id, node.kind
            );
        }
        for (from, to) in self.edges() {
            let _ = writeln!(out, "    \"{from}\" -> \"{to}\";");
        }
        out.push_str("}\n");
        out
    }
}

impl PartialEq for DependencyGraph {
    fn eq(&self, other: &Self) -> bool {
        self.nodes.len() == other.nodes.len()
            && self.nodes.iter().zip(&other.nodes).all(|(a, b)| {
                a.id == b.id && a.kind == b.kind && a.depends_on == b.depends_on
            })
    }
}

impl Eq for DependencyGraph {}
