//! Resource nodes - named units of desired state
//!
//! A [`ResourceNode`] carries an opaque desired-state payload and the ids of
//! the nodes that must be Ready before it is submitted. Nodes have no
//! behavior of their own; identity and equality are by `id`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Kind discriminator for a resource node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    /// A packaged chart release
    HelmRelease,
    /// An instance (or patch) of a custom resource definition
    CustomResource,
    /// A secret whose values are resolved at submission time
    Secret,
    /// A namespace
    Namespace,
    /// A manifest file or URL applied as-is
    RawManifest,
    /// Any other built-in object (service account, binding, ingress...)
    Object,
}

impl NodeKind {
    /// Stable, kebab-case name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HelmRelease => "helm-release",
            Self::CustomResource => "custom-resource",
            Self::Secret => "secret",
            Self::Namespace => "namespace",
            Self::RawManifest => "raw-manifest",
            Self::Object => "object",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named unit of desired state plus its declared dependencies
///
/// # Example
///
/// ```
/// use declarative::{NodeKind, ResourceNode};
/// use serde_json::json;
///
/// let ns = ResourceNode::namespace("build-ns", json!({ "metadata": { "name": "build" } }));
/// let secret = ResourceNode::secret("basic-auth", json!({ "metadata": { "name": "basic-auth" } }))
///     .depends_on("build-ns");
///
/// assert_eq!(secret.kind, NodeKind::Secret);
/// assert!(secret.depends_on.contains(ns.id.as_str()));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceNode {
    /// Unique identifier within a graph
    pub id: String,
    /// What kind of object the spec describes
    pub kind: NodeKind,
    /// Desired-state payload, opaque to the graph
    pub spec: Value,
    /// Ids that must reach Ready before this node is submitted
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub depends_on: BTreeSet<String>,
}

impl ResourceNode {
    /// Create a node without dependencies
    pub fn new(id: impl Into<String>, kind: NodeKind, spec: Value) -> Self {
        Self {
            id: id.into(),
            kind,
            spec,
            depends_on: BTreeSet::new(),
        }
    }

    pub fn helm_release(id: impl Into<String>, spec: Value) -> Self {
        Self::new(id, NodeKind::HelmRelease, spec)
    }

    pub fn custom_resource(id: impl Into<String>, spec: Value) -> Self {
        Self::new(id, NodeKind::CustomResource, spec)
    }

    pub fn secret(id: impl Into<String>, spec: Value) -> Self {
        Self::new(id, NodeKind::Secret, spec)
    }

    pub fn namespace(id: impl Into<String>, spec: Value) -> Self {
        Self::new(id, NodeKind::Namespace, spec)
    }

    pub fn raw_manifest(id: impl Into<String>, spec: Value) -> Self {
        Self::new(id, NodeKind::RawManifest, spec)
    }

    pub fn object(id: impl Into<String>, spec: Value) -> Self {
        Self::new(id, NodeKind::Object, spec)
    }

    /// Declare a dependency on another node
    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        self.depends_on.insert(id.into());
        self
    }

    /// Declare dependencies on several nodes
    pub fn depends_on_all<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(ids.into_iter().map(Into::into));
        self
    }

    /// Short human-readable label, e.g. `helm-release/kyverno`
    pub fn label(&self) -> String {
        format!("{}/{}", self.kind, self.id)
    }
}

impl PartialEq for ResourceNode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ResourceNode {}

impl Hash for ResourceNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
