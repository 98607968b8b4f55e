//! Ingress controller for local clusters

use super::{helm, Chart};
use declarative::{Component, GraphBuilder, Policy, ResourceNode};
use serde_json::json;

const INGRESS_NGINX: Chart<'static> = Chart {
    name: "ingress-nginx",
    repo: "https://kubernetes.github.io/ingress-nginx",
    version: "4.7.2",
};

/// Remote clusters are expected to bring their own controller
pub struct IngressController;

impl Component for IngressController {
    fn name(&self) -> &str {
        "ingress"
    }

    fn compose(&self, policy: &Policy, builder: &mut GraphBuilder) -> declarative::Result<()> {
        builder.node_if(policy.is("target", "local"), || {
            let values = json!({ "controller": { "allowSnippetAnnotations": true } });
            ResourceNode::helm_release(
                "ingress-nginx",
                helm("ingress-nginx", "ingress-nginx", &INGRESS_NGINX, values),
            )
        })?;
        Ok(())
    }
}
