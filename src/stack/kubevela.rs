//! KubeVela core, the VelaUX addon, and its ingress patch

use super::{dns_annotations, helm, patch, source, Chart};
use crate::config::KubeVelaConfig;
use declarative::{Component, GraphBuilder, Policy, ResourceNode};
use serde_json::{json, Map, Value};

const NAMESPACE: &str = "vela-system";

const VELA_CORE: Chart<'static> = Chart {
    name: "vela-core",
    repo: "https://kubevela.github.io/charts",
    version: "1.9.6",
};

pub struct KubeVela<'a> {
    config: &'a KubeVelaConfig,
}

impl<'a> KubeVela<'a> {
    pub fn new(config: &'a KubeVelaConfig) -> Self {
        Self { config }
    }

    fn ingress_patch(&self) -> Value {
        let mut annotations = Map::new();
        annotations.insert(
            "kubernetes.io/ingress.class".to_string(),
            json!("nginx"),
        );
        if let Some(host) = &self.config.host {
            if let Value::Object(dns) = dns_annotations(host) {
                annotations.extend(dns);
            }
        }

        patch(json!({
            "apiVersion": "networking.k8s.io/v1",
            "kind": "Ingress",
            "metadata": {
                "name": "velaux-server",
                "namespace": NAMESPACE,
                "annotations": annotations,
            },
        }))
    }
}

impl Component for KubeVela<'_> {
    fn name(&self) -> &str {
        "kubevela"
    }

    fn compose(&self, policy: &Policy, builder: &mut GraphBuilder) -> declarative::Result<()> {
        if !policy.enabled("kubevela") {
            return Ok(());
        }

        builder
            .node(ResourceNode::helm_release(
                "kubevela",
                helm("kubevela", NAMESPACE, &VELA_CORE, json!({})),
            ))?
            .node(
                ResourceNode::raw_manifest("velaux", source(&self.config.velaux_manifest))
                    .depends_on("kubevela"),
            )?
            .node(ResourceNode::object("velaux-ingress", self.ingress_patch()).depends_on("velaux"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kubevela_chain() {
        let config = KubeVelaConfig::default();
        let mut builder = GraphBuilder::new();
        builder
            .component(&KubeVela::new(&config), &Policy::new().with_bool("kubevela", true))
            .unwrap();
        let graph = builder.build().unwrap();
        assert_eq!(
            graph.topological_order().unwrap(),
            vec!["kubevela", "velaux", "velaux-ingress"]
        );
        assert_eq!(graph.get("velaux-ingress").unwrap().spec["patch"], true);
    }

    #[test]
    fn test_host_annotations() {
        let config = KubeVelaConfig {
            host: Some("vela.example.com".into()),
            ..KubeVelaConfig::default()
        };
        let spec = KubeVela::new(&config).ingress_patch();
        let annotations = &spec["manifest"]["metadata"]["annotations"];
        assert_eq!(annotations["kubernetes.io/ingress.class"], "nginx");
        assert_eq!(
            annotations["external-dns.alpha.kubernetes.io/hostname"],
            "vela.example.com"
        );
    }
}
