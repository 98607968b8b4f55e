//! Kyverno admission control, its default policies, and optional extras

use super::{helm, source, Chart};
use declarative::{Component, GraphBuilder, Policy, ResourceNode};
use serde_json::json;
use std::collections::BTreeSet;

const NAMESPACE: &str = "compliance";

const KYVERNO: Chart<'static> = Chart {
    name: "kyverno",
    repo: "https://kyverno.github.io/kyverno/",
    version: "3.0.5",
};

const KYVERNO_POLICIES: Chart<'static> = Chart {
    name: "kyverno-policies",
    repo: "https://kyverno.github.io/kyverno/",
    version: "3.0.4",
};

const POLICY_REPORTER: Chart<'static> = Chart {
    name: "policy-reporter",
    repo: "https://kyverno.github.io/policy-reporter/",
    version: "2.20.0",
};

/// Upstream location of a tekton policy manifest
pub fn tekton_policy_url(policy: &str) -> String {
    format!("https://raw.githubusercontent.com/kyverno/policies/main/tekton/{policy}/{policy}.yaml")
}

pub struct Kyverno;

impl Component for Kyverno {
    fn name(&self) -> &str {
        "kyverno"
    }

    fn compose(&self, policy: &Policy, builder: &mut GraphBuilder) -> declarative::Result<()> {
        let values = json!({
            "config": {
                "resourceFilters": [
                    "[Event,*,*]",
                    "[*,kube-system,*]",
                    "[*,kube-public,*]",
                    "[*,kube-node-lease,*]",
                    "[Node,*,*]",
                    "[APIService,*,*]",
                    "[TokenReview,*,*]",
                    "[SubjectAccessReview,*,*]",
                    "[SelfSubjectAccessReview,*,*]",
                    "[*,kyverno,kyverno*]",
                    "[Binding,*,*]",
                    "[ReplicaSet,*,*]",
                    "[ReportChangeRequest,*,*]",
                    "[ClusterReportChangeRequest,*,*]",
                    "[*,capv-system,*]",
                    "[*,capm3-system,*]",
                ],
            },
        });

        builder
            .node(ResourceNode::helm_release(
                "kyverno",
                helm("kyverno", NAMESPACE, &KYVERNO, values),
            ))?
            .node(
                ResourceNode::helm_release(
                    "kyverno-policies",
                    helm("kyverno-policies", NAMESPACE, &KYVERNO_POLICIES, json!({})),
                )
                .depends_on("kyverno"),
            )?;

        builder.node_if(policy.enabled("kyverno.reporter"), || {
            let values = json!({
                "kyvernoPlugin": { "enabled": true },
                "global": { "plugins": { "kyverno": true } },
                "ui": { "enabled": true },
            });
            ResourceNode::helm_release(
                "policy-reporter",
                helm("policy-reporter", NAMESPACE, &POLICY_REPORTER, values),
            )
            .depends_on("kyverno")
        })?;

        // Repeated names collapse to one node
        let mut seen = BTreeSet::new();
        for name in policy.list("kyverno.tekton-policies") {
            if !seen.insert(name) {
                log::debug!("Skipping repeated tekton policy {name}");
                continue;
            }
            builder.node(
                ResourceNode::raw_manifest(
                    format!("kyverno-policy-{name}"),
                    source(&tekton_policy_url(name)),
                )
                .depends_on_all(["kyverno", "kyverno-policies"]),
            )?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compose(policy: &Policy) -> declarative::DependencyGraph {
        let mut builder = GraphBuilder::new();
        builder.component(&Kyverno, policy).unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn test_minimal_kyverno() {
        let graph = compose(&Policy::new());
        assert_eq!(
            graph.topological_order().unwrap(),
            vec!["kyverno", "kyverno-policies"]
        );
        let spec = &graph.get("kyverno").unwrap().spec;
        assert_eq!(spec["namespace"], "compliance");
        assert_eq!(spec["version"], "3.0.5");
    }

    #[test]
    fn test_repeated_policy_names_compose_once() {
        let policy = Policy::new().with_list("kyverno.tekton-policies", ["a", "b", "a"]);
        let graph = compose(&policy);
        assert_eq!(graph.len(), 4);
        assert!(graph.contains("kyverno-policy-a"));
        assert!(graph.contains("kyverno-policy-b"));
    }

    #[test]
    fn test_kyverno_values() {
        let graph = compose(&Policy::new().with_bool("kyverno.reporter", true));
        let filters = &graph.get("kyverno").unwrap().spec["values"]["config"]["resourceFilters"];
        let filters: Vec<&str> = filters
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f.as_str().unwrap())
            .collect();
        assert_eq!(filters.len(), 16);
        for expected in [
            "[SelfSubjectAccessReview,*,*]",
            "[*,kyverno,kyverno*]",
            "[*,capv-system,*]",
            "[*,capm3-system,*]",
        ] {
            assert!(filters.contains(&expected), "missing {expected}");
        }

        let reporter = &graph.get("policy-reporter").unwrap().spec["values"];
        assert_eq!(reporter["global"]["plugins"]["kyverno"], true);
        assert_eq!(reporter["ui"]["enabled"], true);
    }

    #[test]
    fn test_tekton_policy_url() {
        assert_eq!(
            tekton_policy_url("require-tekton-bundle"),
            "https://raw.githubusercontent.com/kyverno/policies/main/tekton/require-tekton-bundle/require-tekton-bundle.yaml"
        );
    }
}
