//! The add-on stack - components composed into one resource graph
//!
//! Each add-on is a [`Component`] that reads its parameters from the
//! [`StackConfig`] and its inclusion flags from the [`Policy`]. Cross-add-on
//! ordering is declared here, in one place.

mod argocd;
mod backstage;
mod external_dns;
mod ingress;
mod kubevela;
mod kyverno;
mod tekton;

use crate::config::StackConfig;
use declarative::{Component, DependencyGraph, GraphBuilder, Policy};
use serde_json::{json, Value};

pub use argocd::ArgoCd;
pub use backstage::Backstage;
pub use external_dns::ExternalDns;
pub use ingress::IngressController;
pub use kubevela::KubeVela;
pub use kyverno::Kyverno;
pub use tekton::Tekton;

/// Compose the whole stack for a config
pub fn build(config: &StackConfig) -> declarative::Result<DependencyGraph> {
    compose(config, &config.policy())
}

/// Compose the stack with an explicit policy
pub fn compose(config: &StackConfig, policy: &Policy) -> declarative::Result<DependencyGraph> {
    let ingress = IngressController;
    let tekton = Tekton::new(&config.tekton);
    let kyverno = Kyverno;
    let argocd = ArgoCd::new(&config.argocd);
    let kubevela = KubeVela::new(&config.kubevela);
    let backstage = Backstage::new(&config.backstage);
    let external_dns = ExternalDns::new(&config.external_dns);

    let components: [&dyn Component; 7] = [
        &ingress,
        &tekton,
        &kyverno,
        &argocd,
        &kubevela,
        &backstage,
        &external_dns,
    ];

    let mut builder = GraphBuilder::new();
    for component in components {
        builder.component(component, policy)?;
    }

    // Admission control goes in only after the whole tekton component
    builder.component_depends_on("kyverno", "tekton")?;
    builder.build()
}

// ============================================================================
// Spec Helpers
// ============================================================================

/// Chart coordinates for a helm release
pub struct Chart<'a> {
    pub name: &'a str,
    pub repo: &'a str,
    pub version: &'a str,
}

/// Spec for a helm release node
pub fn helm(release: &str, namespace: &str, chart: &Chart<'_>, values: Value) -> Value {
    json!({
        "release": release,
        "chart": chart.name,
        "repo": chart.repo,
        "version": chart.version,
        "namespace": namespace,
        "createNamespace": true,
        "values": values,
    })
}

/// Spec for a namespace node
pub fn namespace(name: &str) -> Value {
    json!({ "name": name })
}

/// Spec for an object applied whole
pub fn manifest(object: Value) -> Value {
    json!({ "manifest": object })
}

/// Spec for a merge patch against an existing object
pub fn patch(object: Value) -> Value {
    json!({ "manifest": object, "patch": true })
}

/// Spec for a manifest file or URL applied as-is
pub fn source(location: &str) -> Value {
    json!({ "source": location })
}

/// A secret value read from the environment at submission time
pub fn from_env(var: &str) -> Value {
    json!({ "fromEnv": var })
}

/// A secret value read from the environment and substituted into `template` at `{}`
pub fn from_env_template(var: &str, template: &str) -> Value {
    json!({ "fromEnv": var, "template": template })
}

/// Like [`from_env_template`], with the value escaped for a JSON string literal
pub fn from_env_json_template(var: &str, template: &str) -> Value {
    json!({ "fromEnv": var, "template": template, "escape": "json" })
}

/// Annotations that let external-dns publish an ingress host
pub fn dns_annotations(host: &str) -> Value {
    json!({
        "external-dns.alpha.kubernetes.io/hostname": host,
        "external-dns.alpha.kubernetes.io/ttl": "60",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RepositoryConfig, Target};

    const BOOL_FLAGS: [&str; 6] = [
        "kyverno.reporter",
        "argocd",
        "argocd.app-of-apps",
        "kubevela",
        "backstage",
        "external-dns",
    ];

    fn policy_lists() -> Vec<Vec<&'static str>> {
        vec![
            Vec::new(),
            vec!["require-tekton-bundle"],
            vec!["require-tekton-namespace-pipelinerun", "require-tekton-bundle"],
            vec!["require-tekton-bundle", "require-tekton-bundle"],
        ]
    }

    /// Every target, every on/off assignment of the boolean flags, and each policy list
    fn all_policies() -> Vec<Policy> {
        let mut policies = Vec::new();
        for target in ["local", "remote"] {
            for bits in 0u32..(1 << BOOL_FLAGS.len()) {
                for list in policy_lists() {
                    let mut policy = Policy::new()
                        .with_choice("target", target)
                        .with_list("kyverno.tekton-policies", list);
                    for (n, name) in BOOL_FLAGS.iter().enumerate() {
                        policy = policy.with_bool(*name, (bits & (1 << n)) != 0);
                    }
                    policies.push(policy);
                }
            }
        }
        policies
    }

    fn config_with_repo() -> StackConfig {
        let mut config = StackConfig::default();
        config.argocd.initial_repository = Some(RepositoryConfig {
            url: "https://github.com/example/apps".into(),
            branch: "main".into(),
            path: "clusters/dev".into(),
        });
        config.tekton.dashboard_host = Some("tekton.example.com".into());
        config
    }

    #[test]
    fn test_every_flag_combination_validates() {
        let config = config_with_repo();
        let policies = all_policies();
        assert_eq!(policies.len(), 2 * 64 * 4);
        for policy in policies {
            let graph = compose(&config, &policy).unwrap();
            let order = graph.topological_order().unwrap();
            assert_eq!(order.len(), graph.len());
        }
    }

    #[test]
    fn test_flags_toggle_their_nodes_independently() {
        let config = config_with_repo();
        let base = || Policy::new().with_choice("target", "remote");

        let graph = compose(&config, &base().with_bool("argocd.app-of-apps", true)).unwrap();
        assert!(!graph.contains("argocd"));
        assert!(!graph.contains("app-of-apps"));

        let graph = compose(
            &config,
            &base().with_bool("argocd", true).with_bool("argocd.app-of-apps", true),
        )
        .unwrap();
        assert!(graph.contains("app-of-apps"));

        let graph = compose(&config, &base().with_bool("external-dns", true)).unwrap();
        assert!(graph.contains("external-dns"));
        assert!(!graph.contains("backstage"));
    }

    #[test]
    fn test_build_is_pure() {
        let config = config_with_repo();
        let a = build(&config).unwrap();
        let b = build(&config).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.topological_order().unwrap(), b.topological_order().unwrap());
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_reporter_excluded_unless_enabled() {
        let mut config = StackConfig::default();
        assert!(!build(&config).unwrap().contains("policy-reporter"));

        config.kyverno.reporter = true;
        let graph = build(&config).unwrap();
        assert!(graph.contains("policy-reporter"));
        assert_eq!(graph.dependencies("policy-reporter"), vec!["kyverno"]);
    }

    #[test]
    fn test_kyverno_ordered_after_tekton() {
        let graph = build(&StackConfig::default()).unwrap();
        let order = graph.topological_order().unwrap();
        let pos = |id: &str| order.iter().position(|n| n == id).unwrap();

        for tekton_node in ["tekton-operator", "tekton-config", "build-namespace"] {
            assert!(pos(tekton_node) < pos("kyverno"), "{tekton_node} after kyverno");
        }
    }

    #[test]
    fn test_tekton_policies_depend_on_kyverno_releases() {
        let mut config = StackConfig::default();
        config.kyverno.tekton_policies = vec!["require-tekton-namespace-pipelinerun".into()];
        let graph = build(&config).unwrap();

        let id = "kyverno-policy-require-tekton-namespace-pipelinerun";
        assert_eq!(graph.dependencies(id), vec!["kyverno", "kyverno-policies"]);
        let spec = &graph.get(id).unwrap().spec;
        assert!(spec["source"].as_str().unwrap().ends_with(
            "tekton/require-tekton-namespace-pipelinerun/require-tekton-namespace-pipelinerun.yaml"
        ));
    }

    #[test]
    fn test_external_dns_release_depends_on_its_secret() {
        let mut config = StackConfig::default();
        config.external_dns.enabled = true;
        let graph = build(&config).unwrap();

        assert_eq!(graph.dependencies("external-dns"), vec!["external-dns-credentials"]);
        assert_eq!(
            graph.dependencies("external-dns-credentials"),
            vec!["external-dns-namespace"]
        );
    }

    #[test]
    fn test_ingress_controller_only_on_local_target() {
        let mut config = StackConfig::default();
        assert!(build(&config).unwrap().contains("ingress-nginx"));

        config.cluster.target = Target::Remote;
        config.cluster.context = Some("eks".into());
        assert!(!build(&config).unwrap().contains("ingress-nginx"));
    }

    #[test]
    fn test_app_of_apps_follows_repository() {
        assert!(!build(&StackConfig::default()).unwrap().contains("app-of-apps"));

        let graph = build(&config_with_repo()).unwrap();
        assert_eq!(graph.dependencies("app-of-apps"), vec!["argocd"]);
        let app = &graph.get("app-of-apps").unwrap().spec["manifest"];
        assert_eq!(app["spec"]["source"]["path"], "clusters/dev");
    }

    #[test]
    fn test_disabled_addons_are_absent() {
        let mut config = StackConfig::default();
        config.argocd.enabled = false;
        config.kubevela.enabled = false;
        config.backstage.enabled = false;
        let graph = build(&config).unwrap();

        for id in ["argocd", "kubevela", "velaux", "backstage"] {
            assert!(!graph.contains(id), "{id} should be absent");
        }
        assert!(graph.contains("kyverno"));
        assert!(graph.contains("tekton-operator"));
    }

    #[test]
    fn test_from_env_template() {
        let value = from_env_template("GIT_CREDENTIALS", "https://{}@github.com\n");
        assert_eq!(value["fromEnv"], "GIT_CREDENTIALS");
        assert_eq!(value["template"], "https://{}@github.com\n");
    }
}
