//! Tekton pipelines: operator, its config, and the build namespace wiring

use super::{
    dns_annotations, from_env_json_template, from_env_template, manifest, namespace, patch, source,
};
use crate::config::TektonConfig;
use declarative::{Component, GraphBuilder, Policy, ResourceNode};
use serde_json::{json, Map, Value};

pub struct Tekton<'a> {
    config: &'a TektonConfig,
}

impl<'a> Tekton<'a> {
    pub fn new(config: &'a TektonConfig) -> Self {
        Self { config }
    }

    fn tekton_config(&self) -> Value {
        patch(json!({
            "apiVersion": "operator.tekton.dev/v1alpha1",
            "kind": "TektonConfig",
            "metadata": { "name": "config" },
            "spec": {
                "profile": "all",
                "targetNamespace": "tekton-pipelines",
                "pruner": {
                    "resources": ["pipelinerun", "taskrun"],
                    "keep": 100,
                    "schedule": "0 8 * * *",
                },
                "pipeline": {
                    "enable-tekton-oci-bundles": true,
                    "enable-api-fields": "alpha",
                },
            },
        }))
    }

    fn basic_auth(&self) -> Value {
        let credentials_env = &self.config.git_credentials_env;
        json!({
            "name": "basic-auth",
            "namespace": self.config.build_namespace,
            "type": "Opaque",
            "stringData": {
                ".gitconfig": "[credential \"https://github.com\"]\n  helper = store\n",
                ".git-credentials": from_env_template(credentials_env, "https://{}@github.com\n"),
            },
        })
    }

    fn ghcr_auth(&self) -> Value {
        let auth_env = &self.config.ghcr_auth_env;
        json!({
            "name": "ghcr-auth",
            "namespace": self.config.build_namespace,
            "type": "Opaque",
            "stringData": {
                "config.json": from_env_json_template(
                    auth_env,
                    "{\"auths\":{\"ghcr.io\":{\"auth\":\"{}\"}}}",
                ),
            },
            "annotations": { "tekton.dev/docker-0": "https://ghcr.io" },
        })
    }

    fn service_account(&self) -> Value {
        manifest(json!({
            "apiVersion": "v1",
            "kind": "ServiceAccount",
            "metadata": {
                "name": self.config.service_account,
                "namespace": self.config.build_namespace,
            },
            "secrets": [{ "name": "basic-auth" }, { "name": "ghcr-auth" }],
        }))
    }

    fn role_binding(&self) -> Value {
        manifest(json!({
            "apiVersion": "rbac.authorization.k8s.io/v1",
            "kind": "ClusterRoleBinding",
            "metadata": { "name": format!("{}-cluster-admin", self.config.service_account) },
            "roleRef": {
                "apiGroup": "rbac.authorization.k8s.io",
                "kind": "ClusterRole",
                "name": "cluster-admin",
            },
            "subjects": [{
                "kind": "ServiceAccount",
                "name": self.config.service_account,
                "namespace": self.config.build_namespace,
            }],
        }))
    }

    fn dashboard_ingress(&self) -> Value {
        let mut annotations = Map::new();
        annotations.insert("nginx.ingress.kubernetes.io/ssl-redirect".into(), json!("false"));
        if let Some(host) = &self.config.dashboard_host {
            if let Value::Object(dns) = dns_annotations(host) {
                annotations.extend(dns);
            }
        }

        let mut rule = json!({
            "http": {
                "paths": [{
                    "path": "/",
                    "pathType": "Prefix",
                    "backend": {
                        "service": { "name": "tekton-dashboard", "port": { "number": 9097 } },
                    },
                }],
            },
        });
        if let Some(host) = &self.config.dashboard_host {
            rule["host"] = json!(host);
        }

        manifest(json!({
            "apiVersion": "networking.k8s.io/v1",
            "kind": "Ingress",
            "metadata": {
                "name": "tekton-dashboard",
                "namespace": "tekton-pipelines",
                "annotations": annotations,
            },
            "spec": {
                "ingressClassName": "nginx",
                "rules": [rule],
            },
        }))
    }
}

impl Component for Tekton<'_> {
    fn name(&self) -> &str {
        "tekton"
    }

    fn compose(&self, _policy: &Policy, builder: &mut GraphBuilder) -> declarative::Result<()> {
        builder
            .node(ResourceNode::raw_manifest(
                "tekton-operator",
                source(&self.config.operator_manifest),
            ))?
            .node(
                ResourceNode::custom_resource("tekton-config", self.tekton_config())
                    .depends_on("tekton-operator"),
            )?
            .node(
                ResourceNode::namespace("build-namespace", namespace(&self.config.build_namespace))
                    .depends_on("tekton-config"),
            )?
            .node(ResourceNode::secret("basic-auth", self.basic_auth()).depends_on("build-namespace"))?
            .node(ResourceNode::secret("ghcr-auth", self.ghcr_auth()).depends_on("build-namespace"))?
            .node(
                ResourceNode::object("build-service-account", self.service_account())
                    .depends_on_all(["basic-auth", "ghcr-auth"]),
            )?
            .node(
                ResourceNode::object("build-cluster-admin", self.role_binding())
                    .depends_on("build-service-account"),
            )?
            .node(
                ResourceNode::object("tekton-dashboard-ingress", self.dashboard_ingress())
                    .depends_on("tekton-config"),
            )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tekton_chain() {
        let config = TektonConfig::default();
        let mut builder = GraphBuilder::new();
        builder.component(&Tekton::new(&config), &Policy::new()).unwrap();
        let graph = builder.build().unwrap();

        assert_eq!(
            graph.topological_order().unwrap(),
            vec![
                "tekton-operator",
                "tekton-config",
                "build-namespace",
                "basic-auth",
                "ghcr-auth",
                "build-service-account",
                "build-cluster-admin",
                "tekton-dashboard-ingress",
            ]
        );
    }

    #[test]
    fn test_git_credentials_are_templated() {
        let config = TektonConfig::default();
        let spec = Tekton::new(&config).basic_auth();
        let creds = &spec["stringData"][".git-credentials"];
        assert_eq!(creds["fromEnv"], "GIT_CREDENTIALS");
        assert_eq!(spec["namespace"], "build");
    }

    #[test]
    fn test_ghcr_auth_escapes_as_json() {
        let config = TektonConfig::default();
        let spec = Tekton::new(&config).ghcr_auth();
        let auth = &spec["stringData"]["config.json"];
        assert_eq!(auth["fromEnv"], "GHCR_AUTH");
        assert_eq!(auth["escape"], "json");
    }

    #[test]
    fn test_dashboard_host_adds_dns_annotations() {
        let mut config = TektonConfig::default();
        let spec = Tekton::new(&config).dashboard_ingress();
        let annotations = spec["manifest"]["metadata"]["annotations"].as_object().unwrap();
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations["nginx.ingress.kubernetes.io/ssl-redirect"], "false");

        config.dashboard_host = Some("tekton.example.com".into());
        let spec = Tekton::new(&config).dashboard_ingress();
        let manifest = &spec["manifest"];
        assert_eq!(manifest["spec"]["rules"][0]["host"], "tekton.example.com");
        assert_eq!(
            manifest["metadata"]["annotations"]["external-dns.alpha.kubernetes.io/hostname"],
            "tekton.example.com"
        );
    }
}
