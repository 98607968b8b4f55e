//! Argo CD and the optional app-of-apps Application

use super::{helm, manifest, Chart};
use crate::config::ArgoCdConfig;
use declarative::{Component, GraphBuilder, Policy, ResourceNode};
use serde_json::{json, Value};

const NAMESPACE: &str = "argocd";

const ARGO_CD: Chart<'static> = Chart {
    name: "argo-cd",
    repo: "https://argoproj.github.io/argo-helm",
    version: "5.46.6",
};

pub struct ArgoCd<'a> {
    config: &'a ArgoCdConfig,
}

impl<'a> ArgoCd<'a> {
    pub fn new(config: &'a ArgoCdConfig) -> Self {
        Self { config }
    }

    fn values() -> Value {
        json!({
            "configs": {
                "params": {
                    "server.insecure": true,
                    "server.basehref": "/argocd",
                    "server.rootpath": "/argocd",
                },
            },
            "server": {
                "ingress": {
                    "enabled": true,
                    "ingressClassName": "nginx",
                    "paths": ["/argocd(/|$)(.*)"],
                },
            },
        })
    }

    fn app_of_apps(&self) -> Option<Value> {
        let repo = self.config.initial_repository.as_ref()?;
        Some(manifest(json!({
            "apiVersion": "argoproj.io/v1alpha1",
            "kind": "Application",
            "metadata": { "name": "app-of-apps", "namespace": NAMESPACE },
            "spec": {
                "project": "default",
                "destination": { "name": "in-cluster", "namespace": "default" },
                "source": {
                    "repoURL": repo.url,
                    "targetRevision": repo.branch,
                    "path": repo.path,
                },
                "syncPolicy": {
                    "automated": { "prune": true, "selfHeal": true },
                    "syncOptions": ["ServerSideApply=true"],
                },
            },
        })))
    }
}

impl Component for ArgoCd<'_> {
    fn name(&self) -> &str {
        "argocd"
    }

    fn compose(&self, policy: &Policy, builder: &mut GraphBuilder) -> declarative::Result<()> {
        if !policy.enabled("argocd") {
            return Ok(());
        }

        builder.node(ResourceNode::helm_release(
            "argocd",
            helm("argocd", NAMESPACE, &ARGO_CD, Self::values()),
        ))?;

        if policy.enabled("argocd.app-of-apps") {
            if let Some(app) = self.app_of_apps() {
                builder.node(ResourceNode::custom_resource("app-of-apps", app).depends_on("argocd"))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RepositoryConfig;

    #[test]
    fn test_app_of_apps_needs_repository() {
        let mut config = ArgoCdConfig::default();
        assert!(ArgoCd::new(&config).app_of_apps().is_none());

        config.initial_repository = Some(RepositoryConfig {
            url: "https://github.com/example/apps".into(),
            branch: "develop".into(),
            path: "apps".into(),
        });
        let app = ArgoCd::new(&config).app_of_apps().unwrap();
        let source = &app["manifest"]["spec"]["source"];
        assert_eq!(source["targetRevision"], "develop");
        assert_eq!(
            app["manifest"]["spec"]["syncPolicy"]["syncOptions"][0],
            "ServerSideApply=true"
        );
        assert_eq!(app["manifest"]["metadata"]["namespace"], "argocd");
        assert_eq!(app["manifest"]["spec"]["destination"]["namespace"], "default");
    }

    #[test]
    fn test_server_served_under_prefix() {
        let values = ArgoCd::values();
        assert_eq!(values["server"]["ingress"]["paths"][0], "/argocd(/|$)(.*)");
        assert_eq!(values["configs"]["params"]["server.rootpath"], "/argocd");
    }

    #[test]
    fn test_disabled_policy_adds_nothing() {
        let config = ArgoCdConfig::default();
        let mut builder = GraphBuilder::new();
        builder
            .component(&ArgoCd::new(&config), &Policy::new().with_bool("argocd", false))
            .unwrap();
        assert!(builder.build().unwrap().is_empty());
    }
}
