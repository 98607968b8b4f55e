//! Backstage developer portal

use super::{dns_annotations, helm, Chart};
use crate::config::BackstageConfig;
use declarative::{Component, GraphBuilder, Policy, ResourceNode};
use serde_json::{json, Value};

const NAMESPACE: &str = "backstage";

const BACKSTAGE: Chart<'static> = Chart {
    name: "backstage",
    repo: "https://backstage.github.io/charts",
    version: "1.3.0",
};

const COMMAND: [&str; 6] = [
    "node",
    "packages/backend",
    "--config",
    "app-config.yaml",
    "--config",
    "app-config.production.yaml",
];

/// Hostname published for the backend service: `portal.example.com` -> `portal-api.example.com`
fn api_host(host: &str) -> String {
    match host.split_once('.') {
        Some((label, domain)) => format!("{label}-api.{domain}"),
        None => format!("{host}-api"),
    }
}

pub struct Backstage<'a> {
    config: &'a BackstageConfig,
}

impl<'a> Backstage<'a> {
    pub fn new(config: &'a BackstageConfig) -> Self {
        Self { config }
    }

    /// Split `registry/repository[:tag]` into chart image values
    fn image(&self) -> Value {
        let image = self.config.image.as_str();
        let (reference, tag) = match image.rsplit_once(':') {
            Some((reference, tag)) if !tag.contains('/') => (reference, tag),
            _ => (image, "latest"),
        };
        let (registry, repository) = reference.split_once('/').unwrap_or(("docker.io", reference));
        json!({
            "registry": registry,
            "repository": repository,
            "tag": tag,
            "pullPolicy": "Always",
        })
    }

    fn values(&self) -> Value {
        let mut ingress = json!({ "enabled": self.config.host.is_some(), "className": "nginx" });
        if let Some(host) = &self.config.host {
            ingress["host"] = json!(host);
            ingress["annotations"] = dns_annotations(host);
        }

        let mut service = json!({ "type": "LoadBalancer" });
        if let Some(host) = &self.config.host {
            let mut annotations = dns_annotations(&api_host(host));
            annotations["nginx.ingress.kubernetes.io/ssl-redirect"] = json!("false");
            service["annotations"] = annotations;
        }

        json!({
            "backstage": {
                "image": self.image(),
                "command": COMMAND,
            },
            "ingress": ingress,
            "service": service,
        })
    }
}

impl Component for Backstage<'_> {
    fn name(&self) -> &str {
        "backstage"
    }

    fn compose(&self, policy: &Policy, builder: &mut GraphBuilder) -> declarative::Result<()> {
        builder.node_if(policy.enabled("backstage"), || {
            ResourceNode::helm_release(
                "backstage",
                helm("backstage", NAMESPACE, &BACKSTAGE, self.values()),
            )
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_of(image: &str) -> Value {
        let config = BackstageConfig {
            image: image.into(),
            ..BackstageConfig::default()
        };
        Backstage::new(&config).image()
    }

    #[test]
    fn test_image_split() {
        assert_eq!(
            image_of("ghcr.io/example/backstage:1.2"),
            json!({
                "registry": "ghcr.io",
                "repository": "example/backstage",
                "tag": "1.2",
                "pullPolicy": "Always",
            })
        );
        assert_eq!(
            image_of("backstage")["registry"],
            "docker.io"
        );
        assert_eq!(image_of("localhost:5000/portal")["tag"], "latest");
    }

    #[test]
    fn test_ingress_follows_host() {
        let mut config = BackstageConfig::default();
        assert_eq!(Backstage::new(&config).values()["ingress"]["enabled"], false);

        config.host = Some("backstage.example.com".into());
        let values = Backstage::new(&config).values();
        assert_eq!(values["ingress"]["host"], "backstage.example.com");
        assert_eq!(values["service"]["type"], "LoadBalancer");

        let annotations = &values["service"]["annotations"];
        assert_eq!(
            annotations["external-dns.alpha.kubernetes.io/hostname"],
            "backstage-api.example.com"
        );
        assert_eq!(annotations["nginx.ingress.kubernetes.io/ssl-redirect"], "false");
    }

    #[test]
    fn test_production_config_command() {
        let values = Backstage::new(&BackstageConfig::default()).values();
        let command = &values["backstage"]["command"];
        assert_eq!(command[0], "node");
        assert_eq!(command[5], "app-config.production.yaml");
        assert!(values["service"].get("annotations").is_none());
    }

    #[test]
    fn test_api_host() {
        assert_eq!(api_host("portal.example.com"), "portal-api.example.com");
        assert_eq!(api_host("portal"), "portal-api");
    }
}
