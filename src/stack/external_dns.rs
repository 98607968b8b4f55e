//! external-dns with its provider credentials

use super::{from_env, helm, namespace, Chart};
use crate::config::ExternalDnsConfig;
use declarative::{Component, GraphBuilder, Policy, ResourceNode};
use serde_json::{json, Value};

const NAMESPACE: &str = "external-dns";
const CREDENTIALS: &str = "external-dns-credentials";
const TOKEN_KEY: &str = "token";

const EXTERNAL_DNS: Chart<'static> = Chart {
    name: "external-dns",
    repo: "https://kubernetes-sigs.github.io/external-dns",
    version: "1.13.1",
};

pub struct ExternalDns<'a> {
    config: &'a ExternalDnsConfig,
}

impl<'a> ExternalDns<'a> {
    pub fn new(config: &'a ExternalDnsConfig) -> Self {
        Self { config }
    }

    fn values(&self) -> Value {
        json!({
            "provider": self.config.provider,
            "sources": ["ingress", "service"],
            "env": [{
                "name": self.config.token_env,
                "valueFrom": {
                    "secretKeyRef": { "name": CREDENTIALS, "key": TOKEN_KEY },
                },
            }],
        })
    }
}

impl Component for ExternalDns<'_> {
    fn name(&self) -> &str {
        "external-dns"
    }

    fn compose(&self, policy: &Policy, builder: &mut GraphBuilder) -> declarative::Result<()> {
        if !policy.enabled("external-dns") {
            return Ok(());
        }

        let secret = json!({
            "name": CREDENTIALS,
            "namespace": NAMESPACE,
            "type": "Opaque",
            "stringData": { TOKEN_KEY: from_env(&self.config.token_env) },
        });

        builder
            .node(ResourceNode::namespace("external-dns-namespace", namespace(NAMESPACE)))?
            .node(ResourceNode::secret(CREDENTIALS, secret).depends_on("external-dns-namespace"))?
            .node(
                ResourceNode::helm_release(
                    "external-dns",
                    helm("external-dns", NAMESPACE, &EXTERNAL_DNS, self.values()),
                )
                .depends_on(CREDENTIALS),
            )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_reads_token_from_secret() {
        let config = ExternalDnsConfig::default();
        let values = ExternalDns::new(&config).values();
        assert_eq!(values["provider"], "digitalocean");
        assert_eq!(values["env"][0]["name"], "DO_TOKEN");
        assert_eq!(
            values["env"][0]["valueFrom"]["secretKeyRef"]["name"],
            CREDENTIALS
        );
    }

    #[test]
    fn test_secret_resolves_from_env() {
        let config = ExternalDnsConfig::default();
        let mut builder = GraphBuilder::new();
        builder
            .component(
                &ExternalDns::new(&config),
                &Policy::new().with_bool("external-dns", true),
            )
            .unwrap();
        let graph = builder.build().unwrap();
        let secret = &graph.get(CREDENTIALS).unwrap().spec;
        assert_eq!(secret["stringData"]["token"]["fromEnv"], "DO_TOKEN");
    }
}
