use super::kube::KubeOrchestrator;
use declarative::{ConvergenceSignal, Orchestrator, ResourceNode};
use std::sync::Mutex;
use std::time::Duration;

/// Renders every command without running it
///
/// Secret values are checked for presence but never printed.
pub struct DryRunOrchestrator {
    kube: KubeOrchestrator,
    rendered: Mutex<Vec<String>>,
}

impl DryRunOrchestrator {
    pub fn new(kube: KubeOrchestrator) -> Self {
        let kube = kube.with_lookup(|var| std::env::var_os(var).map(|_| "********".to_string()));
        Self {
            kube,
            rendered: Mutex::new(Vec::new()),
        }
    }

    /// Commands rendered so far, in submission order
    pub fn rendered(&self) -> Vec<String> {
        self.rendered.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl Orchestrator for DryRunOrchestrator {
    fn submit(&self, node: &ResourceNode, wait: Duration) -> ConvergenceSignal {
        match self.kube.invocation(node, wait) {
            Ok(invocation) => {
                let command = invocation.to_string();
                log::info!("[dry-run] {}: {command}", node.label());
                if let Ok(mut rendered) = self.rendered.lock() {
                    rendered.push(command);
                }
                ConvergenceSignal::AlreadyConverged
            }
            Err(e) => ConvergenceSignal::failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StackConfig;
    use crate::stack;
    use declarative::{DriveOptions, Driver, NodeState};
    use std::sync::Arc;

    #[test]
    fn test_dry_run_renders_in_order() {
        let mut config = StackConfig::default();
        config.argocd.enabled = false;
        config.kubevela.enabled = false;
        config.backstage.enabled = false;
        // PATH is always set, so both secrets resolve
        config.tekton.git_credentials_env = "PATH".into();
        config.tekton.ghcr_auth_env = "PATH".into();
        let graph = stack::build(&config).unwrap();

        let dry_run = Arc::new(DryRunOrchestrator::new(KubeOrchestrator::from_config(&config)));
        let driver = Driver::new(dry_run.clone()).with_options(DriveOptions {
            jobs: 1,
            timeout: Duration::from_secs(30),
        });
        let result = driver.apply(&graph).unwrap();
        assert!(result.is_success());

        let rendered = dry_run.rendered();
        assert_eq!(rendered.len(), graph.len());
        assert!(rendered[0].starts_with("helm upgrade --install ingress-nginx"));
        assert_eq!(rendered[1], "kubectl apply -f ./tekton/release.yaml");
    }

    #[test]
    fn test_missing_secret_env_fails_node() {
        let mut config = StackConfig::default();
        config.tekton.git_credentials_env = "ROLLOUT_TEST_SURELY_UNSET".into();
        config.tekton.ghcr_auth_env = "PATH".into();
        let graph = stack::build(&config).unwrap();

        let dry_run = Arc::new(DryRunOrchestrator::new(KubeOrchestrator::from_config(&config)));
        let result = Driver::new(dry_run).apply(&graph).unwrap();

        assert_eq!(result.state("basic-auth"), Some(NodeState::Failed));
        assert_eq!(result.state("build-service-account"), Some(NodeState::Failed));
        assert_eq!(result.state("ghcr-auth"), Some(NodeState::Ready));
        assert_eq!(result.state("kyverno"), Some(NodeState::Failed));
        assert_eq!(result.state("ingress-nginx"), Some(NodeState::Ready));
    }
}
