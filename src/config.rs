//! Stack configuration - which add-ons to install and their parameters
//!
//! The config is read once per invocation. Inclusion decisions are turned
//! into a [`Policy`]; everything else stays as plain parameters for the
//! stack components.

use anyhow::{Context, Result};
use declarative::Policy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name looked up in the working directory
pub const LOCAL_CONFIG: &str = "rollout.toml";

/// Get the user config directory (~/.config/rollout)
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("rollout"))
}

/// Resolve which config file to use
///
/// An explicit path must exist. Otherwise `./rollout.toml` wins over
/// `~/.config/rollout/config.toml`; `None` means built-in defaults.
pub fn resolve_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        let expanded = expand(path);
        anyhow::ensure!(
            expanded.exists(),
            "Config file not found: {}",
            expanded.display()
        );
        return Ok(Some(expanded));
    }

    let local = PathBuf::from(LOCAL_CONFIG);
    if local.exists() {
        return Ok(Some(local));
    }

    let user = config_dir()?.join("config.toml");
    Ok(user.exists().then_some(user))
}

fn expand(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&raw).as_ref())
}

// ============================================================================
// Schema
// ============================================================================

/// Where the cluster runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    /// Local cluster (kind, minikube...): also installs an ingress controller
    #[default]
    Local,
    /// Remote cluster reached through a kubeconfig
    Remote,
}

impl Target {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

/// The full stack configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StackConfig {
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub apply: ApplyConfig,
    #[serde(default)]
    pub tekton: TektonConfig,
    #[serde(default)]
    pub kyverno: KyvernoConfig,
    #[serde(default)]
    pub argocd: ArgoCdConfig,
    #[serde(default)]
    pub kubevela: KubeVelaConfig,
    #[serde(default)]
    pub backstage: BackstageConfig,
    #[serde(default)]
    pub external_dns: ExternalDnsConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterConfig {
    #[serde(default)]
    pub target: Target,
    /// Kubeconfig for remote clusters (supports ~)
    #[serde(default)]
    pub kubeconfig: Option<String>,
    /// Kube context to use instead of the current one
    #[serde(default)]
    pub context: Option<String>,
    /// Apply manifests with server-side apply
    #[serde(default)]
    pub server_side: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyConfig {
    #[serde(default = "default_jobs")]
    pub jobs: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_jobs() -> usize {
    4
}

fn default_timeout_secs() -> u64 {
    300
}

impl Default for ApplyConfig {
    fn default() -> Self {
        Self {
            jobs: default_jobs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ApplyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TektonConfig {
    /// Operator release manifest (file path or URL)
    #[serde(default = "default_tekton_manifest")]
    pub operator_manifest: String,
    #[serde(default = "default_build_namespace")]
    pub build_namespace: String,
    #[serde(default = "default_service_account")]
    pub service_account: String,
    /// Hostname for the dashboard ingress
    #[serde(default)]
    pub dashboard_host: Option<String>,
    /// Environment variable holding `user:token` for github.com
    #[serde(default = "default_git_credentials_env")]
    pub git_credentials_env: String,
    /// Environment variable holding the ghcr.io auth string
    #[serde(default = "default_ghcr_auth_env")]
    pub ghcr_auth_env: String,
}

fn default_tekton_manifest() -> String {
    "./tekton/release.yaml".to_string()
}

fn default_build_namespace() -> String {
    "build".to_string()
}

fn default_service_account() -> String {
    "build-sa".to_string()
}

fn default_git_credentials_env() -> String {
    "GIT_CREDENTIALS".to_string()
}

fn default_ghcr_auth_env() -> String {
    "GHCR_AUTH".to_string()
}

impl Default for TektonConfig {
    fn default() -> Self {
        Self {
            operator_manifest: default_tekton_manifest(),
            build_namespace: default_build_namespace(),
            service_account: default_service_account(),
            dashboard_host: None,
            git_credentials_env: default_git_credentials_env(),
            ghcr_auth_env: default_ghcr_auth_env(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KyvernoConfig {
    /// Install the policy reporter UI
    #[serde(default)]
    pub reporter: bool,
    /// Tekton policies from the upstream kyverno/policies repository
    #[serde(default)]
    pub tekton_policies: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgoCdConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Repository synced by an app-of-apps Application
    #[serde(default)]
    pub initial_repository: Option<RepositoryConfig>,
}

impl Default for ArgoCdConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_repository: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub url: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default = "default_repo_path")]
    pub path: String,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_repo_path() -> String {
    ".".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubeVelaConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// VelaUX addon manifest
    #[serde(default = "default_velaux_manifest")]
    pub velaux_manifest: String,
    /// Hostname annotated on the VelaUX ingress
    #[serde(default)]
    pub host: Option<String>,
}

fn default_velaux_manifest() -> String {
    ".velaux/addon-manifest.yaml".to_string()
}

impl Default for KubeVelaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            velaux_manifest: default_velaux_manifest(),
            host: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackstageConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Prebuilt portal image, e.g. `ghcr.io/org/backstage:1.0`
    #[serde(default = "default_backstage_image")]
    pub image: String,
    #[serde(default)]
    pub host: Option<String>,
}

fn default_backstage_image() -> String {
    "docker.io/backstage/backstage:latest".to_string()
}

impl Default for BackstageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            image: default_backstage_image(),
            host: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalDnsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_dns_provider")]
    pub provider: String,
    /// Environment variable holding the DNS provider API token
    #[serde(default = "default_dns_token_env")]
    pub token_env: String,
}

fn default_dns_provider() -> String {
    "digitalocean".to_string()
}

fn default_dns_token_env() -> String {
    "DO_TOKEN".to_string()
}

impl Default for ExternalDnsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_dns_provider(),
            token_env: default_dns_token_env(),
        }
    }
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Loading and Validation
// ============================================================================

impl StackConfig {
    /// Load the config from a resolved path, or defaults when there is none
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            log::debug!("No config file found, using defaults");
            return Ok(Self::default());
        };

        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate TOML content
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Invalid TOML format")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.apply.jobs > 0, "apply.jobs must be at least 1");
        anyhow::ensure!(
            self.apply.timeout_secs > 0,
            "apply.timeout_secs must be at least 1"
        );

        if self.cluster.target == Target::Remote {
            anyhow::ensure!(
                self.cluster.kubeconfig.is_some() || self.cluster.context.is_some(),
                "cluster.target = \"remote\" needs cluster.kubeconfig or cluster.context"
            );
        }

        let mut seen = HashSet::new();
        for policy in &self.kyverno.tekton_policies {
            anyhow::ensure!(
                is_dns_label(policy),
                "Invalid kyverno tekton policy name '{policy}': expected lowercase letters, digits and '-'"
            );
            anyhow::ensure!(
                seen.insert(policy.as_str()),
                "Kyverno tekton policy '{policy}' is listed more than once"
            );
        }

        if let Some(repo) = &self.argocd.initial_repository {
            anyhow::ensure!(
                !repo.url.trim().is_empty(),
                "argocd.initial_repository.url must not be empty"
            );
        }

        anyhow::ensure!(
            is_dns_label(&self.tekton.build_namespace),
            "Invalid tekton.build_namespace '{}'",
            self.tekton.build_namespace
        );

        Ok(())
    }

    /// Inclusion flags for graph composition
    pub fn policy(&self) -> Policy {
        Policy::new()
            .with_choice("target", self.cluster.target.as_str())
            .with_bool("kyverno.reporter", self.kyverno.reporter)
            .with_list("kyverno.tekton-policies", self.kyverno.tekton_policies.clone())
            .with_bool("argocd", self.argocd.enabled)
            .with_bool(
                "argocd.app-of-apps",
                self.argocd.enabled && self.argocd.initial_repository.is_some(),
            )
            .with_bool("kubevela", self.kubevela.enabled)
            .with_bool("backstage", self.backstage.enabled)
            .with_bool("external-dns", self.external_dns.enabled)
    }

    /// Expanded kubeconfig path, if any
    pub fn kubeconfig(&self) -> Option<PathBuf> {
        self.cluster
            .kubeconfig
            .as_deref()
            .map(|path| expand(Path::new(path)))
    }
}

/// Check a Kubernetes DNS label (RFC 1123)
fn is_dns_label(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 63
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !name.starts_with('-')
        && !name.ends_with('-')
}
