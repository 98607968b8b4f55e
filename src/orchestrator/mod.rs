//! Orchestrators that converge resource nodes against a cluster

mod dry_run;
mod kube;

pub use dry_run::DryRunOrchestrator;
pub use kube::KubeOrchestrator;
