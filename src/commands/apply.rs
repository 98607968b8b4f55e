//! `rollout apply` - converge the composed stack
//!
//! Ctrl+C cancels the pass: submissions already in flight finish, nothing
//! new is submitted, and the partial result is still recorded.

use anyhow::Result;
use colored::Colorize;
use declarative::{ApplySummary, CancelToken, DriveOptions, Driver, Orchestrator};
use std::sync::Arc;
use std::time::Duration;

use crate::Context;
use crate::cli::ApplyArgs;
use crate::orchestrator::{DryRunOrchestrator, KubeOrchestrator};
use crate::progress::ApplyProgress;
use crate::runner;
use crate::state::ApplyRecord;
use crate::ui;

const REQUIRED_TOOLS: [&str; 2] = ["kubectl", "helm"];

pub fn run(ctx: &Context, args: ApplyArgs) -> Result<()> {
    let (_, config) = super::load_config(ctx)?;
    let graph = super::compose(&config)?;

    let options = DriveOptions {
        jobs: args.jobs.unwrap_or(config.apply.jobs),
        timeout: args
            .timeout
            .map_or_else(|| config.apply.timeout(), Duration::from_secs),
    };
    anyhow::ensure!(options.jobs > 0, "--jobs must be at least 1");
    anyhow::ensure!(!options.timeout.is_zero(), "--timeout must be at least 1");

    ui::header(if args.dry_run { "Apply (dry run)" } else { "Apply" });
    ui::kv("Target", config.cluster.target.as_str());
    ui::kv("Resources", &graph.len().to_string());
    ui::kv("Jobs", &options.jobs.to_string());
    ui::kv("Timeout", &format!("{}s per resource", options.timeout.as_secs()));

    if !args.dry_run {
        for tool in REQUIRED_TOOLS {
            anyhow::ensure!(runner::command_exists(tool), "{tool} not found in PATH");
        }
        if let Some(context) = current_context(&config) {
            ui::kv("Context", &context);
        }
    }

    if !args.yes && !args.dry_run && !confirm_proceed()? {
        println!();
        println!("  {} Aborted", "✗".red());
        return Ok(());
    }

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_token.cancel()) {
        log::warn!("Could not install Ctrl+C handler: {e}");
    }

    let kube = KubeOrchestrator::from_config(&config);
    let orchestrator: Arc<dyn Orchestrator> = if args.dry_run {
        Arc::new(DryRunOrchestrator::new(kube))
    } else {
        Arc::new(kube)
    };

    let driver = Driver::new(orchestrator)
        .with_options(options)
        .with_cancel_token(cancel.clone());

    println!();
    let mut progress = ApplyProgress::new(ctx.quiet);
    let result = driver.apply_with_progress(&graph, &mut progress)?;

    let record = ApplyRecord::new(config.cluster.target.as_str(), args.dry_run, result);
    if let Err(e) = record.save() {
        ui::warn(&format!("Could not record apply state: {e:#}"));
    }

    print_summary(&record.summary, cancel.is_cancelled());

    if !record.summary.is_success() {
        anyhow::bail!(
            "{} of {} resources did not converge",
            record.summary.failed + record.summary.pending,
            record.summary.total()
        );
    }
    Ok(())
}

/// Confirm with user
fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt("Apply to the cluster?")
        .default(true)
        .interact()?;

    Ok(confirmed)
}

fn current_context(config: &crate::config::StackConfig) -> Option<String> {
    if let Some(context) = &config.cluster.context {
        return Some(context.clone());
    }
    let kubeconfig = config.kubeconfig().map(|p| p.display().to_string());
    let mut args = vec!["config", "current-context"];
    if let Some(path) = &kubeconfig {
        args.extend(["--kubeconfig", path.as_str()]);
    }
    match runner::run_capture("kubectl", &args) {
        Ok(context) => Some(context),
        Err(e) => {
            log::debug!("No current kube context: {e}");
            None
        }
    }
}

fn print_summary(summary: &ApplySummary, cancelled: bool) {
    println!();
    if cancelled {
        ui::warn("Cancelled; resources not yet submitted were skipped");
    }

    let line = format!(
        "{} ready ({} changed), {} failed",
        summary.ready, summary.changed, summary.failed
    );
    if summary.is_success() {
        ui::success(&line);
    } else {
        ui::error(&line);
    }
}
