//! Progress bar for an apply pass

use crate::ui;
use colored::Colorize;
use declarative::{ApplySummary, NodeReport, NodeState, Progress, ResourceNode};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const TEMPLATE: &str = "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}";

/// Prints one line per settled node above a running bar
pub struct ApplyProgress {
    bar: ProgressBar,
}

impl ApplyProgress {
    pub fn new(quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new(0);
            // Keep the spinner moving while a node blocks in `helm --wait`
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        };
        if let Ok(style) = ProgressStyle::default_bar().template(TEMPLATE) {
            bar.set_style(style.progress_chars("=>-"));
        }
        Self { bar }
    }
}

impl Progress for ApplyProgress {
    fn on_pass_start(&mut self, total: usize) {
        self.bar.set_length(total as u64);
    }

    fn on_node_start(&mut self, node: &ResourceNode) {
        self.bar.set_message(node.label());
    }

    fn on_node_complete(&mut self, report: &NodeReport) {
        let detail = match (&report.state, &report.error) {
            (NodeState::Failed, Some(error)) => error.to_string().red().to_string(),
            (_, _) if report.changed => "changed".yellow().to_string(),
            _ => "unchanged".dimmed().to_string(),
        };
        self.bar.println(format!(
            "{} {:<40} {:>8}  {}",
            ui::state_marker(report.state),
            format!("{}/{}", report.kind, report.id),
            ui::format_elapsed(report.elapsed).dimmed(),
            detail
        ));
        self.bar.inc(1);
    }

    fn on_pass_complete(&mut self, _summary: &ApplySummary) {
        self.bar.finish_and_clear();
    }
}
