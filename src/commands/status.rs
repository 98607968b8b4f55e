use anyhow::Result;
use chrono::Local;
use colored::Colorize;

use crate::Context;
use crate::state::ApplyRecord;
use crate::ui;

pub fn run(ctx: &Context) -> Result<()> {
    let Some(record) = ApplyRecord::load()? else {
        ui::info("No apply recorded yet. Run `rollout apply` first.");
        return Ok(());
    };

    ui::header("Last Apply");
    ui::kv(
        "Finished",
        &record
            .finished_at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
    );
    ui::kv("Target", &record.target);
    if record.dry_run {
        ui::kv("Mode", "dry run");
    }

    ui::section("Resources");
    for report in record.result.reports() {
        if ctx.quiet && report.error.is_none() {
            continue;
        }
        let detail = report
            .error
            .as_ref()
            .map(|e| e.to_string().red().to_string())
            .unwrap_or_default();
        println!(
            "  {} {:<40} {:<10} {:>8}  {}",
            ui::state_marker(report.state),
            format!("{}/{}", report.kind, report.id),
            report.state.to_string(),
            ui::format_elapsed(report.elapsed).dimmed(),
            detail
        );
    }

    let summary = record.summary;
    println!();
    ui::kv(
        "Summary",
        &format!(
            "{} ready ({} changed), {} failed, {} pending",
            summary.ready, summary.changed, summary.failed, summary.pending
        ),
    );
    Ok(())
}
