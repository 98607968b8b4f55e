use anyhow::Result;
use colored::Colorize;

use crate::Context;
use crate::ui;

pub fn run(ctx: &Context) -> Result<()> {
    let (_, config) = super::load_config(ctx)?;
    let graph = super::compose(&config)?;
    let order = graph.topological_order()?;

    ui::header("Submission Order");
    ui::kv("Target", config.cluster.target.as_str());
    ui::kv("Resources", &order.len().to_string());
    println!();

    for (i, id) in order.iter().enumerate() {
        let Some(node) = graph.get(id) else { continue };
        ui::step(i + 1, order.len(), &node.label());

        let deps = graph.dependencies(id);
        if !deps.is_empty() && !ctx.quiet {
            println!("      {} {}", "after".dimmed(), deps.join(", ").dimmed());
        }
        if ctx.verbose > 1 {
            println!("      {}", node.spec.to_string().dimmed());
        }
    }

    Ok(())
}
