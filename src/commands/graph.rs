use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use declarative::DependencyGraph;

use crate::Context;
use crate::cli::{GraphArgs, GraphFormat};

pub fn run(ctx: &Context, args: GraphArgs) -> Result<()> {
    let (_, config) = super::load_config(ctx)?;
    let graph = super::compose(&config)?;

    match args.format {
        GraphFormat::Text => print_text(&graph),
        GraphFormat::Json => {
            let json = serde_json::to_string_pretty(&graph).context("Failed to serialize graph")?;
            println!("{json}");
        }
        GraphFormat::Dot => print!("{}", graph.to_dot()),
    }

    Ok(())
}

fn print_text(graph: &DependencyGraph) {
    for node in graph.nodes() {
        println!("{} {}", node.id.bold(), format!("({})", node.kind).dimmed());

        let dependents = graph.dependents(&node.id);
        for (i, dependent) in dependents.iter().enumerate() {
            let branch = if i + 1 == dependents.len() { "└─" } else { "├─" };
            println!("  {} {}", branch.dimmed(), dependent);
        }
    }
}
