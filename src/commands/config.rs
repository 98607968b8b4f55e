use anyhow::{Context as AnyhowContext, Result};
use declarative::Flag;

use crate::Context;
use crate::cli::ConfigCommand;
use crate::runner;
use crate::ui;

pub fn run(ctx: &Context, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show => show(ctx),
        ConfigCommand::Validate => validate(ctx),
    }
}

fn show(ctx: &Context) -> Result<()> {
    let (path, config) = super::load_config(ctx)?;

    ui::header("Stack Config");
    match &path {
        Some(path) => ui::kv("File", &path.display().to_string()),
        None => ui::kv("File", "(built-in defaults)"),
    }

    ui::section("Policy");
    for (name, flag) in config.policy().iter() {
        ui::kv(name, &format_flag(flag));
    }

    ui::section("Resolved");
    let content = toml::to_string_pretty(&config).context("Failed to serialize config")?;
    for line in content.lines() {
        println!("  {line}");
    }
    Ok(())
}

fn validate(ctx: &Context) -> Result<()> {
    let (path, config) = super::load_config(ctx)?;
    let graph = super::compose(&config)?;
    let order = graph.topological_order()?;

    let source = path.map_or_else(|| "built-in defaults".to_string(), |p| p.display().to_string());
    ui::success(&format!(
        "{source} is valid: {} resources, {} dependencies",
        order.len(),
        graph.edges().len()
    ));

    for tool in ["kubectl", "helm"] {
        if !runner::command_exists(tool) {
            ui::warn(&format!("{tool} not found in PATH; only dry runs will work"));
        }
    }
    Ok(())
}

fn format_flag(flag: &Flag) -> String {
    match flag {
        Flag::Bool(value) => value.to_string(),
        Flag::Choice(value) => value.clone(),
        Flag::List(values) if values.is_empty() => "[]".to_string(),
        Flag::List(values) => values.join(", "),
    }
}
