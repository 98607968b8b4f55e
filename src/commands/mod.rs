pub mod apply;
pub mod config;
pub mod graph;
pub mod plan;
pub mod status;

use crate::Context;
use crate::config::{self as stack_config, StackConfig};
use crate::stack;
use anyhow::{Context as AnyhowContext, Result};
use declarative::DependencyGraph;
use std::path::PathBuf;

/// Resolve, load and validate the stack config for this invocation
pub fn load_config(ctx: &Context) -> Result<(Option<PathBuf>, StackConfig)> {
    let path = stack_config::resolve_path(ctx.config.as_deref())?;
    let config = StackConfig::load(path.as_deref())?;
    Ok((path, config))
}

/// Compose the graph for a loaded config
pub fn compose(config: &StackConfig) -> Result<DependencyGraph> {
    stack::build(config).context("Stack does not compose into a valid resource graph")
}
