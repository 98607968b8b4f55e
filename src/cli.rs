use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rollout")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Compose cluster add-ons into a dependency graph and converge them", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the stack config (default: ./rollout.toml, then ~/.config/rollout/config.toml)
    #[arg(short, long, global = true, env = "ROLLOUT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the order in which resources would be submitted
    Plan,

    /// Print the composed resource graph
    Graph(GraphArgs),

    /// Submit every resource in dependency order and wait for convergence
    Apply(ApplyArgs),

    /// Show the outcome of the last apply
    Status,

    /// Inspect the stack configuration
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Graph
// ============================================================================

#[derive(Parser)]
pub struct GraphArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: GraphFormat,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum GraphFormat {
    Text,
    Json,
    Dot,
}

// ============================================================================
// Apply
// ============================================================================

#[derive(Parser)]
pub struct ApplyArgs {
    /// Log every submission without touching the cluster
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Number of resources submitted in parallel (overrides config)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Seconds to wait for each resource to converge (overrides config)
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

// ============================================================================
// Config Commands
// ============================================================================

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the resolved config file and policy flags
    Show,

    /// Validate the config and the graph it composes
    Validate,
}
