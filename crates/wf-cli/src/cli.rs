//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Wharf - run ETL task graphs against a warehouse
#[derive(Parser, Debug)]
#[command(name = "wf")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Pipeline manifest, or a directory containing wharf.yml
    #[arg(short, long, global = true, default_value = ".", env = "WHARF_PIPELINE")]
    pub pipeline: String,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute the pipeline once for a logical date
    Run(RunArgs),

    /// Check the manifest, graph, templates and credentials without running
    Validate(ValidateArgs),

    /// List tasks and their dependencies
    Ls(LsArgs),
}

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Logical date the run covers (RFC 3339 or YYYY-MM-DD, default: now)
    #[arg(short = 'd', long)]
    pub logical_date: Option<String>,

    /// Run identifier (default: random UUID)
    #[arg(long)]
    pub run_id: Option<String>,

    /// Override the manifest's worker count
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Override the warehouse path from the manifest
    #[arg(long)]
    pub db_path: Option<String>,

    /// Cancel the run after this many seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Write the run result as JSON to this path
    #[arg(long)]
    pub results_path: Option<String>,

    /// Prefix for credential environment variables (e.g. WHARF)
    #[arg(long, env = "WHARF_CREDENTIALS_PREFIX")]
    pub credentials_prefix: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Suppress the progress bar
    #[arg(short, long)]
    pub quiet: bool,
}

/// Run output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable summary
    Text,
    /// RunResult as JSON on stdout
    Json,
}

/// Arguments for the validate command
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Treat warnings as errors
    #[arg(long)]
    pub strict: bool,

    /// Also resolve credential references from the environment
    #[arg(long)]
    pub check_credentials: bool,

    /// Prefix for credential environment variables
    #[arg(long, env = "WHARF_CREDENTIALS_PREFIX")]
    pub credentials_prefix: Option<String>,
}

/// Arguments for the ls command
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: LsOutput,
}

/// Ls output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LsOutput {
    /// Aligned columns in execution order
    Table,
    /// JSON array
    Json,
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
