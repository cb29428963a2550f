//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    completions::CompletionsArgs, config::ConfigCommands, events::EventsArgs,
    profile::ProfileCommands, query::QueryArgs, request::RequestArgs, store::StoreCommands,
    stuck::StuckArgs,
};

#[derive(Parser)]
#[command(name = "execscope")]
#[command(author, version, about = "Workflow execution debugging toolkit")]
#[command(long_about = "Query job-execution and lifecycle-event records by tenant and status, \
apply ad-hoc filters, and find pull requests whose latest event is still in flight.")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "auto")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output (debug logging on stderr)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Credential profile (overrides EXECSCOPE_PROFILE and config files)
    #[arg(long, short = 'p', global = true)]
    pub profile: Option<String>,

    /// Snapshot store directory (overrides EXECSCOPE_STORE and config files)
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Query job-execution records by tenant and status
    Query(QueryArgs),

    /// Query lifecycle-event records by tenant and status
    Events(EventsArgs),

    /// Pull requests whose latest event is still in flight
    Stuck(StuckArgs),

    /// Run a JSON request read from stdin and print the JSON envelope
    Request(RequestArgs),

    /// Credential profiles
    #[command(subcommand)]
    Profile(ProfileCommands),

    /// Snapshot store inspection
    #[command(subcommand)]
    Store(StoreCommands),

    /// Configuration inspection
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table on a terminal
    #[default]
    Auto,
    /// JSON envelope (for programming)
    Json,
    /// CSV (for spreadsheets)
    Csv,
    /// Aligned columns (for reading and piping)
    Tsv,
    /// Markdown tables
    Md,
    /// YAML (full fidelity)
    Yaml,
}
