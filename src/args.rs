//! Command-line argument definition.

use clap::Parser;

/// envdeck - reconcile package selections against a conda-store environment
#[derive(Parser, Debug, Default)]
#[command(name = "envdeck")]
#[command(version)]
#[command(
    about = "Reconcile package selections against a conda-store environment",
    long_about = None
)]
#[allow(clippy::struct_excessive_bools)]
pub struct Args {
    /// Base URL of the package service (overrides the settings file)
    #[arg(long)]
    pub server: Option<String>,

    /// Namespace of the target environment
    #[arg(short = 'N', long)]
    pub namespace: Option<String>,

    /// Name of the target environment
    #[arg(short = 'e', long)]
    pub env: Option<String>,

    /// Set the logging level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Answer yes to all confirmation prompts
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Search available packages and print matches
    #[arg(short, long)]
    pub search: Option<String>,

    /// Install packages, given as NAME or NAME=VERSION atoms
    #[arg(short, long, num_args = 1..)]
    pub install: Vec<String>,

    /// Remove installed packages by name
    #[arg(short = 'r', long, num_args = 1..)]
    pub remove: Vec<String>,

    /// Update installed packages by name to their newest consistent versions
    #[arg(short = 'u', long, num_args = 1..)]
    pub update: Vec<String>,

    /// Update every package in the environment
    #[arg(long)]
    pub update_all: bool,

    /// List the environment's packages
    #[arg(short = 'l', long)]
    pub list: bool,

    /// Filter the listing (all, installed, available, updatable)
    #[arg(long, default_value = "all")]
    pub filter: String,

    /// Repopulate the server-side package index before listing
    #[arg(long)]
    pub refresh: bool,

    /// Print the status of the environment's most recent build
    #[arg(long)]
    pub status: bool,

    /// List the environments visible on the server
    #[arg(long)]
    pub envs: bool,

    /// Wait for a build to reach a terminal state
    #[arg(long, value_name = "BUILD_ID")]
    pub watch: Option<u64>,

    /// Apply removals, updates, and installs as three sequential builds
    /// instead of one specification submission
    #[arg(long)]
    pub staged: bool,

    /// Path to the settings file (default: ~/.config/envdeck/settings.toml)
    #[arg(long)]
    pub config: Option<String>,
}
