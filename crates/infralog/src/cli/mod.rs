//! Command-line interface for infralog.
//!
//! This module provides the CLI structure for the `infralog` binary.

mod commands;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    history_line, ConfigCommand, DiffCommand, DiffFormat, DocsCommand, HistoryCommand,
    PlanCommand, SidebarFormat, WatchCommand,
};
pub use output::{check_docs, list_or_all, render_config, DocsCheck};

/// infralog - Terraform state drift notifications
///
/// Watches a Terraform state file and notifies webhooks, Slack or stdout
/// when resources or outputs change.
#[derive(Debug, Parser)]
#[command(name = "infralog")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(
        short,
        long,
        global = true,
        value_name = "FILE",
        env = crate::config::CONFIG_FILE_ENV
    )]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll the state backend and report changes
    Watch(WatchCommand),

    /// Report the changes of a Terraform plan
    Plan(PlanCommand),

    /// Compare two state files
    Diff(DiffCommand),

    /// Show recorded changes
    History(HistoryCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Inspect the documentation sidebar
    #[command(subcommand)]
    Docs(DocsCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}
