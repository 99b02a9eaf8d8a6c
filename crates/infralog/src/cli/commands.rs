//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::persistence::ChangeRecord;
use crate::target::OutputFormat;

/// Watch command arguments.
#[derive(Debug, Args)]
pub struct WatchCommand {
    /// Poll once and exit instead of running until interrupted
    #[arg(long)]
    pub once: bool,
}

/// Plan command arguments.
#[derive(Debug, Args)]
pub struct PlanCommand {
    /// Plan JSON produced by `terraform show -json`
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Do not attach git commit information
    #[arg(long)]
    pub no_git: bool,

    /// Print the notification instead of sending it
    #[arg(long)]
    pub dry_run: bool,
}

/// Diff command arguments.
#[derive(Debug, Args)]
pub struct DiffCommand {
    /// The older state file
    #[arg(value_name = "OLD")]
    pub old: PathBuf,

    /// The newer state file
    #[arg(value_name = "NEW")]
    pub new: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: DiffFormat,
}

/// History command arguments.
#[derive(Debug, Args)]
pub struct HistoryCommand {
    /// Maximum number of changes to show
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Documentation sidebar commands.
#[derive(Debug, Subcommand)]
pub enum DocsCommand {
    /// Print the documentation sidebar
    Sidebar {
        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: SidebarFormat,
    },

    /// Check the sidebar against the documentation directory
    Check {
        /// Documentation root
        #[arg(short, long, default_value = "docs")]
        dir: PathBuf,
    },
}

/// Output format of `diff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DiffFormat {
    /// Human-readable report
    #[default]
    Text,
    /// One JSON object per change
    Json,
}

impl From<DiffFormat> for OutputFormat {
    fn from(format: DiffFormat) -> Self {
        match format {
            DiffFormat::Text => Self::Text,
            DiffFormat::Json => Self::Json,
        }
    }
}

/// Output format of `docs sidebar`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SidebarFormat {
    /// The JSON sidebar schema
    #[default]
    Json,
    /// The `sidebars.ts` module
    Ts,
}

/// One line of the `history` table.
#[must_use]
pub fn history_line(record: &ChangeRecord) -> String {
    format!(
        "{}  {:<8}  {:<8}  {}",
        record.recorded_at.format("%Y-%m-%d %H:%M:%S"),
        record.kind.to_string(),
        record.status.as_str(),
        record.address
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::ChangeKind;
    use crate::tfstate::DiffStatus;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn test_diff_format_conversion() {
        assert_eq!(OutputFormat::from(DiffFormat::Text), OutputFormat::Text);
        assert_eq!(OutputFormat::from(DiffFormat::Json), OutputFormat::Json);
    }

    #[test]
    fn test_format_defaults() {
        assert_eq!(DiffFormat::default(), DiffFormat::Text);
        assert_eq!(SidebarFormat::default(), SidebarFormat::Json);
    }

    #[test]
    fn test_history_line() {
        let record = ChangeRecord {
            id: 7,
            recorded_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap(),
            kind: ChangeKind::Resource,
            address: "aws_instance.web".to_string(),
            resource_type: Some("aws_instance".to_string()),
            status: DiffStatus::Changed,
            details: json!({}),
        };
        assert_eq!(
            history_line(&record),
            "2024-03-01 12:30:00  resource  changed   aws_instance.web"
        );
    }

    #[test]
    fn test_config_command_debug() {
        let cmd = ConfigCommand::Show { json: false };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Show"));
    }
}
