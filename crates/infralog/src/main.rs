//! `infralog` - CLI for infralog
//!
//! This binary watches Terraform state for drift, reports plan changes and
//! inspects the recorded change history.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::info;

use infralog::backend::Source;
use infralog::cli::{
    check_docs, history_line, render_config, Cli, Command, ConfigCommand, DiffCommand,
    DocsCommand, HistoryCommand, PlanCommand, SidebarFormat, WatchCommand,
};
use infralog::config::{LocalConfig, TfStateConfig};
use infralog::git::GitMetadata;
use infralog::metrics::{Metrics, MetricsServer};
use infralog::persistence::{SqliteStore, StateStore};
use infralog::poller::{notify_all, shutdown_signal};
use infralog::redact::Redactor;
use infralog::target::{build_targets, OutputFormat, Payload, StdoutTarget, Target};
use infralog::tfplan::{apply_filter, Plan};
use infralog::tfstate::{compare, State};
use infralog::{init_logging, Config, PollOutcome, Poller};
use infralog_docs::Sidebars;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Commands that do not need the configuration
    match &cli.command {
        Command::Config(ConfigCommand::Path) => {
            println!("{}", config_path(&cli).display());
            return Ok(());
        }
        Command::Config(ConfigCommand::Validate { file }) => {
            return handle_validate(file.clone().or_else(|| cli.config.clone()));
        }
        Command::Docs(docs_cmd) => return handle_docs(docs_cmd),
        _ => {}
    }

    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    match cli.command {
        Command::Watch(cmd) => handle_watch(&config, &cmd).await,
        Command::Plan(cmd) => handle_plan(&config, &cmd).await,
        Command::Diff(cmd) => handle_diff(&config, &cmd).await,
        Command::History(cmd) => handle_history(&config, &cmd),
        Command::Config(ConfigCommand::Show { json }) => handle_show(&config, json),
        Command::Config(_) | Command::Docs(_) => Ok(()),
    }
}

fn config_path(cli: &Cli) -> std::path::PathBuf {
    cli.config.clone().unwrap_or_else(Config::default_config_path)
}

async fn handle_watch(config: &Config, cmd: &WatchCommand) -> anyhow::Result<()> {
    let metrics = Arc::new(Metrics::new());
    let server = if config.metrics.enabled {
        let addr = config.metrics.listen_address()?;
        Some(MetricsServer::start(addr, Arc::clone(&metrics)).await?)
    } else {
        None
    };

    let mut poller = Poller::from_config(config, metrics)?;
    poller
        .initialize()
        .await
        .context("failed to fetch the initial state")?;

    if cmd.once {
        match poller.poll().await? {
            PollOutcome::Changes(diff) => info!(changes = diff.len(), "changes reported"),
            outcome => info!(?outcome, "no changes to report"),
        }
    } else {
        poller.run(shutdown_signal()).await;
    }

    if let Some(server) = server {
        server.shutdown().await;
    }
    Ok(())
}

async fn handle_plan(config: &Config, cmd: &PlanCommand) -> anyhow::Result<()> {
    let plan = Plan::from_file(&cmd.file)?;
    let plan = apply_filter(&plan, &config.filter);
    if !plan.has_changes() {
        info!(file = %cmd.file.display(), "plan has no changes");
        return Ok(());
    }

    let redactor = Redactor::new(&config.redact)?;
    let diffs = redactor.redact(&plan.to_diff());
    let git = if cmd.no_git { None } else { GitMetadata::extract() };
    let payload = Payload::plan(
        diffs,
        Source::Plan {
            path: cmd.file.clone(),
        },
        git,
    );

    let targets: Vec<Box<dyn Target>> = if cmd.dry_run {
        vec![Box::new(StdoutTarget::with_writer(
            OutputFormat::Text,
            Box::new(std::io::stdout()),
        ))]
    } else {
        build_targets(&config.target)?
    };

    let failures = notify_all(&targets, &payload, &Metrics::new()).await;
    if failures > 0 {
        bail!("{failures} of {} notifications failed", targets.len());
    }
    Ok(())
}

async fn handle_diff(config: &Config, cmd: &DiffCommand) -> anyhow::Result<()> {
    let old = State::from_file(&cmd.old)?;
    let new = State::from_file(&cmd.new)?;
    let diffs = compare(&old, &new, &config.filter);
    if !diffs.has_changes() {
        println!("No changes between serial {} and {}.", old.serial, new.serial);
        return Ok(());
    }

    let redactor = Redactor::new(&config.redact)?;
    let payload = Payload::state(
        redactor.redact(&diffs),
        Source::Local {
            path: cmd.new.clone(),
        },
        TfStateConfig {
            local: Some(LocalConfig {
                path: cmd.new.clone(),
            }),
            ..TfStateConfig::default()
        },
    );
    let target = StdoutTarget::with_writer(cmd.format.into(), Box::new(std::io::stdout()));
    target.write(&payload).await?;
    Ok(())
}

fn handle_history(config: &Config, cmd: &HistoryCommand) -> anyhow::Result<()> {
    let Some(database) = &config.persistence.database else {
        bail!("history requires persistence.database to be configured");
    };
    let store = SqliteStore::open(database)?;
    let records = store.recent_changes(cmd.limit)?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    let stats = store.stats()?;
    println!(
        "{} changes recorded in {}",
        stats.total_changes,
        store.location().display()
    );
    if let Some(serial) = stats.snapshot_serial {
        println!("Last saved state serial: {serial}");
    }
    println!();
    for record in &records {
        println!("{}", history_line(record));
    }
    Ok(())
}

fn handle_show(config: &Config, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
    } else {
        print!("{}", render_config(config));
    }
    Ok(())
}

fn handle_validate(file: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = file.unwrap_or_else(Config::default_config_path);
    println!("Validating configuration: {}", path.display());
    match Config::load_from(Some(path)) {
        Ok(_) => {
            println!("Configuration is valid.");
            Ok(())
        }
        Err(e) => bail!("configuration error: {e}"),
    }
}

fn handle_docs(cmd: &DocsCommand) -> anyhow::Result<()> {
    let sidebars = Sidebars::infralog();
    match cmd {
        DocsCommand::Sidebar { format } => {
            match format {
                SidebarFormat::Json => println!("{}", sidebars.to_json()?),
                SidebarFormat::Ts => print!("{}", sidebars.to_typescript()),
            }
            Ok(())
        }
        DocsCommand::Check { dir } => {
            let check = check_docs(&sidebars, dir)?;
            for problem in &check.problems {
                println!("{problem}");
            }
            if !check.is_ok() {
                bail!(
                    "documentation check found {} problem(s)",
                    check.problems.len()
                );
            }
            println!("{} documents, sidebar OK", check.documents);
            Ok(())
        }
    }
}
