//! Text produced by `config show` and `docs check`.

use std::path::Path;

use infralog_docs::{DocSet, Sidebars};

use crate::config::Config;
use crate::error::Result;

/// Render a filter list: `None` watches everything, an empty list nothing.
#[must_use]
pub fn list_or_all(items: Option<&[String]>) -> String {
    match items {
        None => "(all)".to_string(),
        Some([]) => "(none)".to_string(),
        Some(items) => items.join(", "),
    }
}

fn field(label: &str, value: impl std::fmt::Display) -> String {
    format!("  {:<20}{value}", format!("{label}:"))
}

/// The human-readable form of `config show`.
#[must_use]
pub fn render_config(config: &Config) -> String {
    let mut lines = vec![
        "Current Configuration".to_string(),
        "=====================".to_string(),
        String::new(),
        "[State]".to_string(),
    ];
    if let Some(s3) = &config.tfstate.s3 {
        lines.push(field("S3", format!("s3://{}/{}", s3.bucket, s3.key)));
        if !s3.region.is_empty() {
            lines.push(field("Region", &s3.region));
        }
    }
    if let Some(local) = &config.tfstate.local {
        lines.push(field("Local", local.path.display()));
    }
    lines.push(field("Poll interval", format!("{}s", config.polling.interval)));

    let webhook = config.target.webhook.as_ref().map(|w| w.url.as_str());
    let slack = config.target.slack.as_ref().map(|_| "configured");
    lines.extend([
        String::new(),
        "[Targets]".to_string(),
        field("Webhook", webhook.unwrap_or("-")),
        field("Slack", slack.unwrap_or("-")),
        field(
            "Stdout",
            format!(
                "{} ({})",
                config.target.stdout.enabled, config.target.stdout.format
            ),
        ),
        String::new(),
        "[Filter]".to_string(),
        field(
            "Resource types",
            list_or_all(config.filter.resource_types.as_deref()),
        ),
        field("Outputs", list_or_all(config.filter.outputs.as_deref())),
        String::new(),
        "[Persistence]".to_string(),
    ]);
    if let Some(path) = &config.persistence.state_file {
        lines.push(field("State file", path.display()));
    }
    if let Some(path) = &config.persistence.database {
        lines.push(field("Database", path.display()));
    }
    lines.extend([
        String::new(),
        "[Metrics]".to_string(),
        field("Enabled", config.metrics.enabled),
        field("Address", &config.metrics.address),
        String::new(),
        "[Redaction]".to_string(),
        field("Enabled", config.redact.enabled),
        field("Custom patterns", config.redact.patterns.len()),
    ]);

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Outcome of checking a documentation directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocsCheck {
    /// Number of pages found.
    pub documents: usize,
    /// One line per problem, empty when the tree is consistent.
    pub problems: Vec<String>,
}

impl DocsCheck {
    /// True when nothing needs fixing.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Check `dir` against `sidebars`: every referenced page must exist and
/// `dir/sidebars.ts` must match the rendered sidebars.
///
/// # Errors
///
/// Returns an error if the directory cannot be scanned.
pub fn check_docs(sidebars: &Sidebars, dir: &Path) -> Result<DocsCheck> {
    let docs = DocSet::from_dir(dir)?;
    let mut problems: Vec<String> = sidebars
        .validate(&docs)
        .into_iter()
        .map(|(sidebar, issue)| format!("{sidebar}: {issue}"))
        .collect();

    let rendered_path = dir.join("sidebars.ts");
    match std::fs::read_to_string(&rendered_path) {
        Ok(rendered) if rendered == sidebars.to_typescript() => {}
        Ok(_) => problems.push(format!(
            "{} is out of date; regenerate it with `infralog docs sidebar --format ts`",
            rendered_path.display()
        )),
        Err(e) => problems.push(format!("cannot read {}: {e}", rendered_path.display())),
    }

    Ok(DocsCheck {
        documents: docs.len(),
        problems,
    })
}
