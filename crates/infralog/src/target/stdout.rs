use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{display_value, Payload, PayloadKind, Target};
use crate::backend::Source;
use crate::config::StdoutConfig;
use crate::error::{Error, Result};
use crate::tfstate::{DiffStatus, ValueDiff};

const HEAVY_RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";
const LIGHT_RULE: &str = "──────────────────────────────────────────────────";

/// How the stdout target prints changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Boxed human-readable report.
    #[default]
    Text,
    /// One JSON log line per change.
    Json,
}

impl OutputFormat {
    /// Parse a format name; anything but `json` is text.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

/// Prints changes to standard output, or to any writer in tests.
pub struct StdoutTarget {
    format: OutputFormat,
    writer: Mutex<Box<dyn Write + Send>>,
}

impl fmt::Debug for StdoutTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdoutTarget")
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct LogEntry<'a> {
    timestamp: DateTime<Utc>,
    level: &'static str,
    msg: String,
    event_type: &'static str,
    source: String,
    #[serde(skip_serializing_if = "str::is_empty")]
    resource_type: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    resource_name: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    output_name: &'a str,
    status: DiffStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    changes: Option<BTreeMap<&'a str, &'a ValueDiff>>,
}

impl StdoutTarget {
    /// Create a target writing to the process's stdout.
    #[must_use]
    pub fn new(config: &StdoutConfig) -> Self {
        Self::with_writer(OutputFormat::parse(&config.format), Box::new(std::io::stdout()))
    }

    /// Create a target writing to `writer`.
    #[must_use]
    pub fn with_writer(format: OutputFormat, writer: Box<dyn Write + Send>) -> Self {
        Self {
            format,
            writer: Mutex::new(writer),
        }
    }

    /// The configured output format.
    #[must_use]
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    fn emit(&self, data: &[u8]) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| Error::internal("stdout writer lock poisoned"))?;
        writer.write_all(data)?;
        writer.flush()?;
        Ok(())
    }
}

#[async_trait]
impl Target for StdoutTarget {
    fn name(&self) -> &'static str {
        "stdout"
    }

    async fn write(&self, payload: &Payload) -> Result<()> {
        let rendered = match self.format {
            OutputFormat::Json => render_json(payload)?,
            OutputFormat::Text => render_text(payload),
        };
        self.emit(rendered.as_bytes())
    }
}

/// Render one JSON line per resource and output change.
///
/// # Errors
///
/// Returns an error if an entry cannot be serialized.
pub(crate) fn render_json(payload: &Payload) -> Result<String> {
    let source = payload.metadata.source.to_string();
    let timestamp = payload.metadata.timestamp;
    let mut out = String::new();

    for diff in &payload.diffs.resource_diffs {
        let entry = LogEntry {
            timestamp,
            level: "info",
            msg: format!("resource {}", diff.status),
            event_type: "resource_change",
            source: source.clone(),
            resource_type: &diff.resource_type,
            resource_name: &diff.resource_name,
            output_name: "",
            status: diff.status,
            changes: (!diff.attribute_diffs.is_empty()).then(|| {
                diff.attribute_diffs
                    .iter()
                    .map(|(k, v)| (k.as_str(), v))
                    .collect()
            }),
        };
        out.push_str(&serde_json::to_string(&entry)?);
        out.push('\n');
    }

    for diff in &payload.diffs.output_diffs {
        let entry = LogEntry {
            timestamp,
            level: "info",
            msg: format!("output {}", diff.status),
            event_type: "output_change",
            source: source.clone(),
            resource_type: "",
            resource_name: "",
            output_name: &diff.output_name,
            status: diff.status,
            changes: (diff.status == DiffStatus::Changed)
                .then(|| BTreeMap::from([("value", &diff.value_diff)])),
        };
        out.push_str(&serde_json::to_string(&entry)?);
        out.push('\n');
    }

    Ok(out)
}

fn status_symbol(status: DiffStatus) -> &'static str {
    match status {
        DiffStatus::Added => "[+]",
        DiffStatus::Removed => "[-]",
        DiffStatus::Changed => "[~]",
        DiffStatus::Replaced => "[±]",
    }
}

/// Render the boxed human-readable report.
pub(crate) fn render_text(payload: &Payload) -> String {
    let title = match payload.metadata.kind {
        PayloadKind::State => "TERRAFORM STATE CHANGES DETECTED",
        PayloadKind::Plan => "TERRAFORM PLAN CHANGES DETECTED",
    };

    let mut lines = vec![
        HEAVY_RULE.to_string(),
        format!("  {title}"),
        HEAVY_RULE.to_string(),
        format!("  Time:   {}", payload.formatted_time()),
    ];
    match &payload.metadata.source {
        Source::S3 {
            bucket,
            key,
            region,
        } => {
            lines.push(format!("  Bucket: {bucket}"));
            lines.push(format!("  Key:    {key}"));
            lines.push(format!("  Region: {region}"));
        }
        Source::Local { path } => lines.push(format!("  Path:   {}", path.display())),
        Source::Plan { path } => lines.push(format!("  Plan:   {}", path.display())),
    }
    if let Some(git) = &payload.metadata.git {
        lines.push(format!("  Commit: {}", git.short_sha()));
        if let Some(branch) = &git.branch {
            lines.push(format!("  Branch: {branch}"));
        }
    }
    lines.push(LIGHT_RULE.to_string());

    if !payload.diffs.resource_diffs.is_empty() {
        lines.extend([String::new(), "  RESOURCE CHANGES".to_string(), String::new()]);
        for diff in &payload.diffs.resource_diffs {
            lines.push(format!(
                "  {} {}.{} ({})",
                status_symbol(diff.status),
                diff.resource_type,
                diff.resource_name,
                diff.status
            ));
            if matches!(diff.status, DiffStatus::Changed | DiffStatus::Replaced) {
                lines.extend(diff.attribute_diffs.iter().map(|(attr, change)| {
                    format!(
                        "      {attr}: {} → {}",
                        display_value(change.before.as_ref()),
                        display_value(change.after.as_ref())
                    )
                }));
            }
        }
    }

    if !payload.diffs.output_diffs.is_empty() {
        lines.extend([String::new(), "  OUTPUT CHANGES".to_string(), String::new()]);
        for diff in &payload.diffs.output_diffs {
            lines.push(format!(
                "  {} {} ({})",
                status_symbol(diff.status),
                diff.output_name,
                diff.status
            ));
            if diff.status == DiffStatus::Changed {
                lines.push(format!(
                    "      {} → {}",
                    display_value(diff.value_diff.before.as_ref()),
                    display_value(diff.value_diff.after.as_ref())
                ));
            }
        }
    }

    lines.push(String::new());
    lines.push(HEAVY_RULE.to_string());
    let mut out = lines.join("\n");
    out.push('\n');
    out
}
