use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use super::{display_value, Payload, PayloadKind, Target};
use crate::config::SlackConfig;
use crate::error::{Error, Result};
use crate::tfstate::{DiffStatus, OutputDiff, ResourceDiff};

/// Changed attributes listed per resource before the rest are summarized.
const MAX_ATTRIBUTES: usize = 5;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Posts a Block Kit message to a Slack incoming webhook.
#[derive(Debug)]
pub struct SlackTarget {
    client: Client,
    webhook_url: String,
    channel: Option<String>,
    username: Option<String>,
    icon_emoji: Option<String>,
}

#[derive(Debug, Serialize)]
struct SlackMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon_emoji: Option<String>,
    text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    blocks: Vec<Block>,
}

#[derive(Debug, Serialize)]
struct Block {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<TextObject>,
}

#[derive(Debug, Serialize)]
struct TextObject {
    #[serde(rename = "type")]
    kind: &'static str,
    text: String,
}

impl Block {
    fn header(text: &str) -> Self {
        Self {
            kind: "header",
            text: Some(TextObject {
                kind: "plain_text",
                text: text.to_string(),
            }),
        }
    }

    fn section(text: String) -> Self {
        Self {
            kind: "section",
            text: Some(TextObject {
                kind: "mrkdwn",
                text,
            }),
        }
    }

    fn divider() -> Self {
        Self {
            kind: "divider",
            text: None,
        }
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.is_empty()).cloned()
}

impl SlackTarget {
    /// Create a Slack target.
    ///
    /// # Errors
    ///
    /// Returns an error if the webhook URL is empty or the HTTP client
    /// cannot be built.
    pub fn new(config: &SlackConfig) -> Result<Self> {
        if config.webhook_url.is_empty() {
            return Err(Error::config("slack webhook URL is required"));
        }

        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            webhook_url: config.webhook_url.clone(),
            channel: non_empty(config.channel.as_ref()),
            username: non_empty(config.username.as_ref()),
            icon_emoji: non_empty(config.icon_emoji.as_ref()),
        })
    }

    fn build_message(&self, payload: &Payload) -> SlackMessage {
        let title = match payload.metadata.kind {
            PayloadKind::Plan => "Terraform Plan Changes",
            PayloadKind::State => "Terraform State Changes",
        };

        let mut blocks = vec![
            Block::header(title),
            Block::section(context_text(payload)),
            Block::divider(),
        ];

        if !payload.diffs.resource_diffs.is_empty() {
            blocks.push(Block::section(format_resources(&payload.diffs.resource_diffs)));
        }
        if !payload.diffs.output_diffs.is_empty() {
            blocks.push(Block::section(format_outputs(&payload.diffs.output_diffs)));
        }

        SlackMessage {
            channel: self.channel.clone(),
            username: self.username.clone(),
            icon_emoji: self.icon_emoji.clone(),
            text: fallback_text(payload),
            blocks,
        }
    }
}

#[async_trait]
impl Target for SlackTarget {
    fn name(&self) -> &'static str {
        "slack"
    }

    async fn write(&self, payload: &Payload) -> Result<()> {
        let message = self.build_message(payload);
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&message)
            .send()
            .await
            .map_err(|e| Error::target("slack", format!("error sending slack message: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::target(
                "slack",
                format!("slack request failed with status code: {}", status.as_u16()),
            ));
        }

        debug!("slack message delivered");
        Ok(())
    }
}

fn context_text(payload: &Payload) -> String {
    let mut text = format!("*Time:* {}", payload.formatted_time());

    if let Some(git) = &payload.metadata.git {
        let mut lines = Vec::new();
        if let Some(committer) = &git.committer {
            lines.push(format!("👤 *Committer:* {committer}"));
        }
        if let Some(branch) = &git.branch {
            lines.push(format!("🌿 *Branch:* `{branch}`"));
        }
        if !git.commit_sha.is_empty() {
            lines.push(format!("📝 *Commit:* `{}`", git.short_sha()));
        }
        if let Some(url) = &git.repo_url {
            lines.push(format!("🔗 *Repository:* {url}"));
        }
        text.push_str("\n\n*Git Context*\n");
        push_lines(&mut text, lines);
    }

    text
}

/// Append each line followed by a newline.
fn push_lines(text: &mut String, lines: impl IntoIterator<Item = String>) {
    for line in lines {
        text.push_str(&line);
        text.push('\n');
    }
}

fn status_emoji(status: DiffStatus) -> &'static str {
    match status {
        DiffStatus::Added => ":large_green_circle:",
        DiffStatus::Removed => ":red_circle:",
        DiffStatus::Changed | DiffStatus::Replaced => ":large_yellow_circle:",
    }
}

fn shows_values(status: DiffStatus) -> bool {
    matches!(status, DiffStatus::Changed | DiffStatus::Replaced)
}

fn format_resources(diffs: &[ResourceDiff]) -> String {
    let mut lines = Vec::new();

    for diff in diffs {
        lines.push(format!(
            "{} `{}.{}` - {}",
            status_emoji(diff.status),
            diff.resource_type,
            diff.resource_name,
            diff.status
        ));

        if !shows_values(diff.status) {
            continue;
        }
        lines.extend(
            diff.attribute_diffs
                .iter()
                .take(MAX_ATTRIBUTES)
                .map(|(attr, change)| {
                    format!(
                        "    • `{attr}`: `{}` → `{}`",
                        display_value(change.before.as_ref()),
                        display_value(change.after.as_ref())
                    )
                }),
        );
        if diff.attribute_diffs.len() > MAX_ATTRIBUTES {
            lines.push(format!(
                "    • _...and {} more attributes_",
                diff.attribute_diffs.len() - MAX_ATTRIBUTES
            ));
        }
    }

    let mut text = String::from("*Resource Changes*\n\n");
    push_lines(&mut text, lines);
    text
}

fn format_outputs(diffs: &[OutputDiff]) -> String {
    let mut sorted: Vec<&OutputDiff> = diffs.iter().collect();
    sorted.sort_by(|a, b| a.output_name.cmp(&b.output_name));

    let mut lines = Vec::new();
    for diff in sorted {
        lines.push(format!(
            "{} `{}` - {}",
            status_emoji(diff.status),
            diff.output_name,
            diff.status
        ));
        if shows_values(diff.status) {
            lines.push(format!(
                "    • `{}` → `{}`",
                display_value(diff.value_diff.before.as_ref()),
                display_value(diff.value_diff.after.as_ref())
            ));
        }
    }

    let mut text = String::from("*Output Changes*\n\n");
    push_lines(&mut text, lines);
    text
}

fn fallback_text(payload: &Payload) -> String {
    let kind = match payload.metadata.kind {
        PayloadKind::Plan => "plan",
        PayloadKind::State => "state",
    };

    let mut parts = Vec::new();
    let resources = payload.diffs.resource_diffs.len();
    let outputs = payload.diffs.output_diffs.len();
    if resources > 0 {
        parts.push(format!("{resources} resource(s)"));
    }
    if outputs > 0 {
        parts.push(format!("{outputs} output(s)"));
    }

    format!(
        "Terraform {kind} changes detected: {} changed",
        parts.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Source;
    use crate::git::GitMetadata;
    use crate::target::spawn_test_server;
    use crate::tfstate::{StateDiff, ValueDiff};
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    fn config(url: &str) -> SlackConfig {
        SlackConfig {
            webhook_url: url.to_string(),
            ..SlackConfig::default()
        }
    }

    fn resource(name: &str, status: DiffStatus, attrs: usize) -> ResourceDiff {
        ResourceDiff {
            address: format!("aws_instance.{name}"),
            resource_type: "aws_instance".to_string(),
            resource_name: name.to_string(),
            status,
            attribute_diffs: (0..attrs)
                .map(|i| {
                    (
                        format!("attr_{i}"),
                        ValueDiff {
                            before: Some(json!(format!("old{i}"))),
                            after: Some(json!(format!("new{i}"))),
                        },
                    )
                })
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn output(name: &str, status: DiffStatus) -> OutputDiff {
        OutputDiff {
            output_name: name.to_string(),
            status,
            value_diff: ValueDiff {
                before: Some(json!("10.0.1.15")),
                after: Some(json!("10.0.1.27")),
            },
            sensitive: false,
        }
    }

    fn plan_payload(diffs: StateDiff, git: Option<GitMetadata>) -> Payload {
        Payload::plan(
            diffs,
            Source::Plan {
                path: "plan.json".into(),
            },
            git,
        )
        .with_timestamp(Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 45).unwrap())
    }

    #[test]
    fn test_requires_url() {
        let err = SlackTarget::new(&config("")).unwrap_err();
        assert!(err.to_string().contains("slack webhook URL is required"));
    }

    #[test]
    fn test_message_structure() {
        let target = SlackTarget::new(&config("http://localhost")).unwrap();
        let diffs = StateDiff {
            resource_diffs: vec![resource("web", DiffStatus::Added, 0)],
            output_diffs: vec![output("instance_ip", DiffStatus::Changed)],
        };
        let message = target.build_message(&plan_payload(diffs, None));
        let json = serde_json::to_value(&message).unwrap();

        assert!(json.get("channel").is_none());
        assert!(json.get("username").is_none());
        assert!(json.get("icon_emoji").is_none());
        assert_eq!(
            json["text"],
            "Terraform plan changes detected: 1 resource(s), 1 output(s) changed"
        );

        let blocks = json["blocks"].as_array().unwrap();
        assert_eq!(blocks.len(), 5);
        assert_eq!(
            blocks[0],
            json!({"type": "header", "text": {"type": "plain_text", "text": "Terraform Plan Changes"}})
        );
        assert_eq!(blocks[1]["text"]["text"], "*Time:* 2024-01-15 10:30:45 UTC");
        assert_eq!(blocks[2], json!({"type": "divider"}));
        assert_eq!(
            blocks[3]["text"]["text"],
            "*Resource Changes*\n\n:large_green_circle: `aws_instance.web` - added\n"
        );
        assert_eq!(
            blocks[4]["text"]["text"],
            "*Output Changes*\n\n:large_yellow_circle: `instance_ip` - changed\n    • `10.0.1.15` → `10.0.1.27`\n"
        );
    }

    #[test]
    fn test_overrides_included() {
        let target = SlackTarget::new(&SlackConfig {
            webhook_url: "http://localhost".to_string(),
            channel: Some("#infra".to_string()),
            username: Some("infralog".to_string()),
            icon_emoji: Some(String::new()),
        })
        .unwrap();
        let message = target.build_message(&plan_payload(StateDiff::default(), None));
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["channel"], "#infra");
        assert_eq!(json["username"], "infralog");
        assert!(json.get("icon_emoji").is_none());
    }

    #[test]
    fn test_git_context() {
        let git = GitMetadata {
            committer: Some("Jane Doe".to_string()),
            commit_sha: "0123456789abcdef".to_string(),
            branch: Some("main".to_string()),
            repo_url: Some("git@github.com:acme/infra.git".to_string()),
        };
        let text = context_text(&plan_payload(StateDiff::default(), Some(git)));
        assert_eq!(
            text,
            "*Time:* 2024-01-15 10:30:45 UTC\n\n*Git Context*\n\
             👤 *Committer:* Jane Doe\n\
             🌿 *Branch:* `main`\n\
             📝 *Commit:* `01234567`\n\
             🔗 *Repository:* git@github.com:acme/infra.git\n"
        );
    }

    #[test]
    fn test_attribute_limit() {
        let text = format_resources(&[resource("app", DiffStatus::Replaced, 7)]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[2], ":large_yellow_circle: `aws_instance.app` - replaced");
        assert_eq!(lines[3], "    • `attr_0`: `old0` → `new0`");
        assert_eq!(lines.iter().filter(|l| l.contains("`attr_")).count(), 5);
        assert_eq!(lines.last().unwrap(), &"    • _...and 2 more attributes_");
    }

    #[test]
    fn test_removed_hides_attributes() {
        let text = format_resources(&[resource("old", DiffStatus::Removed, 2)]);
        assert_eq!(
            text,
            "*Resource Changes*\n\n:red_circle: `aws_instance.old` - removed\n"
        );
    }

    #[test]
    fn test_outputs_sorted() {
        let text = format_outputs(&[
            output("zeta", DiffStatus::Added),
            output("alpha", DiffStatus::Removed),
        ]);
        assert_eq!(
            text,
            "*Output Changes*\n\n:red_circle: `alpha` - removed\n:large_green_circle: `zeta` - added\n"
        );
    }

    #[test]
    fn test_state_header_and_fallback() {
        let payload = Payload::state(
            StateDiff {
                resource_diffs: vec![],
                output_diffs: vec![output("ip", DiffStatus::Changed)],
            },
            Source::Local {
                path: "terraform.tfstate".into(),
            },
            crate::config::TfStateConfig::default(),
        );
        let target = SlackTarget::new(&config("http://localhost")).unwrap();
        let message = target.build_message(&payload);
        assert_eq!(message.text, "Terraform state changes detected: 1 output(s) changed");
        assert_eq!(
            message.blocks[0].text.as_ref().unwrap().text,
            "Terraform State Changes"
        );
    }

    #[tokio::test]
    async fn test_posts_message() {
        let received: Arc<Mutex<Vec<Value>>> = Arc::default();
        let app = Router::new()
            .route(
                "/webhook",
                post(|State(r): State<Arc<Mutex<Vec<Value>>>>, Json(body): Json<Value>| async move {
                    r.lock().unwrap().push(body);
                    "ok"
                }),
            )
            .with_state(Arc::clone(&received));
        let url = format!("{}/webhook", spawn_test_server(app).await);

        let target = SlackTarget::new(&config(&url)).unwrap();
        let diffs = StateDiff {
            resource_diffs: vec![resource("web", DiffStatus::Changed, 1)],
            output_diffs: vec![],
        };
        target.write(&plan_payload(diffs, None)).await.unwrap();

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0]["blocks"][0]["type"], "header");
    }

    #[tokio::test]
    async fn test_error_status() {
        let app = Router::new().route(
            "/webhook",
            post(|| async { (StatusCode::FORBIDDEN, "invalid_token") }),
        );
        let url = format!("{}/webhook", spawn_test_server(app).await);

        let target = SlackTarget::new(&config(&url)).unwrap();
        let err = target
            .write(&plan_payload(StateDiff::default(), None))
            .await
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("slack request failed with status code: 403"));
    }
}
