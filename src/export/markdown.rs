//! Markdown export
//!
//! Output: optional YAML front matter, a document header, one block per
//! message surviving the filter, and a footer when filtering dropped some.

use std::fmt::Write as _;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::domain::models::{Artifact, Message, Sender};
use crate::overlay::MarkKind;
use crate::shared::errors::ExportError;
use crate::shared::logging::{self, LogOperation};

use super::filename::export_filename;
use super::naming::artifact_extension;
use super::numbering::{format_number, NumberingStyle};
use super::source::ExportSource;

/// Which messages survive, based on their marks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageFilter {
    pub exclude_deleted: bool,
    pub only_completed: bool,
    pub only_important: bool,
}

impl Default for MessageFilter {
    fn default() -> Self {
        Self { exclude_deleted: true, only_completed: false, only_important: false }
    }
}

impl MessageFilter {
    /// Selected "only" filters combine with AND
    pub fn accepts(&self, source: &ExportSource<'_>, message: &Message) -> bool {
        if self.exclude_deleted && source.is_marked(message, MarkKind::Deleted) {
            return false;
        }
        if self.only_completed && !source.is_marked(message, MarkKind::Completed) {
            return false;
        }
        if self.only_important && !source.is_marked(message, MarkKind::Important) {
            return false;
        }
        true
    }

    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if self.exclude_deleted {
            parts.push("excluding deleted");
        }
        if self.only_completed {
            parts.push("only completed");
        }
        if self.only_important {
            parts.push("only important");
        }
        if parts.is_empty() {
            "all messages".to_string()
        } else {
            parts.join(", ")
        }
    }

    /// Messages in source order that pass the filter
    pub fn apply<'m>(&self, source: &ExportSource<'m>) -> Vec<&'m Message> {
        source.messages.iter().filter(|m| self.accepts(source, m)).collect()
    }
}

/// Labels used for each sender in titles
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "scheme")]
pub enum SenderLabels {
    /// User / AI
    #[default]
    Default,
    /// Human / Assistant
    HumanAssistant,
    Custom { human: String, assistant: String },
}

impl SenderLabels {
    pub fn label(&self, sender: Sender) -> &str {
        match (self, sender) {
            (SenderLabels::Default, Sender::Human) => "User",
            (SenderLabels::Default, Sender::Assistant) => "AI",
            (SenderLabels::HumanAssistant, Sender::Human) => "Human",
            (SenderLabels::HumanAssistant, Sender::Assistant) => "Assistant",
            (SenderLabels::Custom { human, .. }, Sender::Human) => human.as_str(),
            (SenderLabels::Custom { assistant, .. }, Sender::Assistant) => assistant.as_str(),
        }
    }
}

/// Where and how thinking is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThinkingFormat {
    /// Before the body, as a fenced `thinking` block
    #[default]
    CodeBlock,
    /// Before the body, inside `<thinking>` tags
    XmlTag,
    /// After the body, quoted under an emoji label
    Emoji,
}

impl ThinkingFormat {
    pub fn is_front_loaded(&self) -> bool {
        !matches!(self, ThinkingFormat::Emoji)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkdownOptions {
    pub filter: MessageFilter,
    pub numbering: NumberingStyle,
    /// 0 = bold title line, 1 = `#`, 2 = `##`
    pub heading_level: u8,
    pub sender_labels: SenderLabels,
    pub thinking_format: ThinkingFormat,
    pub front_matter: bool,
    pub include_timestamps: bool,
    pub include_thinking: bool,
    pub include_attachments: bool,
    pub include_artifacts: bool,
    pub include_tools: bool,
    pub include_citations: bool,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            filter: MessageFilter::default(),
            numbering: NumberingStyle::Numeric,
            heading_level: 2,
            sender_labels: SenderLabels::Default,
            thinking_format: ThinkingFormat::CodeBlock,
            front_matter: false,
            include_timestamps: true,
            include_thinking: true,
            include_attachments: true,
            include_artifacts: true,
            include_tools: true,
            include_citations: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MarkdownExport {
    pub file_name: String,
    pub content: String,
    pub exported_count: usize,
    pub total_count: usize,
}

/// Render `source` to a markdown document
pub fn generate_markdown(
    source: &ExportSource<'_>,
    options: &MarkdownOptions,
    exported_at: DateTime<Local>,
) -> Result<MarkdownExport, ExportError> {
    let title = source.title();
    let total = source.messages.len();
    if total == 0 {
        return Err(ExportError::EmptyInput(format!("{} has no messages", title)));
    }
    logging::log_export_start(LogOperation::MarkdownExport, title, total);

    let selected = options.filter.apply(source);
    if selected.is_empty() {
        return Err(ExportError::EmptyInput(format!(
            "no messages in {} match the filter ({})",
            title,
            options.filter.describe()
        )));
    }

    let mut out = String::new();
    if options.front_matter {
        write_front_matter(&mut out, source, selected.len(), exported_at);
    }
    write_header(&mut out, source, options, exported_at);

    for (idx, message) in selected.iter().enumerate() {
        write_message(&mut out, message, idx + 1, options);
    }

    if selected.len() < total {
        let _ = writeln!(out, "*Exported {} of {} messages*", selected.len(), total);
    }

    let file_name = export_filename(title, "md", exported_at.date_naive());
    logging::log_export_result(LogOperation::MarkdownExport, &file_name, out.len());
    Ok(MarkdownExport {
        file_name,
        content: out,
        exported_count: selected.len(),
        total_count: total,
    })
}

fn yaml_quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn write_front_matter(out: &mut String, source: &ExportSource<'_>, count: usize, exported_at: DateTime<Local>) {
    let meta = source.metadata;
    out.push_str("---\n");
    let _ = writeln!(out, "title: {}", yaml_quote(source.title()));
    let _ = writeln!(out, "uuid: {}", yaml_quote(&meta.uuid));
    let _ = writeln!(out, "platform: {}", meta.platform.display_name());
    if let Some(model) = &meta.model {
        let _ = writeln!(out, "model: {}", yaml_quote(model));
    }
    if let Some(created) = &meta.created_at {
        let _ = writeln!(out, "created_at: {}", yaml_quote(created));
    }
    let _ = writeln!(out, "exported_at: {}", yaml_quote(&exported_at.to_rfc3339()));
    let _ = writeln!(out, "messages: {}", count);
    out.push_str("---\n\n");
}

fn write_header(out: &mut String, source: &ExportSource<'_>, options: &MarkdownOptions, exported_at: DateTime<Local>) {
    let meta = source.metadata;
    let _ = writeln!(out, "# {}\n", source.title());
    let _ = writeln!(out, "- **Platform:** {}", meta.platform);
    if let Some(model) = &meta.model {
        let _ = writeln!(out, "- **Model:** {}", model);
    }
    if let Some(created) = &meta.created_at {
        let _ = writeln!(out, "- **Created:** {}", created);
    }
    let _ = writeln!(out, "- **Exported:** {}", exported_at.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out, "- **Filter:** {}", options.filter.describe());
    out.push_str("\n---\n\n");
}

fn title_line(message: &Message, number: usize, options: &MarkdownOptions) -> String {
    let mut text = String::new();
    let label = format_number(options.numbering, number);
    if !label.is_empty() {
        text.push_str(&label);
        text.push(' ');
    }
    text.push_str(options.sender_labels.label(message.sender));
    if !message.branch.is_main() {
        let _ = write!(text, " `[{}]`", message.branch.branch_id);
    }
    match options.heading_level {
        0 => format!("**{}**", text),
        level => format!("{} {}", "#".repeat(level.min(2) as usize), text),
    }
}

fn write_message(out: &mut String, message: &Message, number: usize, options: &MarkdownOptions) {
    let _ = writeln!(out, "{}\n", title_line(message, number, options));

    if options.include_timestamps {
        if let Some(ts) = &message.timestamp {
            let _ = writeln!(out, "*{}*\n", ts);
        }
    }

    let thinking = message.thinking_text().filter(|_| options.include_thinking);
    if let Some(thinking) = thinking.filter(|_| options.thinking_format.is_front_loaded()) {
        match options.thinking_format {
            ThinkingFormat::XmlTag => {
                let _ = writeln!(out, "<thinking>\n{}\n</thinking>\n", thinking.trim_end());
            }
            _ => {
                let _ = writeln!(out, "{}\n", fenced(thinking, "thinking"));
            }
        }
    }

    if message.has_text() {
        let _ = writeln!(out, "{}\n", message.display_text.trim_end());
    }

    if options.include_attachments && message.sender.is_human() && !message.attachments.is_empty() {
        out.push_str("📎 **Attachments:**\n\n");
        for attachment in &message.attachments {
            let mut line = format!("- `{}`", attachment.file_name);
            if let Some(size) = attachment.file_size {
                let _ = write!(line, " ({} bytes)", size);
            }
            let _ = writeln!(out, "{}", line);
        }
        out.push('\n');
        for attachment in &message.attachments {
            if let Some(content) = attachment.extracted_content.as_deref().filter(|c| !c.trim().is_empty()) {
                let _ = writeln!(out, "<details><summary>{}</summary>\n", attachment.file_name);
                let _ = writeln!(out, "{}\n", fenced(content, ""));
                out.push_str("</details>\n\n");
            }
        }
    }

    if let Some(thinking) = thinking.filter(|_| !options.thinking_format.is_front_loaded()) {
        out.push_str("💭 **Thinking:**\n\n");
        for line in thinking.trim_end().lines() {
            let _ = writeln!(out, "> {}", line);
        }
        out.push('\n');
    }

    if options.include_artifacts && !message.sender.is_human() {
        for artifact in &message.artifacts {
            write_artifact(out, artifact);
        }
    }

    if options.include_tools {
        for tool in &message.tools {
            let _ = writeln!(out, "🔧 **Tool: {}**\n", tool.name);
            if !tool.input.is_null() {
                let input = serde_json::to_string_pretty(&tool.input).unwrap_or_else(|_| tool.input.to_string());
                let _ = writeln!(out, "{}\n", fenced(&input, "json"));
            }
            if let Some(result) = &tool.result {
                let label = if tool.is_error { "Error" } else { "Result" };
                let _ = writeln!(out, "*{}:*\n\n{}\n", label, fenced(result.trim_end(), ""));
            }
        }
    }

    if options.include_citations && !message.citations.is_empty() {
        out.push_str("| # | Source | URL |\n|---|---|---|\n");
        for (i, citation) in message.citations.iter().enumerate() {
            let title = citation.title.as_deref().unwrap_or("");
            let _ = writeln!(out, "| {} | {} | {} |", i + 1, escape_cell(title), escape_cell(&citation.url));
        }
        out.push('\n');
    }

    out.push_str("---\n\n");
}

fn write_artifact(out: &mut String, artifact: &Artifact) {
    let _ = writeln!(out, "📄 **Artifact: {}** ({:?})\n", artifact.title, artifact.command);
    if !artifact.content.is_empty() {
        let _ = writeln!(out, "{}\n", fenced(&artifact.content, artifact_extension(artifact)));
    } else if artifact.old_str.is_some() || artifact.new_str.is_some() {
        let old = artifact.old_str.as_deref().unwrap_or_default();
        let new = artifact.new_str.as_deref().unwrap_or_default();
        let diff: String = old
            .lines()
            .map(|l| format!("- {}\n", l))
            .chain(new.lines().map(|l| format!("+ {}\n", l)))
            .collect();
        let _ = writeln!(out, "{}\n", fenced(&diff, "diff"));
    }
}

/// Fenced block whose fence is longer than any backtick run in `body`
fn fenced(body: &str, info: &str) -> String {
    let mut longest = 0;
    let mut run = 0;
    for c in body.chars() {
        if c == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    let fence = "`".repeat(longest.max(2) + 1);
    format!("{}{}\n{}\n{}", fence, info, body.trim_end_matches('\n'), fence)
}

fn escape_cell(value: &str) -> String {
    value.replace('|', "\\|").replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ArtifactCommand, Citation, ConversationMetadata, Platform};
    use crate::overlay::{toggle_mark, MemoryOverlayStore};

    fn make_metadata() -> ConversationMetadata {
        ConversationMetadata {
            uuid: "c1".into(),
            title: "Rust Q&A".into(),
            platform: Platform::Claude,
            model: Some("claude-3-opus".into()),
            created_at: Some("2024-01-01T00:00:00Z".into()),
            updated_at: None,
        }
    }

    fn make_messages(n: usize) -> Vec<Message> {
        (1..=n)
            .map(|i| {
                let sender = if i % 2 == 1 { Sender::Human } else { Sender::Assistant };
                Message::new(format!("m{}", i), None, sender, format!("message body {}", i))
            })
            .collect()
    }

    #[test]
    fn test_filter_deleted_and_important() {
        let metadata = make_metadata();
        let messages = make_messages(6);
        let store = MemoryOverlayStore::new();
        toggle_mark(&store, "s", "m2", MarkKind::Deleted);
        toggle_mark(&store, "s", "m5", MarkKind::Deleted);
        toggle_mark(&store, "s", "m3", MarkKind::Important);
        let source = ExportSource::new(&metadata, &messages).with_overlays(&store, "s").unwrap();

        let options = MarkdownOptions {
            filter: MessageFilter { exclude_deleted: true, only_completed: false, only_important: true },
            ..MarkdownOptions::default()
        };
        let export = generate_markdown(&source, &options, Local::now()).unwrap();
        assert_eq!(export.exported_count, 1);
        assert!(export.content.contains("message body 3"));
        for excluded in [1, 2, 4, 5, 6] {
            assert!(!export.content.contains(&format!("message body {}", excluded)));
        }
        assert!(export.content.contains("*Exported 1 of 6 messages*"));
    }

    #[test]
    fn test_no_footer_when_unfiltered() {
        let metadata = make_metadata();
        let messages = make_messages(2);
        let source = ExportSource::new(&metadata, &messages);
        let export = generate_markdown(&source, &MarkdownOptions::default(), Local::now()).unwrap();
        assert!(!export.content.contains("Exported 2 of 2"));
        assert!(export.content.starts_with("# Rust Q&A\n"));
        assert!(export.content.contains("## 1. User"));
        assert!(export.content.contains("## 2. AI"));
        assert!(export.file_name.starts_with("Rust_Q&A_"));
    }

    #[test]
    fn test_render_order_and_formats() {
        let metadata = make_metadata();
        let mut msg = Message::new("a", None, Sender::Assistant, "BODY");
        msg.thinking = Some("THOUGHT".into());
        msg.timestamp = Some("2024-01-01T10:00:00Z".into());
        msg.branch.branch_id = "branch-2".into();
        msg.artifacts.push(Artifact {
            id: None,
            title: "script".into(),
            artifact_type: "application/vnd.ant.code".into(),
            command: ArtifactCommand::Create,
            content: "print(1)".into(),
            old_str: None,
            new_str: None,
            language: Some("python".into()),
        });
        msg.citations.push(Citation { title: Some("A|B".into()), url: "https://x.y".into(), snippet: None });
        let messages = vec![msg];
        let source = ExportSource::new(&metadata, &messages);

        let options = MarkdownOptions {
            numbering: NumberingStyle::Roman,
            heading_level: 1,
            sender_labels: SenderLabels::HumanAssistant,
            ..MarkdownOptions::default()
        };
        let md = generate_markdown(&source, &options, Local::now()).unwrap().content;
        assert!(md.contains("# I. Assistant `[branch-2]`"));
        let pos = |needle: &str| md.find(needle).unwrap();
        assert!(pos("*2024-01-01T10:00:00Z*") < pos("```thinking"));
        assert!(pos("```thinking") < pos("BODY"));
        assert!(pos("BODY") < pos("```py\nprint(1)"));
        assert!(pos("```py") < pos("| 1 | A\\|B | https://x.y |"));

        let emoji = MarkdownOptions { thinking_format: ThinkingFormat::Emoji, heading_level: 0, ..options };
        let md = generate_markdown(&source, &emoji, Local::now()).unwrap().content;
        assert!(md.contains("**I. Assistant `[branch-2]`**"));
        assert!(md.find("BODY").unwrap() < md.find("> THOUGHT").unwrap());
    }

    #[test]
    fn test_front_matter_and_custom_labels() {
        let metadata = make_metadata();
        let messages = make_messages(1);
        let source = ExportSource::new(&metadata, &messages);
        let options = MarkdownOptions {
            front_matter: true,
            numbering: NumberingStyle::Letter,
            sender_labels: SenderLabels::Custom { human: "Me".into(), assistant: "Bot".into() },
            ..MarkdownOptions::default()
        };
        let md = generate_markdown(&source, &options, Local::now()).unwrap().content;
        assert!(md.starts_with("---\ntitle: \"Rust Q&A\"\n"));
        assert!(md.contains("platform: Claude"));
        assert!(md.contains("## A. Me"));
    }

    #[test]
    fn test_empty_inputs() {
        let metadata = make_metadata();
        let source = ExportSource::new(&metadata, &[]);
        assert!(matches!(
            generate_markdown(&source, &MarkdownOptions::default(), Local::now()),
            Err(ExportError::EmptyInput(_))
        ));

        let messages = make_messages(2);
        let source = ExportSource::new(&metadata, &messages);
        let options = MarkdownOptions {
            filter: MessageFilter { only_completed: true, ..MessageFilter::default() },
            ..MarkdownOptions::default()
        };
        assert!(matches!(generate_markdown(&source, &options, Local::now()), Err(ExportError::EmptyInput(_))));
    }

    #[test]
    fn test_fence_outgrows_backticks() {
        assert_eq!(fenced("a ```b``` c", "md"), "````md\na ```b``` c\n````");
    }
}
