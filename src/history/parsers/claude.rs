//! Claude export parser
//!
//! Parses `conversations.json` (array or single conversation) and
//! `projects.json` from a Claude data export.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::models::{
    Artifact, ArtifactCommand, Attachment, Citation, Conversation, ConversationMetadata, ImageRef,
    KnowledgeDoc, Message, Platform, Project, Sender, ToolCall,
};
use crate::history::types::{
    ClaudeArtifactInput, ClaudeChatMessage, ClaudeContentBlock, ClaudeConversation, ClaudeProject,
    CLAUDE_ROOT_PARENT,
};
use crate::shared::logging;

/// Legacy exports embed artifacts in the message text
static ANT_ARTIFACT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<antArtifact\s+([^>]*)>(.*?)</antArtifact>"#).expect("valid artifact regex")
});

static ATTRIBUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(\w+)="([^"]*)""#).expect("valid attribute regex"));

const ARTIFACT_TOOL: &str = "artifacts";

/// Parse every conversation of a Claude export. Malformed messages are skipped.
pub fn parse_claude_conversations(values: Vec<serde_json::Value>, file_name: &str) -> Vec<Conversation> {
    let mut conversations = Vec::with_capacity(values.len());
    for (idx, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<ClaudeConversation>(value) {
            Ok(raw) => conversations.push(convert_conversation(raw, file_name)),
            Err(e) => logging::log_record_skipped(file_name, idx, &e.to_string()),
        }
    }
    conversations
}

fn convert_conversation(raw: ClaudeConversation, file_name: &str) -> Conversation {
    let mut messages = Vec::with_capacity(raw.chat_messages.len());
    for (idx, value) in raw.chat_messages.into_iter().enumerate() {
        match serde_json::from_value::<ClaudeChatMessage>(value) {
            Ok(msg) => messages.push(convert_message(msg)),
            Err(e) => logging::log_record_skipped(file_name, idx, &e.to_string()),
        }
    }

    let title = raw
        .name
        .filter(|n| !n.trim().is_empty())
        .or_else(|| raw.summary.filter(|s| !s.trim().is_empty()))
        .unwrap_or_else(|| "Untitled conversation".to_string());

    Conversation {
        metadata: ConversationMetadata {
            uuid: raw.uuid,
            title,
            platform: Platform::Claude,
            model: raw.model,
            created_at: raw.created_at,
            updated_at: raw.updated_at,
        },
        messages,
    }
}

fn convert_message(raw: ClaudeChatMessage) -> Message {
    let sender = if raw.sender == "human" { Sender::Human } else { Sender::Assistant };
    let parent_uuid = raw
        .parent_message_uuid
        .filter(|p| !p.is_empty() && p != CLAUDE_ROOT_PARENT);

    let mut msg = Message::new(raw.uuid, parent_uuid, sender, String::new());
    msg.timestamp = raw.created_at;

    let mut texts: Vec<String> = Vec::new();
    let mut thinking: Vec<String> = Vec::new();

    for value in raw.content {
        let block = match serde_json::from_value::<ClaudeContentBlock>(value) {
            Ok(block) => block,
            Err(_) => continue,
        };
        match block {
            ClaudeContentBlock::Text { text, citations } => {
                if !text.trim().is_empty() {
                    texts.push(text);
                }
                for c in citations {
                    if let Some(citation) = citation_from_value(&c) {
                        push_citation(&mut msg.citations, citation);
                    }
                }
            }
            ClaudeContentBlock::Thinking { thinking: t } => {
                if !t.trim().is_empty() {
                    thinking.push(t);
                }
            }
            ClaudeContentBlock::ToolUse { id, name, input } => {
                if name == ARTIFACT_TOOL {
                    let parsed: ClaudeArtifactInput =
                        serde_json::from_value(input.clone()).unwrap_or_default();
                    msg.artifacts.push(artifact_from_input(parsed));
                } else {
                    msg.tools.push(ToolCall { id, name, input, result: None, is_error: false });
                }
            }
            ClaudeContentBlock::ToolResult { tool_use_id, content, is_error } => {
                for item in content.as_array().into_iter().flatten() {
                    if item.get("type").and_then(|t| t.as_str()) == Some("knowledge") {
                        if let Some(citation) = citation_from_value(item) {
                            push_citation(&mut msg.citations, citation);
                        }
                    }
                }
                let target = msg
                    .tools
                    .iter_mut()
                    .rev()
                    .find(|t| t.id.is_some() && t.id == tool_use_id);
                if let Some(tool) = target {
                    tool.result = Some(result_text(&content));
                    tool.is_error = is_error;
                }
            }
            ClaudeContentBlock::Other => {}
        }
    }

    let mut display = if texts.is_empty() { raw.text } else { texts.join("\n\n") };
    if ANT_ARTIFACT.is_match(&display) {
        let (stripped, legacy) = extract_legacy_artifacts(&display);
        display = stripped;
        msg.artifacts.extend(legacy);
    }
    msg.display_text = display;

    if !thinking.is_empty() {
        msg.thinking = Some(thinking.join("\n\n"));
    }

    msg.attachments = raw
        .attachments
        .into_iter()
        .map(|a| Attachment {
            file_name: a.file_name,
            file_type: a.file_type,
            file_size: a.file_size,
            extracted_content: a.extracted_content,
        })
        .collect();

    for file in raw.files_v2.into_iter().chain(raw.files) {
        if file.file_kind.as_deref().is_some_and(|k| k != "image") {
            continue;
        }
        if msg.images.iter().any(|i| i.file_name == file.file_name) {
            continue;
        }
        msg.images.push(ImageRef {
            file_name: file.file_name,
            mime_type: None,
            url: file.preview_url.or(file.thumbnail_url),
            data: None,
        });
    }

    msg
}

fn artifact_from_input(input: ClaudeArtifactInput) -> Artifact {
    let command = match input.command.as_deref() {
        Some("update") => ArtifactCommand::Update,
        Some("rewrite") => ArtifactCommand::Rewrite,
        _ => ArtifactCommand::Create,
    };
    Artifact {
        id: input.id,
        title: input.title.unwrap_or_else(|| "Untitled artifact".to_string()),
        artifact_type: input.artifact_type.unwrap_or_default(),
        command,
        content: input.content.unwrap_or_default(),
        old_str: input.old_str,
        new_str: input.new_str,
        language: input.language,
    }
}

/// Pull `<antArtifact ...>` blocks out of the text
fn extract_legacy_artifacts(text: &str) -> (String, Vec<Artifact>) {
    let mut artifacts = Vec::new();
    for caps in ANT_ARTIFACT.captures_iter(text) {
        let mut input = ClaudeArtifactInput::default();
        for attr in ATTRIBUTE.captures_iter(&caps[1]) {
            let value = attr[2].to_string();
            match &attr[1] {
                "identifier" => input.id = Some(value),
                "type" => input.artifact_type = Some(value),
                "title" => input.title = Some(value),
                "language" => input.language = Some(value),
                _ => {}
            }
        }
        input.content = Some(caps[2].trim().to_string());
        artifacts.push(artifact_from_input(input));
    }
    let stripped = ANT_ARTIFACT.replace_all(text, "").trim().to_string();
    (stripped, artifacts)
}

fn citation_from_value(value: &serde_json::Value) -> Option<Citation> {
    let url = value
        .get("url")
        .and_then(|u| u.as_str())
        .or_else(|| value.pointer("/metadata/url").and_then(|u| u.as_str()))?;
    if url.is_empty() {
        return None;
    }
    Some(Citation {
        title: value.get("title").and_then(|t| t.as_str()).map(String::from),
        url: url.to_string(),
        snippet: value.get("text").and_then(|t| t.as_str()).map(String::from),
    })
}

fn push_citation(citations: &mut Vec<Citation>, citation: Citation) {
    if !citations.iter().any(|c| c.url == citation.url) {
        citations.push(citation);
    }
}

fn result_text(content: &serde_json::Value) -> String {
    match content {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) => items
            .iter()
            .map(|item| match item.get("text").and_then(|t| t.as_str()) {
                Some(text) => text.to_string(),
                None => item.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Parse a Claude `projects.json` export
pub fn parse_claude_projects(values: Vec<serde_json::Value>, file_name: &str) -> Vec<Project> {
    let mut projects = Vec::new();
    for (idx, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<ClaudeProject>(value) {
            Ok(raw) => projects.push(Project {
                uuid: raw.uuid,
                name: raw.name,
                description: raw.description.filter(|d| !d.trim().is_empty()),
                system_prompt: raw.prompt_template.filter(|p| !p.trim().is_empty()),
                docs: raw
                    .docs
                    .into_iter()
                    .map(|d| KnowledgeDoc { file_name: d.filename, content: d.content, created_at: d.created_at })
                    .collect(),
                created_at: raw.created_at,
                updated_at: raw.updated_at,
            }),
            Err(e) => logging::log_record_skipped(file_name, idx, &e.to_string()),
        }
    }
    projects
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_conversation() -> serde_json::Value {
        serde_json::json!({
            "uuid": "conv-1",
            "name": "Rust help",
            "created_at": "2025-03-01T10:00:00Z",
            "updated_at": "2025-03-01T11:00:00Z",
            "chat_messages": [
                {
                    "uuid": "m1",
                    "text": "How do I sort?",
                    "content": [{"type": "text", "text": "How do I sort?"}],
                    "sender": "human",
                    "created_at": "2025-03-01T10:00:00Z",
                    "parent_message_uuid": CLAUDE_ROOT_PARENT,
                    "attachments": [{"file_name": "notes.txt", "file_size": 12, "file_type": "text/plain", "extracted_content": "some notes"}],
                    "files": [{"file_name": "shot.png", "file_kind": "image", "preview_url": "/img/shot.png"}]
                },
                {
                    "uuid": "m2",
                    "text": "",
                    "content": [
                        {"type": "thinking", "thinking": "User wants sorting."},
                        {"type": "text", "text": "Use sort_by.", "citations": [{"url": "https://doc.rust-lang.org", "title": "Docs"}]},
                        {"type": "tool_use", "id": "t1", "name": "artifacts", "input": {"id": "sort", "type": "application/vnd.ant.code", "title": "Sort example", "command": "create", "language": "rust", "content": "v.sort();"}},
                        {"type": "tool_use", "id": "t2", "name": "web_search", "input": {"query": "rust sort"}},
                        {"type": "tool_result", "tool_use_id": "t2", "content": [{"type": "knowledge", "title": "Sorting", "url": "https://example.com/sort", "text": "snippet"}]},
                        {"type": "mystery_block"}
                    ],
                    "sender": "assistant",
                    "created_at": "2025-03-01T10:00:05Z",
                    "parent_message_uuid": "m1"
                },
                {"uuid": "broken"}
            ]
        })
    }

    #[test]
    fn test_parse_claude_conversation() {
        let conversations = parse_claude_conversations(vec![sample_conversation()], "conversations.json");
        assert_eq!(conversations.len(), 1);
        let conv = &conversations[0];
        assert_eq!(conv.metadata.title, "Rust help");
        assert_eq!(conv.messages.len(), 2);

        let human = &conv.messages[0];
        assert_eq!(human.sender, Sender::Human);
        assert_eq!(human.parent_uuid, None);
        assert_eq!(human.attachments[0].file_name, "notes.txt");
        assert_eq!(human.images[0].url.as_deref(), Some("/img/shot.png"));

        let assistant = &conv.messages[1];
        assert_eq!(assistant.parent_uuid.as_deref(), Some("m1"));
        assert_eq!(assistant.display_text, "Use sort_by.");
        assert_eq!(assistant.thinking.as_deref(), Some("User wants sorting."));
        assert_eq!(assistant.artifacts.len(), 1);
        assert_eq!(assistant.artifacts[0].language.as_deref(), Some("rust"));
        assert_eq!(assistant.tools.len(), 1);
        assert_eq!(assistant.tools[0].name, "web_search");
        assert!(assistant.tools[0].result.is_some());
        assert_eq!(assistant.citations.len(), 2);
    }

    #[test]
    fn test_legacy_artifacts_are_extracted() {
        let text = r#"Here you go.
<antArtifact identifier="hello" type="application/vnd.ant.code" language="python" title="Hello">
print("hi")
</antArtifact>"#;
        let (stripped, artifacts) = extract_legacy_artifacts(text);
        assert_eq!(stripped, "Here you go.");
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].title, "Hello");
        assert_eq!(artifacts[0].language.as_deref(), Some("python"));
        assert_eq!(artifacts[0].content, "print(\"hi\")");
    }

    #[test]
    fn test_parse_projects() {
        let values = vec![serde_json::json!({
            "uuid": "p1",
            "name": "Research",
            "description": "",
            "prompt_template": "Be terse.",
            "docs": [{"filename": "brief.md", "content": "# Brief"}]
        })];
        let projects = parse_claude_projects(values, "projects.json");
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].description, None);
        assert_eq!(projects[0].system_prompt.as_deref(), Some("Be terse."));
        assert_eq!(projects[0].docs[0].file_name, "brief.md");
    }
}
