//! Per-element extraction for granular exports
//!
//! Every extractable part of a message becomes one [`ExportElement`] with a
//! deterministic name (see [`super::naming`]). Elements are numbered in a
//! fixed order: text, thinking, artifacts, tool calls, the citations block,
//! attachments, images.

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::domain::models::{Artifact, ArtifactCommand, Citation, Message, ToolCall};
use crate::shared::errors::ExportError;
use crate::shared::logging;

use super::naming::{artifact_extension, element_filename, file_extension, mime_extension, ElementType};

/// One exportable file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportElement {
    pub file_name: String,
    pub element_type: ElementType,
    /// Position among elements of the same type (0-based)
    pub type_index: usize,
    pub content: Vec<u8>,
}

impl ExportElement {
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.content).ok()
    }
}

struct ElementSink<'a> {
    message: &'a Message,
    ordinal: usize,
    sequence: usize,
    elements: Vec<ExportElement>,
}

impl<'a> ElementSink<'a> {
    fn push(&mut self, element_type: ElementType, type_index: usize, extension: &str, content: Vec<u8>) {
        self.sequence += 1;
        let file_name = element_filename(
            self.ordinal,
            self.message.sender,
            &self.message.branch.branch_id,
            self.sequence,
            element_type,
            extension,
        );
        self.elements.push(ExportElement { file_name, element_type, type_index, content });
    }
}

/// All available elements of `message` (1-based `ordinal` within its conversation).
/// Missing parts are simply absent.
pub fn extract_elements(message: &Message, ordinal: usize) -> Vec<ExportElement> {
    let mut sink = ElementSink { message, ordinal, sequence: 0, elements: Vec::new() };

    if message.has_text() {
        sink.push(ElementType::Message, 0, "md", message.display_text.clone().into_bytes());
    }

    if let Some(thinking) = message.thinking_text() {
        sink.push(ElementType::Thinking, 0, "md", thinking.as_bytes().to_vec());
    }

    for (i, artifact) in message.artifacts.iter().enumerate() {
        sink.push(ElementType::Artifact, i, artifact_extension(artifact), artifact_body(artifact).into_bytes());
    }

    for (i, tool) in message.tools.iter().enumerate() {
        sink.push(ElementType::Tool, i, "md", render_tool_markdown(tool).into_bytes());
    }

    if !message.citations.is_empty() {
        sink.push(ElementType::Citation, 0, "md", render_citations_markdown(&message.citations).into_bytes());
    }

    for (i, attachment) in message.attachments.iter().enumerate() {
        let Some(content) = attachment.extracted_content.as_deref() else {
            logging::log_element_skipped(&message.uuid, &attachment.file_name, "no extracted content");
            continue;
        };
        let ext = file_extension(&attachment.file_name).unwrap_or_else(|| "txt".to_string());
        sink.push(ElementType::Attachment, i, &ext, content.as_bytes().to_vec());
    }

    for (i, image) in message.images.iter().enumerate() {
        let Some(data) = image.data.as_deref() else {
            logging::log_element_skipped(&message.uuid, &image.file_name, "no inline data");
            continue;
        };
        match decode_base64_payload(data) {
            Ok(bytes) => {
                let ext = file_extension(&image.file_name)
                    .or_else(|| image.mime_type.as_deref().and_then(mime_extension).map(String::from))
                    .unwrap_or_else(|| "png".to_string());
                sink.push(ElementType::Image, i, &ext, bytes);
            }
            Err(e) => logging::log_element_skipped(&message.uuid, &image.file_name, &e.to_string()),
        }
    }

    sink.elements
}

/// Accepts raw base64 or a `data:*;base64,` URL
fn decode_base64_payload(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let payload = match data.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => data,
    };
    base64::engine::general_purpose::STANDARD.decode(payload.trim())
}

fn artifact_body(artifact: &Artifact) -> String {
    match artifact.command {
        ArtifactCommand::Update if artifact.content.is_empty() => format!(
            "<<<<<<< old\n{}\n=======\n{}\n>>>>>>> new\n",
            artifact.old_str.as_deref().unwrap_or_default(),
            artifact.new_str.as_deref().unwrap_or_default()
        ),
        _ => artifact.content.clone(),
    }
}

/// Tool call as a small markdown document (input + result)
pub fn render_tool_markdown(tool: &ToolCall) -> String {
    let mut out = format!("# Tool: {}\n", tool.name);
    if !tool.input.is_null() {
        let input = serde_json::to_string_pretty(&tool.input).unwrap_or_else(|_| tool.input.to_string());
        out.push_str(&format!("\n## Input\n\n```json\n{}\n```\n", input));
    }
    if let Some(result) = &tool.result {
        let heading = if tool.is_error { "Error" } else { "Result" };
        out.push_str(&format!("\n## {}\n\n```\n{}\n```\n", heading, result.trim_end()));
    }
    out
}

/// All citations of a message as one numbered markdown list
pub fn render_citations_markdown(citations: &[Citation]) -> String {
    let mut out = String::from("# Citations\n\n");
    for (i, citation) in citations.iter().enumerate() {
        let title = citation.title.as_deref().filter(|t| !t.is_empty()).unwrap_or(&citation.url);
        out.push_str(&format!("{}. [{}]({})\n", i + 1, title, citation.url));
        if let Some(snippet) = citation.snippet.as_deref().filter(|s| !s.trim().is_empty()) {
            out.push_str(&format!("   > {}\n", snippet.trim().replace('\n', " ")));
        }
    }
    out
}

fn find_element(
    message: &Message,
    ordinal: usize,
    element_type: ElementType,
    type_index: usize,
    what: &str,
) -> Result<ExportElement, ExportError> {
    extract_elements(message, ordinal)
        .into_iter()
        .find(|e| e.element_type == element_type && e.type_index == type_index)
        .ok_or_else(|| ExportError::NotAvailable {
            what: what.to_string(),
            message_uuid: message.uuid.clone(),
        })
}

/// Message text only
pub fn export_text(message: &Message, ordinal: usize) -> Result<ExportElement, ExportError> {
    find_element(message, ordinal, ElementType::Message, 0, "text")
}

pub fn export_thinking(message: &Message, ordinal: usize) -> Result<ExportElement, ExportError> {
    find_element(message, ordinal, ElementType::Thinking, 0, "thinking")
}

pub fn export_artifact(message: &Message, ordinal: usize, index: usize) -> Result<ExportElement, ExportError> {
    find_element(message, ordinal, ElementType::Artifact, index, &format!("artifact #{}", index + 1))
}

pub fn export_tool(message: &Message, ordinal: usize, index: usize) -> Result<ExportElement, ExportError> {
    find_element(message, ordinal, ElementType::Tool, index, &format!("tool call #{}", index + 1))
}

pub fn export_citations(message: &Message, ordinal: usize) -> Result<ExportElement, ExportError> {
    find_element(message, ordinal, ElementType::Citation, 0, "citations")
}

pub fn export_attachment(message: &Message, ordinal: usize, index: usize) -> Result<ExportElement, ExportError> {
    find_element(message, ordinal, ElementType::Attachment, index, &format!("attachment #{}", index + 1))
}

pub fn export_image(message: &Message, ordinal: usize, index: usize) -> Result<ExportElement, ExportError> {
    find_element(message, ordinal, ElementType::Image, index, &format!("image #{}", index + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Attachment, ImageRef, Sender};
    use std::collections::HashSet;

    fn make_artifact(title: &str, language: &str) -> Artifact {
        Artifact {
            id: None,
            title: title.into(),
            artifact_type: "application/vnd.ant.code".into(),
            command: ArtifactCommand::Create,
            content: format!("// {}", title),
            old_str: None,
            new_str: None,
            language: Some(language.into()),
        }
    }

    fn make_rich_message() -> Message {
        let mut msg = Message::new("m7", None, Sender::Assistant, "Here you go");
        msg.thinking = Some("let me think".into());
        msg.artifacts = vec![make_artifact("one", "rust"), make_artifact("two", "python")];
        msg.tools = vec![ToolCall {
            id: Some("t1".into()),
            name: "web_search".into(),
            input: serde_json::json!({"query": "rust"}),
            result: Some("ok".into()),
            is_error: false,
        }];
        msg.citations = vec![Citation { title: Some("Docs".into()), url: "https://doc.rust-lang.org".into(), snippet: None }];
        msg.attachments = vec![Attachment {
            file_name: "notes.txt".into(),
            file_type: Some("text/plain".into()),
            file_size: Some(5),
            extracted_content: Some("notes".into()),
        }];
        msg.images = vec![ImageRef {
            file_name: "shot".into(),
            mime_type: Some("image/png".into()),
            url: None,
            data: Some("data:image/png;base64,iVBORw0KGgo=".into()),
        }];
        msg
    }

    #[test]
    fn test_human_message_with_artifacts_naming() {
        let mut msg = Message::new("u", None, Sender::Human, "hello");
        msg.artifacts = vec![make_artifact("a", "rust"), make_artifact("b", "typescript")];
        let names: Vec<String> = extract_elements(&msg, 7).into_iter().map(|e| e.file_name).collect();
        assert_eq!(
            names,
            vec!["007-USER-M-001-message.md", "007-USER-M-002-artefato.rs", "007-USER-M-003-artefato.ts"]
        );
    }

    #[test]
    fn test_fixed_element_order_and_unique_names() {
        let mut msg = make_rich_message();
        msg.branch.branch_id = "branch-2".into();
        let elements = extract_elements(&msg, 3);
        let types: Vec<ElementType> = elements.iter().map(|e| e.element_type).collect();
        assert_eq!(
            types,
            vec![
                ElementType::Message,
                ElementType::Thinking,
                ElementType::Artifact,
                ElementType::Artifact,
                ElementType::Tool,
                ElementType::Citation,
                ElementType::Attachment,
                ElementType::Image,
            ]
        );
        assert_eq!(elements[0].file_name, "003-IA-T02-001-message.md");
        assert_eq!(elements[6].file_name, "003-IA-T02-007-anexo.txt");
        assert_eq!(elements[7].file_name, "003-IA-T02-008-imagem.png");
        assert_eq!(&elements[7].content[..4], &[0x89, b'P', b'N', b'G']);

        let unique: HashSet<&str> = elements.iter().map(|e| e.file_name.as_str()).collect();
        assert_eq!(unique.len(), elements.len());
    }

    #[test]
    fn test_single_element_exports() {
        let msg = make_rich_message();
        assert_eq!(export_thinking(&msg, 1).unwrap().as_text(), Some("let me think"));
        assert_eq!(export_artifact(&msg, 1, 1).unwrap().file_name, "001-IA-M-004-artefato.py");
        let tool = export_tool(&msg, 1, 0).unwrap();
        assert!(tool.as_text().unwrap().contains("\"query\": \"rust\""));
        assert!(export_citations(&msg, 1).unwrap().as_text().unwrap().contains("[Docs](https://doc.rust-lang.org)"));
    }

    #[test]
    fn test_missing_elements_are_not_available() {
        let msg = Message::new("plain", None, Sender::Human, "just text");
        assert!(matches!(export_thinking(&msg, 1), Err(ExportError::NotAvailable { .. })));
        assert!(matches!(export_artifact(&msg, 1, 0), Err(ExportError::NotAvailable { .. })));
        assert!(matches!(export_image(&msg, 1, 0), Err(ExportError::NotAvailable { .. })));
        assert_eq!(extract_elements(&msg, 1).len(), 1);
    }

    #[test]
    fn test_update_artifact_body() {
        let mut artifact = make_artifact("u", "rust");
        artifact.command = ArtifactCommand::Update;
        artifact.content.clear();
        artifact.old_str = Some("a".into());
        artifact.new_str = Some("b".into());
        assert_eq!(artifact_body(&artifact), "<<<<<<< old\na\n=======\nb\n>>>>>>> new\n");
    }
}
