//! Export format detection and normalization
//!
//! Turns the raw bytes of a loaded file into uniform [`Conversation`]s
//! (and [`Project`]s for project exports). One parse pass per file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::models::{Conversation, Project};
use crate::shared::errors::NormalizeError;
use crate::shared::logging;

use super::branches::{detect_branches, BranchPolicy};
use super::parsers::{
    looks_like_sillytavern, parse_claude_conversations, parse_claude_projects, parse_gemini_prompt,
    parse_sillytavern_lines,
};
use super::tree::BranchWarning;
use super::types::GeminiPrompt;

/// Detected source format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    ClaudeConversations,
    ClaudeProjects,
    Gemini,
    SillyTavern,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::ClaudeConversations => "claude_conversations",
            ExportFormat::ClaudeProjects => "claude_projects",
            ExportFormat::Gemini => "gemini",
            ExportFormat::SillyTavern => "sillytavern",
        }
    }
}

/// Everything one file contributed
#[derive(Debug, Clone)]
pub struct ParsedExport {
    pub format: ExportFormat,
    pub conversations: Vec<Conversation>,
    pub projects: Vec<Project>,
    /// Graph repairs per conversation uuid (only set by [`load_export`])
    pub warnings: Vec<(String, Vec<BranchWarning>)>,
}

/// Detect the format of `bytes` and normalize it. Messages are not yet branch-annotated.
pub fn normalize(bytes: &[u8], file_name: &str) -> Result<ParsedExport, NormalizeError> {
    let text = std::str::from_utf8(bytes).map_err(|_| NormalizeError::InvalidUtf8(file_name.to_string()))?;
    let text = text.trim_start_matches('\u{feff}').trim();
    if text.is_empty() {
        return Err(NormalizeError::EmptyInput(file_name.to_string()));
    }

    let parsed = match serde_json::from_str::<serde_json::Value>(text) {
        Ok(value) => normalize_json(value, file_name)?,
        Err(json_err) => {
            let lines = parse_json_lines(text);
            if lines.is_empty() || !looks_like_sillytavern(&lines) {
                return Err(if is_jsonl_name(file_name) {
                    NormalizeError::UnknownFormat(file_name.to_string())
                } else {
                    NormalizeError::InvalidJson(json_err)
                });
            }
            ParsedExport {
                format: ExportFormat::SillyTavern,
                conversations: vec![parse_sillytavern_lines(lines, file_name)],
                projects: Vec::new(),
                warnings: Vec::new(),
            }
        }
    };

    logging::log_format_detected(file_name, parsed.format.as_str());
    let message_count = parsed.conversations.iter().map(|c| c.messages.len()).sum();
    logging::log_normalize_result(file_name, parsed.conversations.len(), message_count);
    Ok(parsed)
}

fn normalize_json(value: serde_json::Value, file_name: &str) -> Result<ParsedExport, NormalizeError> {
    let single = |format, conversations, projects| ParsedExport {
        format,
        conversations,
        projects,
        warnings: Vec::new(),
    };

    match value {
        serde_json::Value::Array(items) => {
            let Some(first) = items.iter().find(|v| v.is_object()) else {
                return Err(NormalizeError::EmptyInput(file_name.to_string()));
            };
            if first.get("chat_messages").is_some() {
                let conversations = parse_claude_conversations(items, file_name);
                Ok(single(ExportFormat::ClaudeConversations, conversations, Vec::new()))
            } else if first.get("docs").is_some() || first.get("prompt_template").is_some() {
                let projects = parse_claude_projects(items, file_name);
                Ok(single(ExportFormat::ClaudeProjects, Vec::new(), projects))
            } else if looks_like_sillytavern(&items) {
                Ok(single(ExportFormat::SillyTavern, vec![parse_sillytavern_lines(items, file_name)], Vec::new()))
            } else {
                Err(NormalizeError::UnknownFormat(file_name.to_string()))
            }
        }
        serde_json::Value::Object(ref map) if map.contains_key("chat_messages") => {
            let conversations = parse_claude_conversations(vec![value], file_name);
            Ok(single(ExportFormat::ClaudeConversations, conversations, Vec::new()))
        }
        serde_json::Value::Object(ref map) if map.contains_key("chunkedPrompt") => {
            let prompt: GeminiPrompt = serde_json::from_value(value)?;
            Ok(single(ExportFormat::Gemini, vec![parse_gemini_prompt(prompt, file_name)], Vec::new()))
        }
        // A single-line SillyTavern log parses as one object
        serde_json::Value::Object(_) if looks_like_sillytavern(std::slice::from_ref(&value)) => Ok(single(
            ExportFormat::SillyTavern,
            vec![parse_sillytavern_lines(vec![value], file_name)],
            Vec::new(),
        )),
        _ => Err(NormalizeError::UnknownFormat(file_name.to_string())),
    }
}

fn parse_json_lines(text: &str) -> Vec<serde_json::Value> {
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| serde_json::from_str::<serde_json::Value>(l).ok())
        .collect()
}

fn is_jsonl_name(file_name: &str) -> bool {
    Path::new(file_name).extension().and_then(|e| e.to_str()) == Some("jsonl")
}

/// Normalize and branch-annotate every conversation of a file
pub fn load_export(bytes: &[u8], file_name: &str, policy: BranchPolicy) -> Result<ParsedExport, NormalizeError> {
    let mut parsed = normalize(bytes, file_name)?;
    let mut warnings = Vec::new();
    for conversation in &mut parsed.conversations {
        let graph = detect_branches(&conversation.messages, policy);
        if !graph.warnings().is_empty() {
            warnings.push((conversation.metadata.uuid.clone(), graph.warnings().to_vec()));
        }
        conversation.messages = graph.into_messages();
    }
    parsed.warnings = warnings;
    Ok(parsed)
}

/// Read a file from disk and run [`load_export`]
pub fn load_export_file(path: &Path, policy: BranchPolicy) -> crate::shared::errors::Result<ParsedExport> {
    let bytes = std::fs::read(path)?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();
    Ok(load_export(&bytes, &file_name, policy)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const CLAUDE_EXPORT: &str = r#"[{"uuid":"c1","name":"Chat","chat_messages":[
        {"uuid":"m1","text":"hi","sender":"human","parent_message_uuid":"00000000-0000-4000-8000-000000000000"},
        {"uuid":"m2","text":"hello","sender":"assistant","parent_message_uuid":"m1"},
        {"uuid":"m3","text":"hey there","sender":"assistant","parent_message_uuid":"m1"}
    ]}]"#;

    #[test]
    fn test_detect_claude_conversations() {
        let parsed = normalize(CLAUDE_EXPORT.as_bytes(), "conversations.json").unwrap();
        assert_eq!(parsed.format, ExportFormat::ClaudeConversations);
        assert_eq!(parsed.conversations.len(), 1);
        assert_eq!(parsed.conversations[0].messages.len(), 3);
    }

    #[test]
    fn test_load_export_annotates_branches() {
        let parsed = load_export(CLAUDE_EXPORT.as_bytes(), "conversations.json", BranchPolicy::FirstCreated).unwrap();
        let messages = &parsed.conversations[0].messages;
        assert!(messages[0].branch.is_branch_point);
        assert_eq!(messages[1].branch.branch_id, "main");
        assert_eq!(messages[2].branch.branch_id, "branch-1");
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn test_detect_gemini() {
        let raw = r#"{"runSettings":{"model":"models/gemini-2.0-flash"},"chunkedPrompt":{"chunks":[{"text":"hi","role":"user"},{"text":"hello","role":"model"}]}}"#;
        let parsed = normalize(raw.as_bytes(), "Greeting").unwrap();
        assert_eq!(parsed.format, ExportFormat::Gemini);
        assert_eq!(parsed.conversations[0].messages.len(), 2);
    }

    #[test]
    fn test_detect_sillytavern_jsonl() {
        let raw = "{\"user_name\":\"U\",\"character_name\":\"C\"}\n{\"mes\":\"hi\",\"is_user\":true}\n{\"mes\":\"yo\",\"is_user\":false}\n";
        let parsed = normalize(raw.as_bytes(), "chat.jsonl").unwrap();
        assert_eq!(parsed.format, ExportFormat::SillyTavern);
        assert_eq!(parsed.conversations[0].messages.len(), 2);
    }

    #[test]
    fn test_detect_projects() {
        let raw = r#"[{"uuid":"p1","name":"P","prompt_template":"","docs":[]}]"#;
        let parsed = normalize(raw.as_bytes(), "projects.json").unwrap();
        assert_eq!(parsed.format, ExportFormat::ClaudeProjects);
        assert_eq!(parsed.projects.len(), 1);
    }

    #[test]
    fn test_unknown_and_empty_inputs() {
        assert!(matches!(normalize(b"{\"foo\":1}", "x.json"), Err(NormalizeError::UnknownFormat(_))));
        assert!(matches!(normalize(b"   ", "x.json"), Err(NormalizeError::EmptyInput(_))));
        assert!(matches!(normalize(b"[]", "x.json"), Err(NormalizeError::EmptyInput(_))));
        assert!(matches!(normalize(b"not json", "x.json"), Err(NormalizeError::InvalidJson(_))));
    }

    #[test]
    fn test_load_export_file() {
        let temp_dir = std::env::temp_dir();
        let test_file = temp_dir.join("chat_export_kit_conversations.json");
        fs::write(&test_file, CLAUDE_EXPORT).unwrap();

        let parsed = load_export_file(&test_file, BranchPolicy::MostRecent).unwrap();
        assert_eq!(parsed.conversations[0].messages.len(), 3);

        fs::remove_file(test_file).ok();
    }
}
