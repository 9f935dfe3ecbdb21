//! Raw export shapes for the supported platforms
//!
//! Only fields the normalizer reads are declared; everything else is ignored.
//! Nested collections that commonly hold malformed entries are kept as
//! `serde_json::Value` and decoded one item at a time.

use serde::{Deserialize, Serialize};

/// Parent uuid Claude exports give to the first message of a conversation
pub const CLAUDE_ROOT_PARENT: &str = "00000000-0000-4000-8000-000000000000";

/// One conversation from a Claude `conversations.json` export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaudeConversation {
    pub uuid: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub chat_messages: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaudeChatMessage {
    pub uuid: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub content: Vec<serde_json::Value>,
    pub sender: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub attachments: Vec<ClaudeAttachment>,
    #[serde(default)]
    pub files: Vec<ClaudeFile>,
    #[serde(default)]
    pub files_v2: Vec<ClaudeFile>,
    #[serde(default)]
    pub parent_message_uuid: Option<String>,
}

/// Content block inside `chat_messages[].content`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClaudeContentBlock {
    #[serde(rename = "text")]
    Text {
        #[serde(default)]
        text: String,
        #[serde(default)]
        citations: Vec<serde_json::Value>,
    },
    #[serde(rename = "thinking")]
    Thinking {
        #[serde(default)]
        thinking: String,
    },
    #[serde(rename = "tool_use")]
    ToolUse {
        #[serde(default)]
        id: Option<String>,
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        #[serde(default)]
        tool_use_id: Option<String>,
        #[serde(default)]
        content: serde_json::Value,
        #[serde(default)]
        is_error: bool,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaudeAttachment {
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub extracted_content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaudeFile {
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub file_kind: Option<String>,
    #[serde(default)]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

/// Input of the `artifacts` tool
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClaudeArtifactInput {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub artifact_type: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub old_str: Option<String>,
    #[serde(default)]
    pub new_str: Option<String>,
}

/// One project from a Claude `projects.json` export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaudeProject {
    pub uuid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub prompt_template: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub docs: Vec<ClaudeProjectDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaudeProjectDoc {
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Google AI Studio prompt export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiPrompt {
    #[serde(rename = "runSettings", default)]
    pub run_settings: Option<GeminiRunSettings>,
    #[serde(rename = "chunkedPrompt")]
    pub chunked_prompt: GeminiChunkedPrompt,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiRunSettings {
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiChunkedPrompt {
    #[serde(default)]
    pub chunks: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiChunk {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub role: String,
    #[serde(rename = "isThought", default)]
    pub is_thought: bool,
    #[serde(rename = "inlineImage", default)]
    pub inline_image: Option<GeminiInlineImage>,
    #[serde(rename = "driveImage", default)]
    pub drive_image: Option<GeminiDriveRef>,
    #[serde(rename = "driveDocument", default)]
    pub drive_document: Option<GeminiDriveRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiInlineImage {
    #[serde(rename = "mimeType", default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiDriveRef {
    #[serde(default)]
    pub id: String,
}

/// First line of a SillyTavern chat `.jsonl`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SillyTavernHeader {
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub character_name: Option<String>,
    #[serde(default)]
    pub create_date: Option<String>,
}

/// One message line of a SillyTavern chat `.jsonl`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SillyTavernLine {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_user: bool,
    #[serde(default)]
    pub is_system: bool,
    #[serde(default)]
    pub send_date: Option<serde_json::Value>,
    #[serde(default)]
    pub mes: String,
    #[serde(default)]
    pub swipes: Vec<String>,
    #[serde(default)]
    pub swipe_id: Option<usize>,
    #[serde(default)]
    pub extra: Option<SillyTavernExtra>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SillyTavernExtra {
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

impl SillyTavernLine {
    /// `send_date` is a string in most versions and epoch millis in some
    pub fn send_date_string(&self) -> Option<String> {
        match &self.send_date {
            Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(serde_json::Value::Number(n)) => n
                .as_i64()
                .and_then(chrono::DateTime::from_timestamp_millis)
                .map(|dt| dt.to_rfc3339()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_block_unknown_type_is_other() {
        let block: ClaudeContentBlock =
            serde_json::from_str(r#"{"type":"voice_note","title":"x"}"#).unwrap();
        assert!(matches!(block, ClaudeContentBlock::Other));
    }

    #[test]
    fn test_sillytavern_numeric_send_date() {
        let line: SillyTavernLine =
            serde_json::from_str(r#"{"mes":"hi","is_user":true,"send_date":1700000000000}"#).unwrap();
        assert!(line.send_date_string().unwrap().starts_with("2023-11-14"));
    }
}
