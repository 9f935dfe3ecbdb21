use serde::{Deserialize, Serialize};

use super::message::{Message, Sender};

/// Source platform of an export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Claude,
    Gemini,
    SillyTavern,
}

impl Platform {
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Claude => "Claude",
            Platform::Gemini => "Gemini",
            Platform::SillyTavern => "SillyTavern",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Conversation-level metadata, immutable once parsed.
/// User renames live in the overlay store, never here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMetadata {
    pub uuid: String,
    pub title: String,
    pub platform: Platform,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub metadata: ConversationMetadata,
    pub messages: Vec<Message>,
}

/// Knowledge-base document attached to a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeDoc {
    pub file_name: String,
    pub content: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Project-level system prompt ("prompt_template" in Claude exports)
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub docs: Vec<KnowledgeDoc>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Per-conversation counts written into archive metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationStats {
    pub total_messages: usize,
    pub user_messages: usize,
    pub assistant_messages: usize,
    pub with_thinking: usize,
    pub with_artifacts: usize,
    pub with_images: usize,
    pub with_tools: usize,
    pub branches: Vec<String>,
}

impl ConversationStats {
    pub fn from_messages(messages: &[Message]) -> Self {
        let mut stats = ConversationStats::default();
        for msg in messages {
            stats.total_messages += 1;
            match msg.sender {
                Sender::Human => stats.user_messages += 1,
                Sender::Assistant => stats.assistant_messages += 1,
            }
            if msg.thinking_text().is_some() {
                stats.with_thinking += 1;
            }
            if !msg.artifacts.is_empty() {
                stats.with_artifacts += 1;
            }
            if !msg.images.is_empty() {
                stats.with_images += 1;
            }
            if !msg.tools.is_empty() {
                stats.with_tools += 1;
            }
            if !stats.branches.contains(&msg.branch.branch_id) {
                stats.branches.push(msg.branch.branch_id.clone());
            }
        }
        stats
    }

    pub fn branch_count(&self) -> usize {
        self.branches.len()
    }
}
