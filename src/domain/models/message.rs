use serde::{Deserialize, Serialize};

/// Origin of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Human,
    Assistant,
}

impl Sender {
    pub fn is_human(&self) -> bool {
        matches!(self, Sender::Human)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::Human => "human",
            Sender::Assistant => "assistant",
        }
    }
}

impl std::str::FromStr for Sender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" | "user" => Ok(Sender::Human),
            "assistant" | "model" | "ai" => Ok(Sender::Assistant),
            _ => Err(format!("Unknown sender: {}", s)),
        }
    }
}

/// How an artifact tool call changes its document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactCommand {
    #[default]
    Create,
    Update,
    Rewrite,
}

/// Generated code or document attached to an assistant message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    /// Language or kind tag (e.g. "application/vnd.ant.code", "text/markdown")
    #[serde(rename = "type", default)]
    pub artifact_type: String,
    #[serde(default)]
    pub command: ArtifactCommand,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub old_str: Option<String>,
    #[serde(default)]
    pub new_str: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

/// Tool invocation made by the assistant, with its result when one was recorded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub input: serde_json::Value,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub is_error: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    #[serde(default)]
    pub title: Option<String>,
    pub url: String,
    #[serde(default)]
    pub snippet: Option<String>,
}

/// User-supplied file, optionally with its text already extracted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub file_name: String,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub extracted_content: Option<String>,
}

/// Image reference: inline base64 payload and/or a URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    pub file_name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// Base64 payload (no data-URL prefix)
    #[serde(default)]
    pub data: Option<String>,
}

/// Branch placement computed by the branch graph builder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchAnnotation {
    pub branch_id: String,
    pub branch_level: u32,
    pub is_branch_point: bool,
    pub child_count: usize,
}

impl Default for BranchAnnotation {
    fn default() -> Self {
        Self {
            branch_id: MAIN_BRANCH.to_string(),
            branch_level: 0,
            is_branch_point: false,
            child_count: 0,
        }
    }
}

impl BranchAnnotation {
    pub fn is_main(&self) -> bool {
        self.branch_id == MAIN_BRANCH
    }
}

pub const MAIN_BRANCH: &str = "main";

/// One normalized turn in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub uuid: String,
    #[serde(default)]
    pub parent_uuid: Option<String>,
    pub sender: Sender,
    #[serde(default)]
    pub display_text: String,
    #[serde(default)]
    pub thinking: Option<String>,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub tools: Vec<ToolCall>,
    #[serde(default)]
    pub citations: Vec<Citation>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub images: Vec<ImageRef>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub branch: BranchAnnotation,
}

impl Message {
    pub fn new(uuid: impl Into<String>, parent_uuid: Option<String>, sender: Sender, text: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            parent_uuid,
            sender,
            display_text: text.into(),
            thinking: None,
            artifacts: Vec::new(),
            tools: Vec::new(),
            citations: Vec::new(),
            attachments: Vec::new(),
            images: Vec::new(),
            timestamp: None,
            branch: BranchAnnotation::default(),
        }
    }

    /// Thinking text, if present and non-blank
    pub fn thinking_text(&self) -> Option<&str> {
        self.thinking.as_deref().filter(|t| !t.trim().is_empty())
    }

    pub fn has_text(&self) -> bool {
        !self.display_text.trim().is_empty()
    }
}
