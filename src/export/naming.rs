//! Deterministic file names for granular exports
//!
//! `DDD-AUTHOR-BRANCH-SSS-TYPE.ext`:
//! - `DDD` message ordinal (1-based, 3 digits)
//! - `AUTHOR` `USER` or `IA`
//! - `BRANCH` `M` for main, else `T` + 2-digit branch number
//! - `SSS` element ordinal within the message (1-based, 3 digits)
//! - `TYPE` one of [`ElementType`]

use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::models::{Artifact, Sender, MAIN_BRANCH};

/// Kind of an extractable message element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Message,
    Thinking,
    Artifact,
    Tool,
    Citation,
    Attachment,
    Image,
}

impl ElementType {
    /// Type tag used in file names
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementType::Message => "message",
            ElementType::Thinking => "thinking",
            ElementType::Artifact => "artefato",
            ElementType::Tool => "tool",
            ElementType::Citation => "citation",
            ElementType::Attachment => "anexo",
            ElementType::Image => "imagem",
        }
    }
}

pub fn author_code(sender: Sender) -> &'static str {
    match sender {
        Sender::Human => "USER",
        Sender::Assistant => "IA",
    }
}

/// `M` for the main branch, `Tnn` otherwise.
///
/// `nn` is the trailing integer of the branch id mod 100 (`branch-3` -> `T03`,
/// `branch-1.12` -> `T12`), or a SHA-256 derived number when the id has none.
pub fn branch_code(branch_id: &str) -> String {
    if branch_id == MAIN_BRANCH {
        return "M".to_string();
    }
    format!("T{:02}", branch_number(branch_id) % 100)
}

fn branch_number(branch_id: &str) -> u64 {
    let digits: String = branch_id
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    // Keep only the low digits so very long suffixes cannot overflow
    let tail = &digits[digits.len().saturating_sub(18)..];
    match tail.parse::<u64>() {
        Ok(n) => n,
        Err(_) => {
            let digest = Sha256::digest(branch_id.as_bytes());
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&digest[..8]);
            u64::from_be_bytes(bytes)
        }
    }
}

/// Full element file name
pub fn element_filename(
    ordinal: usize,
    sender: Sender,
    branch_id: &str,
    sequence: usize,
    element: ElementType,
    extension: &str,
) -> String {
    format!(
        "{:03}-{}-{}-{:03}-{}.{}",
        ordinal,
        author_code(sender),
        branch_code(branch_id),
        sequence,
        element.as_str(),
        extension
    )
}

/// Name prefix shared by every element of one message (`DDD-AUTHOR-BRANCH`)
pub fn message_prefix(ordinal: usize, sender: Sender, branch_id: &str) -> String {
    format!("{:03}-{}-{}", ordinal, author_code(sender), branch_code(branch_id))
}

/// File extension for a language tag; `None` if unknown
pub fn language_extension(language: &str) -> Option<&'static str> {
    let ext = match language.trim().to_lowercase().as_str() {
        "python" | "py" => "py",
        "javascript" | "js" | "node" => "js",
        "typescript" | "ts" => "ts",
        "jsx" | "react" | "application/vnd.ant.react" => "jsx",
        "tsx" => "tsx",
        "rust" | "rs" => "rs",
        "go" | "golang" => "go",
        "java" => "java",
        "kotlin" | "kt" => "kt",
        "scala" => "scala",
        "swift" => "swift",
        "c" => "c",
        "cpp" | "c++" | "cxx" => "cpp",
        "csharp" | "c#" | "cs" => "cs",
        "ruby" | "rb" => "rb",
        "php" => "php",
        "lua" => "lua",
        "dart" => "dart",
        "r" => "r",
        "shell" | "bash" | "sh" | "zsh" => "sh",
        "powershell" | "ps1" => "ps1",
        "sql" => "sql",
        "html" | "text/html" => "html",
        "css" => "css",
        "scss" => "scss",
        "json" | "application/json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "xml" => "xml",
        "markdown" | "md" | "text/markdown" => "md",
        "latex" | "tex" => "tex",
        "svg" | "image/svg+xml" => "svg",
        "mermaid" | "application/vnd.ant.mermaid" => "mmd",
        "text" | "plaintext" | "text/plain" => "txt",
        _ => return None,
    };
    Some(ext)
}

/// Artifact extension: language first, then type tag, default `txt`
pub fn artifact_extension(artifact: &Artifact) -> &'static str {
    artifact
        .language
        .as_deref()
        .and_then(language_extension)
        .or_else(|| language_extension(&artifact.artifact_type))
        .unwrap_or("txt")
}

/// Extension of an original file name, lowercased
pub fn file_extension(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| e.to_lowercase())
}

/// Extension for an image MIME type
pub fn mime_extension(mime: &str) -> Option<&'static str> {
    match mime {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/svg+xml" => Some("svg"),
        "application/pdf" => Some("pdf"),
        "text/plain" => Some("txt"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ArtifactCommand;

    fn make_artifact(language: Option<&str>, artifact_type: &str) -> Artifact {
        Artifact {
            id: None,
            title: "a".into(),
            artifact_type: artifact_type.into(),
            command: ArtifactCommand::Create,
            content: String::new(),
            old_str: None,
            new_str: None,
            language: language.map(String::from),
        }
    }

    #[test]
    fn test_element_filename() {
        assert_eq!(
            element_filename(7, Sender::Human, "main", 1, ElementType::Message, "md"),
            "007-USER-M-001-message.md"
        );
        assert_eq!(
            element_filename(12, Sender::Assistant, "branch-3", 4, ElementType::Artifact, "py"),
            "012-IA-T03-004-artefato.py"
        );
    }

    #[test]
    fn test_branch_code() {
        assert_eq!(branch_code("main"), "M");
        assert_eq!(branch_code("branch-1.12"), "T12");
        assert_eq!(branch_code("branch-105"), "T05");
        assert_eq!(branch_code("root-2"), "T02");

        let hashed = branch_code("alt");
        assert_eq!(hashed, branch_code("alt"));
        assert_eq!(hashed.len(), 3);
        assert!(hashed.starts_with('T'));
    }

    #[test]
    fn test_artifact_extension() {
        assert_eq!(artifact_extension(&make_artifact(Some("Python"), "application/vnd.ant.code")), "py");
        assert_eq!(artifact_extension(&make_artifact(None, "text/markdown")), "md");
        assert_eq!(artifact_extension(&make_artifact(Some("brainfuck"), "unknown")), "txt");
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("Report.PDF").as_deref(), Some("pdf"));
        assert_eq!(file_extension("README"), None);
        assert_eq!(mime_extension("image/jpeg"), Some("jpg"));
    }
}
