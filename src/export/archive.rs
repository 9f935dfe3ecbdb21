//! ZIP packaging for granular exports
//!
//! - message archive: every element of one message
//! - conversation archive: one inner archive per (message, author, branch)
//!   plus `_metadata.json`
//! - project archive: project metadata, system prompt, knowledge folder and
//!   one nested conversation archive per conversation

use std::collections::HashSet;
use std::io::{Cursor, Write};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::domain::models::{Conversation, ConversationStats, Message, Platform, Project};
use crate::shared::errors::ExportError;
use crate::shared::logging::{self, LogOperation};

use super::filename::{export_filename, sanitize_title};
use super::granular::extract_elements;
use super::naming::message_prefix;

pub const METADATA_FILE: &str = "_metadata.json";
pub const PROJECT_METADATA_FILE: &str = "_project.json";
pub const SYSTEM_PROMPT_FILE: &str = "system_prompt.md";
pub const KNOWLEDGE_DIR: &str = "knowledge";

/// A finished archive ready to be saved
#[derive(Debug, Clone)]
pub struct ArchiveFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

struct ArchiveBuilder {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    names: HashSet<String>,
}

impl ArchiveBuilder {
    fn new() -> Self {
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            names: HashSet::new(),
        }
    }

    /// Add an entry; returns the name it was stored under
    fn add(&mut self, name: &str, bytes: &[u8]) -> Result<String, ExportError> {
        // Nested archives and images are already compressed
        let method = if name.ends_with(".zip") || name.ends_with(".png") || name.ends_with(".jpg") {
            CompressionMethod::Stored
        } else {
            CompressionMethod::Deflated
        };
        let options = SimpleFileOptions::default().compression_method(method);
        let name = self.unique_name(name);
        self.writer.start_file(name.as_str(), options)?;
        self.writer.write_all(bytes)?;
        Ok(name)
    }

    /// `a.md`, `a-2.md`, `a-3.md`, ...
    fn unique_name(&mut self, name: &str) -> String {
        if self.names.insert(name.to_string()) {
            return name.to_string();
        }
        let (stem, ext) = match name.rsplit_once('.') {
            Some((s, e)) if !s.is_empty() && !s.ends_with('/') => (s.to_string(), format!(".{}", e)),
            _ => (name.to_string(), String::new()),
        };
        let mut n = 2;
        loop {
            let candidate = format!("{}-{}{}", stem, n, ext);
            if self.names.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }

    fn finish(self) -> Result<Vec<u8>, ExportError> {
        Ok(self.writer.finish()?.into_inner())
    }
}

/// Archive with every element of one message, named `DDD-AUTHOR-BRANCH.zip`
pub fn export_message_archive(message: &Message, ordinal: usize) -> Result<ArchiveFile, ExportError> {
    let elements = extract_elements(message, ordinal);
    if elements.is_empty() {
        return Err(ExportError::EmptyInput(format!("message {} has no exportable content", message.uuid)));
    }
    let mut builder = ArchiveBuilder::new();
    for element in &elements {
        builder.add(&element.file_name, &element.content)?;
    }
    Ok(ArchiveFile {
        file_name: format!("{}.zip", message_prefix(ordinal, message.sender, &message.branch.branch_id)),
        bytes: builder.finish()?,
    })
}

#[derive(Debug, Serialize)]
struct ConversationManifest<'a> {
    title: &'a str,
    uuid: &'a str,
    platform: Platform,
    model: Option<&'a str>,
    created_at: Option<&'a str>,
    updated_at: Option<&'a str>,
    exported_at: String,
    stats: ConversationStats,
}

fn build_conversation_zip(conversation: &Conversation, exported_at: DateTime<Utc>) -> Result<Vec<u8>, ExportError> {
    let meta = &conversation.metadata;
    let mut builder = ArchiveBuilder::new();

    // Groups are keyed by (message, author, branch); ordinals keep them apart
    for (idx, message) in conversation.messages.iter().enumerate() {
        let ordinal = idx + 1;
        match export_message_archive(message, ordinal) {
            Ok(inner) => {
                builder.add(&inner.file_name, &inner.bytes)?;
            }
            Err(ExportError::EmptyInput(reason)) => logging::log_element_skipped(&message.uuid, "message", &reason),
            Err(e) => return Err(e),
        }
    }

    let manifest = ConversationManifest {
        title: &meta.title,
        uuid: &meta.uuid,
        platform: meta.platform,
        model: meta.model.as_deref(),
        created_at: meta.created_at.as_deref(),
        updated_at: meta.updated_at.as_deref(),
        exported_at: exported_at.to_rfc3339(),
        stats: ConversationStats::from_messages(&conversation.messages),
    };
    builder.add(METADATA_FILE, serde_json::to_string_pretty(&manifest)?.as_bytes())?;
    builder.finish()
}

/// Whole conversation as nested archives, named `{title}_{YYYYMMDD}.zip`
pub fn export_conversation_archive(
    conversation: &Conversation,
    exported_at: DateTime<Utc>,
) -> Result<ArchiveFile, ExportError> {
    let title = &conversation.metadata.title;
    if conversation.messages.is_empty() {
        return Err(ExportError::EmptyInput(format!("conversation {} has no messages", title)));
    }
    logging::log_export_start(LogOperation::GranularExport, title, conversation.messages.len());

    let bytes = build_conversation_zip(conversation, exported_at)?;
    let file_name = export_filename(title, "zip", exported_at.date_naive());
    logging::log_export_result(LogOperation::GranularExport, &file_name, bytes.len());
    Ok(ArchiveFile { file_name, bytes })
}

#[derive(Debug, Serialize)]
struct ProjectManifest<'a> {
    uuid: &'a str,
    name: &'a str,
    description: Option<&'a str>,
    created_at: Option<&'a str>,
    updated_at: Option<&'a str>,
    exported_at: String,
    knowledge_files: Vec<String>,
    conversations: Vec<ProjectConversationEntry>,
}

#[derive(Debug, Serialize)]
struct ProjectConversationEntry {
    uuid: String,
    title: String,
    archive: String,
    message_count: usize,
}

/// Project export. Conversations are packaged one at a time off the async
/// runtime; `cancel` is checked between conversations.
pub async fn export_project_archive(
    project: &Project,
    conversations: Vec<Conversation>,
    exported_at: DateTime<Utc>,
    cancel: CancellationToken,
) -> Result<ArchiveFile, ExportError> {
    let total_messages = conversations.iter().map(|c| c.messages.len()).sum();
    logging::log_export_start(LogOperation::GranularExport, &project.name, total_messages);

    let mut builder = ArchiveBuilder::new();

    if let Some(prompt) = project.system_prompt.as_deref().filter(|p| !p.trim().is_empty()) {
        builder.add(SYSTEM_PROMPT_FILE, prompt.as_bytes())?;
    }
    let mut knowledge_files = Vec::with_capacity(project.docs.len());
    for doc in &project.docs {
        let name = format!("{}/{}", KNOWLEDGE_DIR, sanitize_doc_name(&doc.file_name));
        knowledge_files.push(builder.add(&name, doc.content.as_bytes())?);
    }

    let mut entries = Vec::with_capacity(conversations.len());
    for conversation in conversations {
        if cancel.is_cancelled() {
            return Err(ExportError::Cancelled);
        }
        if conversation.messages.is_empty() {
            continue;
        }

        let uuid = conversation.metadata.uuid.clone();
        let title = conversation.metadata.title.clone();
        let message_count = conversation.messages.len();
        let bytes = tokio::task::spawn_blocking(move || build_conversation_zip(&conversation, exported_at))
            .await
            .map_err(|e| ExportError::Task(e.to_string()))??;

        let short_id: String = uuid.chars().take(8).collect();
        let archive = format!("conversations/{}_{}.zip", sanitize_title(&title), short_id);
        let archive = builder.add(&archive, &bytes)?;
        entries.push(ProjectConversationEntry { uuid, title, archive, message_count });
    }

    let manifest = ProjectManifest {
        uuid: &project.uuid,
        name: &project.name,
        description: project.description.as_deref(),
        created_at: project.created_at.as_deref(),
        updated_at: project.updated_at.as_deref(),
        exported_at: exported_at.to_rfc3339(),
        knowledge_files,
        conversations: entries,
    };
    builder.add(PROJECT_METADATA_FILE, serde_json::to_string_pretty(&manifest)?.as_bytes())?;

    let bytes = builder.finish()?;
    let file_name = export_filename(&project.name, "zip", exported_at.date_naive());
    logging::log_export_result(LogOperation::GranularExport, &file_name, bytes.len());
    Ok(ArchiveFile { file_name, bytes })
}

fn sanitize_doc_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') || c.is_control() { '_' } else { c })
        .collect();
    if cleaned.trim().is_empty() {
        "document.txt".to_string()
    } else {
        cleaned
    }
}
