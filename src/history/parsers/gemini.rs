//! Gemini (Google AI Studio) parser
//!
//! AI Studio exports one prompt per file: `chunkedPrompt.chunks` holds the
//! turns, with `isThought` chunks carrying the model's reasoning before its
//! answer. Exports have no message ids, so ids are derived from the file
//! name and turn position; the chain is strictly linear.

use crate::domain::models::{
    Attachment, Conversation, ConversationMetadata, ImageRef, Message, Platform, Sender,
};
use crate::history::types::{GeminiChunk, GeminiPrompt};
use crate::shared::ids::derive_uuid;
use crate::shared::logging;

/// Parse an AI Studio prompt export
pub fn parse_gemini_prompt(prompt: GeminiPrompt, file_name: &str) -> Conversation {
    let conversation_uuid = derive_uuid(&["gemini", file_name]);
    let mut messages: Vec<Message> = Vec::new();
    let mut pending_thinking: Vec<String> = Vec::new();

    for (idx, value) in prompt.chunked_prompt.chunks.into_iter().enumerate() {
        let chunk: GeminiChunk = match serde_json::from_value(value) {
            Ok(c) => c,
            Err(e) => {
                logging::log_record_skipped(file_name, idx, &e.to_string());
                continue;
            }
        };

        let sender = if chunk.role == "user" { Sender::Human } else { Sender::Assistant };
        let text = chunk.text.clone().unwrap_or_default();

        if chunk.is_thought {
            if !text.trim().is_empty() {
                pending_thinking.push(text);
            }
            continue;
        }

        // Consecutive chunks of one role form a single turn
        let continues_turn = messages.last().is_some_and(|m| m.sender == sender);
        if !continues_turn {
            let parent = messages.last().map(|m| m.uuid.clone());
            let uuid = derive_uuid(&[&conversation_uuid, &messages.len().to_string()]);
            messages.push(Message::new(uuid, parent, sender, String::new()));
        }
        let Some(current) = messages.last_mut() else {
            continue;
        };

        if !text.trim().is_empty() {
            if !current.display_text.is_empty() {
                current.display_text.push_str("\n\n");
            }
            current.display_text.push_str(&text);
        }

        if sender == Sender::Assistant && !pending_thinking.is_empty() {
            let joined = pending_thinking.join("\n\n");
            pending_thinking.clear();
            current.thinking = Some(match current.thinking.take() {
                Some(existing) => format!("{}\n\n{}", existing, joined),
                None => joined,
            });
        }

        if let Some(image) = chunk.inline_image {
            let ext = image
                .mime_type
                .as_deref()
                .and_then(|m| m.strip_prefix("image/"))
                .unwrap_or("png")
                .to_string();
            let file_name = format!("image-{}.{}", current.images.len() + 1, ext);
            current.images.push(ImageRef { file_name, mime_type: image.mime_type, url: None, data: image.data });
        }
        if let Some(drive) = chunk.drive_image {
            current.images.push(ImageRef {
                file_name: format!("drive-{}.png", drive.id),
                mime_type: None,
                url: Some(format!("https://drive.google.com/file/d/{}", drive.id)),
                data: None,
            });
        }
        if let Some(doc) = chunk.drive_document {
            current.attachments.push(Attachment {
                file_name: format!("drive-{}", doc.id),
                file_type: None,
                file_size: None,
                extracted_content: None,
            });
        }
    }

    // Reasoning with no answer after it still belongs to the last model turn
    if !pending_thinking.is_empty() {
        if let Some(last) = messages.iter_mut().rev().find(|m| m.sender == Sender::Assistant) {
            last.thinking = Some(pending_thinking.join("\n\n"));
        }
    }

    let title = std::path::Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("Gemini conversation")
        .to_string();

    Conversation {
        metadata: ConversationMetadata {
            uuid: conversation_uuid,
            title,
            platform: Platform::Gemini,
            model: prompt
                .run_settings
                .and_then(|r| r.model)
                .map(|m| m.trim_start_matches("models/").to_string()),
            created_at: None,
            updated_at: None,
        },
        messages,
    }
}
