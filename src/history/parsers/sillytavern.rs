//! SillyTavern chat log parser
//!
//! Chat logs are `.jsonl`: a header line (user/character names, creation
//! date) followed by one object per message. Alternative generations
//! ("swipes") become sibling replies of the same parent, the selected swipe
//! first, so they surface as branches.

use crate::domain::models::{Conversation, ConversationMetadata, Message, Platform, Sender};
use crate::history::types::{SillyTavernHeader, SillyTavernLine};
use crate::shared::ids::derive_uuid;
use crate::shared::logging;

/// True when the first non-empty lines look like a SillyTavern chat
pub fn looks_like_sillytavern(lines: &[serde_json::Value]) -> bool {
    lines.iter().take(3).any(|v| {
        v.get("character_name").is_some() || v.get("user_name").is_some() || v.get("mes").is_some()
    })
}

/// Parse the JSON lines of one chat log
pub fn parse_sillytavern_lines(lines: Vec<serde_json::Value>, file_name: &str) -> Conversation {
    let conversation_uuid = derive_uuid(&["sillytavern", file_name]);
    let mut header: Option<SillyTavernHeader> = None;
    let mut messages: Vec<Message> = Vec::new();
    let mut parent: Option<String> = None;
    let mut model: Option<String> = None;

    for (line_no, value) in lines.into_iter().enumerate() {
        if value.get("mes").is_none() {
            let is_header = value.get("character_name").is_some() || value.get("user_name").is_some();
            if header.is_none() && is_header {
                header = serde_json::from_value(value).ok();
            }
            continue;
        }

        let line: SillyTavernLine = match serde_json::from_value(value) {
            Ok(l) => l,
            Err(e) => {
                logging::log_record_skipped(file_name, line_no, &e.to_string());
                continue;
            }
        };
        if line.is_system {
            continue;
        }

        let sender = if line.is_user { Sender::Human } else { Sender::Assistant };
        let timestamp = line.send_date_string();
        let extra = line.extra.clone().unwrap_or_default();
        if model.is_none() {
            model = extra.model.clone();
        }

        let uuid = derive_uuid(&[&conversation_uuid, &line_no.to_string()]);
        let mut main = Message::new(uuid.clone(), parent.clone(), sender, line.mes.clone());
        main.timestamp = timestamp.clone();
        main.thinking = extra.reasoning.filter(|r| !r.trim().is_empty());
        messages.push(main);

        // Swipes other than the shown one are alternatives to the same turn
        let selected = line.swipe_id.unwrap_or(0);
        if line.swipes.len() > 1 {
            for (swipe_idx, swipe) in line.swipes.iter().enumerate() {
                if swipe_idx == selected || *swipe == line.mes {
                    continue;
                }
                let swipe_uuid = derive_uuid(&[&uuid, "swipe", &swipe_idx.to_string()]);
                let mut alt = Message::new(swipe_uuid, parent.clone(), sender, swipe.clone());
                alt.timestamp = timestamp.clone();
                messages.push(alt);
            }
        }

        parent = Some(uuid);
    }

    let title = match &header {
        Some(SillyTavernHeader { character_name: Some(name), create_date, .. }) => match create_date {
            Some(date) => format!("{} - {}", name, date),
            None => name.clone(),
        },
        _ => std::path::Path::new(file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("SillyTavern chat")
            .to_string(),
    };

    Conversation {
        metadata: ConversationMetadata {
            uuid: conversation_uuid,
            title,
            platform: Platform::SillyTavern,
            model,
            created_at: header.as_ref().and_then(|h| h.create_date.clone()),
            updated_at: messages.last().and_then(|m| m.timestamp.clone()),
        },
        messages,
    }
}
