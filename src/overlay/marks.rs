//! Mark, star, rename and custom-order overlays
//!
//! All overlays are scoped by a derived key (see [`crate::shared::ids`]) and
//! stored as JSON. They never touch the parsed conversation data.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::domain::models::Message;
use crate::shared::errors::OverlayError;
use crate::shared::logging;

use super::store::{keys, OverlayStore};

/// Which per-message flag to touch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkKind {
    Completed,
    Important,
    Deleted,
}

/// Per-message flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkFlags {
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub important: bool,
    #[serde(default)]
    pub deleted: bool,
}

impl MarkFlags {
    pub fn get(&self, kind: MarkKind) -> bool {
        match kind {
            MarkKind::Completed => self.completed,
            MarkKind::Important => self.important,
            MarkKind::Deleted => self.deleted,
        }
    }

    fn set(&mut self, kind: MarkKind, value: bool) {
        match kind {
            MarkKind::Completed => self.completed = value,
            MarkKind::Important => self.important = value,
            MarkKind::Deleted => self.deleted = value,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.completed && !self.important && !self.deleted
    }
}

/// Message uuid -> flags for one scope
pub type MarkMap = HashMap<String, MarkFlags>;

fn read_json<T: for<'de> Deserialize<'de>>(key: &str, raw: &str) -> Result<T, OverlayError> {
    serde_json::from_str(raw).map_err(|source| OverlayError::Corrupt { key: key.to_string(), source })
}

/// Load all marks of a scope. A corrupt entry is an error; a missing one is empty.
pub fn load_marks(store: &dyn OverlayStore, scope: &str) -> Result<MarkMap, OverlayError> {
    let key = keys::marks_key(scope);
    match store.get(&key) {
        Some(raw) => read_json(&key, &raw),
        None => Ok(MarkMap::new()),
    }
}

/// Flip one flag on one message and return its new value
pub fn toggle_mark(store: &dyn OverlayStore, scope: &str, message_uuid: &str, kind: MarkKind) -> bool {
    let mut result = false;
    update_marks(store, scope, &mut |marks| {
        let flags = marks.entry(message_uuid.to_string()).or_default();
        let next = !flags.get(kind);
        flags.set(kind, next);
        result = next;
    });
    result
}

/// Set one flag on many messages at once (bulk "mark all")
pub fn set_marks(store: &dyn OverlayStore, scope: &str, message_uuids: &[String], kind: MarkKind, value: bool) {
    update_marks(store, scope, &mut |marks| {
        for uuid in message_uuids {
            marks.entry(uuid.clone()).or_default().set(kind, value);
        }
    });
}

/// Clear one kind of mark across the scope
pub fn clear_mark_kind(store: &dyn OverlayStore, scope: &str, kind: MarkKind) {
    update_marks(store, scope, &mut |marks| {
        for flags in marks.values_mut() {
            flags.set(kind, false);
        }
    });
}

/// Drop every mark of the scope
pub fn clear_marks(store: &dyn OverlayStore, scope: &str) {
    store.remove(&keys::marks_key(scope));
}

/// Message uuids carrying `kind`, in `messages` order
pub fn marked_uuids(marks: &MarkMap, messages: &[Message], kind: MarkKind) -> Vec<String> {
    messages
        .iter()
        .filter(|m| marks.get(&m.uuid).is_some_and(|f| f.get(kind)))
        .map(|m| m.uuid.clone())
        .collect()
}

/// Parse the stored value of a marks key; a missing value is empty
fn stored_marks(key: &str, current: Option<&str>) -> Result<MarkMap, OverlayError> {
    Ok(current.map(|raw| read_json(key, raw)).transpose()?.unwrap_or_default())
}

fn update_marks(store: &dyn OverlayStore, scope: &str, edit: &mut dyn FnMut(&mut MarkMap)) {
    let key = keys::marks_key(scope);
    store.update(&key, &mut |current| {
        // A corrupt value is replaced rather than blocking every future toggle
        let mut working = stored_marks(&key, current).unwrap_or_else(|e| {
            logging::log_overlay_corrupt(&key, &e.to_string());
            MarkMap::new()
        });
        edit(&mut working);
        working.retain(|_, f| !f.is_empty());
        if working.is_empty() {
            return None;
        }
        let marks: BTreeMap<String, MarkFlags> = working.into_iter().collect();
        serde_json::to_string(&marks).ok()
    });
}

/// Flip the star of a conversation and return the new state
pub fn toggle_star(store: &dyn OverlayStore, scope: &str) -> bool {
    let mut starred = false;
    store.update(&keys::star_key(scope), &mut |current| {
        starred = current != Some("true");
        starred.then(|| "true".to_string())
    });
    starred
}

pub fn is_starred(store: &dyn OverlayStore, scope: &str) -> bool {
    store.get(&keys::star_key(scope)).as_deref() == Some("true")
}

/// Scopes currently starred
pub fn starred_scopes(store: &dyn OverlayStore) -> Vec<String> {
    let prefix = keys::star_key("");
    store
        .keys_with_prefix(&prefix)
        .into_iter()
        .map(|k| k[prefix.len()..].to_string())
        .collect()
}

/// User-assigned title; the parsed metadata keeps the original
pub fn set_title_override(store: &dyn OverlayStore, scope: &str, title: &str) -> Result<(), OverlayError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        clear_title_override(store, scope);
        return Ok(());
    }
    store.set(&keys::rename_key(scope), serde_json::to_string(trimmed)?);
    Ok(())
}

pub fn title_override(store: &dyn OverlayStore, scope: &str) -> Result<Option<String>, OverlayError> {
    let key = keys::rename_key(scope);
    store.get(&key).map(|raw| read_json(&key, &raw)).transpose()
}

pub fn clear_title_override(store: &dyn OverlayStore, scope: &str) {
    store.remove(&keys::rename_key(scope));
}

/// Title to display: override if present, else the parsed one
pub fn effective_title(store: &dyn OverlayStore, scope: &str, original: &str) -> String {
    title_override(store, scope)
        .ok()
        .flatten()
        .unwrap_or_else(|| original.to_string())
}

/// Persist a custom message order (uuids)
pub fn set_custom_order(store: &dyn OverlayStore, scope: &str, order: &[String]) -> Result<(), OverlayError> {
    store.set(&keys::order_key(scope), serde_json::to_string(order)?);
    Ok(())
}

pub fn custom_order(store: &dyn OverlayStore, scope: &str) -> Result<Option<Vec<String>>, OverlayError> {
    let key = keys::order_key(scope);
    store.get(&key).map(|raw| read_json(&key, &raw)).transpose()
}

pub fn clear_custom_order(store: &dyn OverlayStore, scope: &str) {
    store.remove(&keys::order_key(scope));
}

/// Reorder messages by a stored uuid list. Messages missing from the list
/// keep their relative order after the listed ones; unknown uuids are ignored.
pub fn apply_custom_order(messages: &[Message], order: &[String]) -> Vec<Message> {
    let position: HashMap<&str, usize> = order.iter().enumerate().map(|(i, u)| (u.as_str(), i)).collect();
    let mut indexed: Vec<(usize, usize, &Message)> = messages
        .iter()
        .enumerate()
        .map(|(src, m)| (position.get(m.uuid.as_str()).copied().unwrap_or(usize::MAX), src, m))
        .collect();
    indexed.sort_by_key(|(rank, src, _)| (*rank, *src));
    indexed.into_iter().map(|(_, _, m)| m.clone()).collect()
}
