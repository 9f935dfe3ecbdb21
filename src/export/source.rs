//! Input shared by the document exporters (markdown, PDF)

use crate::domain::models::{Conversation, ConversationMetadata, Message};
use crate::overlay::{effective_title, load_marks, MarkKind, MarkMap, OverlayStore};
use crate::shared::errors::OverlayError;

/// A conversation (or a branch-filtered slice of it) plus the user's overlays
#[derive(Debug, Clone)]
pub struct ExportSource<'a> {
    pub metadata: &'a ConversationMetadata,
    /// Renamed title, if the user set one
    pub title_override: Option<String>,
    pub messages: &'a [Message],
    pub marks: MarkMap,
}

impl<'a> ExportSource<'a> {
    pub fn new(metadata: &'a ConversationMetadata, messages: &'a [Message]) -> Self {
        Self { metadata, title_override: None, messages, marks: MarkMap::new() }
    }

    pub fn from_conversation(conversation: &'a Conversation) -> Self {
        Self::new(&conversation.metadata, &conversation.messages)
    }

    /// Attach the marks and title override stored under `scope`
    pub fn with_overlays(mut self, store: &dyn OverlayStore, scope: &str) -> Result<Self, OverlayError> {
        self.marks = load_marks(store, scope)?;
        let title = effective_title(store, scope, &self.metadata.title);
        if title != self.metadata.title {
            self.title_override = Some(title);
        }
        Ok(self)
    }

    pub fn with_marks(mut self, marks: MarkMap) -> Self {
        self.marks = marks;
        self
    }

    pub fn title(&self) -> &str {
        self.title_override.as_deref().unwrap_or(&self.metadata.title)
    }

    pub fn is_marked(&self, message: &Message, kind: MarkKind) -> bool {
        self.marks.get(&message.uuid).is_some_and(|f| f.get(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Platform, Sender};
    use crate::overlay::{set_title_override, toggle_mark, MemoryOverlayStore};

    #[test]
    fn test_with_overlays() {
        let metadata = ConversationMetadata {
            uuid: "c1".into(),
            title: "Original".into(),
            platform: Platform::Gemini,
            model: None,
            created_at: None,
            updated_at: None,
        };
        let messages = vec![Message::new("m1", None, Sender::Human, "hi")];
        let store = MemoryOverlayStore::new();
        toggle_mark(&store, "scope", "m1", MarkKind::Important);
        set_title_override(&store, "scope", "Renamed").unwrap();

        let source = ExportSource::new(&metadata, &messages).with_overlays(&store, "scope").unwrap();
        assert_eq!(source.title(), "Renamed");
        assert!(source.is_marked(&messages[0], MarkKind::Important));
        assert!(!source.is_marked(&messages[0], MarkKind::Deleted));
        assert_eq!(metadata.title, "Original");
    }
}
