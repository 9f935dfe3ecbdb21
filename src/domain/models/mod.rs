// Domain models (business entities)
// Pure Rust, no framework dependencies

pub mod message;
pub mod conversation;

pub use message::{
    Artifact, ArtifactCommand, Attachment, BranchAnnotation, Citation, ImageRef, Message, Sender,
    ToolCall, MAIN_BRANCH,
};
pub use conversation::{
    Conversation, ConversationMetadata, ConversationStats, KnowledgeDoc, Platform, Project,
};
