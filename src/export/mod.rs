pub mod archive;
pub mod filename;
pub mod granular;
pub mod markdown;
pub mod naming;
pub mod numbering;
pub mod source;

// Granular export
pub use archive::{export_conversation_archive, export_message_archive, export_project_archive, ArchiveFile};
pub use granular::{
    export_artifact, export_attachment, export_citations, export_image, export_text, export_thinking, export_tool,
    extract_elements, ExportElement,
};
pub use naming::{element_filename, ElementType};

// Document exports
pub use filename::{export_filename, export_filename_today, sanitize_title};
pub use markdown::{generate_markdown, MarkdownExport, MarkdownOptions, MessageFilter, SenderLabels, ThinkingFormat};
pub use numbering::{format_number, NumberingStyle};
pub use source::ExportSource;
