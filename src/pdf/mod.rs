//! PDF pagination engine
//!
//! Pipeline: filter messages, lay out pages against the host-provided font
//! ([`layout`]), then draw them with printpdf ([`render`]).

pub mod blocks;
pub mod config;
pub mod font;
pub mod inline;
pub mod latex;
pub mod layout;
pub mod render;

use chrono::{DateTime, Local};

use crate::export::{export_filename, ExportSource};
use crate::shared::errors::PdfError;
use crate::shared::logging::{self, LogOperation};

pub use config::{PageSetup, PdfOptions};
pub use font::{FixedMeasure, FontMetrics, FontStatus, LoadedFont, TextMeasure};
pub use latex::{latex_to_unicode, split_inline_math, MathSegment};
pub use layout::{layout_document, DocumentLayout, DrawCommand};
pub use render::render_pdf;

/// A finished PDF
#[derive(Debug, Clone)]
pub struct PdfExport {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub page_count: usize,
    /// Fragments that were rendered as plain text
    pub fallbacks: usize,
}

/// Paginate and render a conversation.
///
/// Refuses to start unless the font is [`FontStatus::Ready`].
pub fn export_pdf(
    source: &ExportSource<'_>,
    font: &FontStatus,
    options: &PdfOptions,
    exported_at: DateTime<Local>,
) -> Result<PdfExport, PdfError> {
    let font = font.ready()?;
    if source.messages.is_empty() {
        return Err(PdfError::EmptyInput(format!("{} has no messages", source.title())));
    }
    logging::log_export_start(LogOperation::PdfExport, source.title(), source.messages.len());

    let layout = layout_document(source, options, font.metrics(), exported_at)?;
    let bytes = render_pdf(&layout, source.title(), font)?;
    let file_name = export_filename(source.title(), "pdf", exported_at.date_naive());

    logging::log_export_result(LogOperation::PdfExport, &file_name, bytes.len());
    Ok(PdfExport { file_name, page_count: layout.page_count(), fallbacks: layout.fallbacks, bytes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ConversationMetadata, Message, Platform, Sender};
    use crate::export::MessageFilter;
    use crate::overlay::{MarkFlags, MarkMap};

    const SYSTEM_FONTS: &[&str] = &[
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    ];

    fn make_metadata() -> ConversationMetadata {
        ConversationMetadata {
            uuid: "conv-1".into(),
            title: "PDF: export test".into(),
            platform: Platform::Claude,
            model: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn make_messages() -> Vec<Message> {
        vec![
            Message::new("m1", None, Sender::Human, "What is $e^{i\\pi}$?"),
            Message::new("m2", Some("m1".into()), Sender::Assistant, "It equals **-1**.\n\n$$e^{i\\pi} + 1 = 0$$"),
        ]
    }

    fn system_font() -> Option<LoadedFont> {
        SYSTEM_FONTS
            .iter()
            .find_map(|path| std::fs::read(path).ok())
            .and_then(|bytes| LoadedFont::from_bytes("system", bytes).ok())
    }

    #[test]
    fn test_font_must_be_ready() {
        let metadata = make_metadata();
        let messages = make_messages();
        let source = ExportSource::new(&metadata, &messages);
        let options = PdfOptions::default();

        let result = export_pdf(&source, &FontStatus::Downloading(10), &options, Local::now());
        assert!(matches!(result, Err(PdfError::FontDownloading(10))));

        let result = export_pdf(&source, &FontStatus::NotRequested, &options, Local::now());
        assert!(matches!(result, Err(PdfError::FontNotRequested)));
    }

    #[test]
    fn test_renders_with_system_font() {
        let Some(font) = system_font() else {
            return;
        };
        let metadata = make_metadata();
        let messages = make_messages();
        let source = ExportSource::new(&metadata, &messages);

        let export = export_pdf(&source, &FontStatus::Ready(font), &PdfOptions::default(), Local::now()).unwrap();
        assert!(export.bytes.starts_with(b"%PDF"));
        assert!(export.file_name.starts_with("PDF_export_test_"));
        assert!(export.file_name.ends_with(".pdf"));
        // title, contents, messages
        assert!(export.page_count >= 3);
    }

    #[test]
    fn test_filter_that_removes_everything() {
        let Some(font) = system_font() else {
            return;
        };
        let metadata = make_metadata();
        let messages = make_messages();
        let mut marks = MarkMap::new();
        marks.insert("m1".into(), MarkFlags { deleted: true, ..Default::default() });
        marks.insert("m2".into(), MarkFlags { deleted: true, ..Default::default() });
        let source = ExportSource::new(&metadata, &messages).with_marks(marks);
        let options = PdfOptions { filter: MessageFilter::default(), ..Default::default() };

        let result = export_pdf(&source, &FontStatus::Ready(font), &options, Local::now());
        assert!(matches!(result, Err(PdfError::EmptyInput(_))));
    }
}
