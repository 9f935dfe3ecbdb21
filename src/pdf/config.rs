//! PDF page geometry and export options
//!
//! Both deserialize with defaults (A4 portrait) so a partial `pdf` section of
//! the JSON export config is enough.

use serde::{Deserialize, Serialize};

use crate::export::{MessageFilter, NumberingStyle, SenderLabels};

/// Page geometry in millimetres
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageSetup {
    pub width: f32,
    pub height: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
    pub margin_left: f32,
    pub margin_right: f32,
}

impl Default for PageSetup {
    /// A4 portrait
    fn default() -> Self {
        Self {
            width: 210.0,
            height: 297.0,
            margin_top: 20.0,
            margin_bottom: 22.0,
            margin_left: 18.0,
            margin_right: 18.0,
        }
    }
}

impl PageSetup {
    pub fn content_width(&self) -> f32 {
        self.width - self.margin_left - self.margin_right
    }

    /// Lowest y (from the top) content may reach
    pub fn content_bottom(&self) -> f32 {
        self.height - self.margin_bottom
    }

    pub fn content_height(&self) -> f32 {
        self.content_bottom() - self.margin_top
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfOptions {
    pub page: PageSetup,
    /// Body text size in points
    pub font_size: f32,
    pub filter: MessageFilter,
    pub numbering: NumberingStyle,
    pub sender_labels: SenderLabels,
    pub include_thinking: bool,
    pub include_artifacts: bool,
    pub include_timestamps: bool,
    pub include_tools: bool,
    pub include_citations: bool,
    pub include_attachments: bool,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            page: PageSetup::default(),
            font_size: 10.5,
            filter: MessageFilter::default(),
            numbering: NumberingStyle::Numeric,
            sender_labels: SenderLabels::Default,
            include_thinking: true,
            include_artifacts: true,
            include_timestamps: true,
            include_tools: true,
            include_citations: true,
            include_attachments: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_a4_content_box() {
        let page = PageSetup::default();
        assert_eq!(page.content_width(), 174.0);
        assert_eq!(page.content_bottom(), 275.0);
        assert_eq!(page.content_height(), 255.0);
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: PdfOptions = serde_json::from_str(r#"{"include_thinking": false, "page": {"margin_left": 25.0}}"#).unwrap();
        assert!(!options.include_thinking);
        assert!(options.include_tools);
        assert_eq!(options.page.margin_left, 25.0);
        assert_eq!(options.page.width, 210.0);
    }
}
