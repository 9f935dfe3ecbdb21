//! Fonts and text measurement
//!
//! The engine never fetches fonts. The host hands over a [`FontStatus`];
//! only `Ready` lets an export start.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use crate::shared::errors::PdfError;

/// Millimetres per typographic point
pub const MM_PER_PT: f32 = 25.4 / 72.0;

/// Width of laid-out text
pub trait TextMeasure: Send + Sync {
    /// Advance width of `text` at `size_pt`, in millimetres
    fn text_width(&self, text: &str, size_pt: f32) -> Result<f32, PdfError>;
}

/// Advance widths from a TrueType/OpenType face, cached per char
pub struct FontMetrics {
    data: Arc<Vec<u8>>,
    units_per_em: f32,
    fallback_advance: u16,
    advances: DashMap<char, u16>,
}

impl FontMetrics {
    pub fn new(data: Arc<Vec<u8>>) -> Result<Self, PdfError> {
        let face = ttf_parser::Face::parse(&data, 0).map_err(|e| PdfError::FontFailed(e.to_string()))?;
        let units_per_em = face.units_per_em();
        let fallback_advance = face
            .glyph_index('?')
            .and_then(|g| face.glyph_hor_advance(g))
            .unwrap_or(units_per_em / 2);
        Ok(Self {
            units_per_em: units_per_em as f32,
            fallback_advance,
            advances: DashMap::new(),
            data: Arc::clone(&data),
        })
    }

    fn fill_missing(&self, text: &str) -> Result<(), PdfError> {
        let missing: Vec<char> = text.chars().filter(|c| !self.advances.contains_key(c)).collect();
        if missing.is_empty() {
            return Ok(());
        }
        let face = ttf_parser::Face::parse(&self.data, 0).map_err(|e| PdfError::Measure(e.to_string()))?;
        for c in missing {
            let advance = face
                .glyph_index(c)
                .and_then(|g| face.glyph_hor_advance(g))
                .unwrap_or(self.fallback_advance);
            self.advances.insert(c, advance);
        }
        Ok(())
    }
}

impl TextMeasure for FontMetrics {
    fn text_width(&self, text: &str, size_pt: f32) -> Result<f32, PdfError> {
        self.fill_missing(text)?;
        let units: u32 = text
            .chars()
            .map(|c| self.advances.get(&c).map(|a| *a as u32).unwrap_or(self.fallback_advance as u32))
            .sum();
        Ok(units as f32 / self.units_per_em * size_pt * MM_PER_PT)
    }
}

impl fmt::Debug for FontMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontMetrics")
            .field("units_per_em", &self.units_per_em)
            .field("cached_glyphs", &self.advances.len())
            .finish()
    }
}

/// Approximate measurer: half an em per char, a full em for wide (CJK) chars
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedMeasure;

impl TextMeasure for FixedMeasure {
    fn text_width(&self, text: &str, size_pt: f32) -> Result<f32, PdfError> {
        let ems: f32 = text.chars().map(|c| if is_wide(c) { 1.0 } else { 0.5 }).sum();
        Ok(ems * size_pt * MM_PER_PT)
    }
}

/// East Asian wide characters, which may break anywhere
pub fn is_wide(c: char) -> bool {
    matches!(c as u32,
        0x1100..=0x115F
        | 0x2E80..=0x303E
        | 0x3041..=0x33FF
        | 0x3400..=0x4DBF
        | 0x4E00..=0x9FFF
        | 0xA000..=0xA4CF
        | 0xAC00..=0xD7A3
        | 0xF900..=0xFAFF
        | 0xFE30..=0xFE4F
        | 0xFF00..=0xFF60
        | 0xFFE0..=0xFFE6)
}

/// A font handed over by the host, parsed and ready to embed
#[derive(Debug, Clone)]
pub struct LoadedFont {
    name: String,
    data: Arc<Vec<u8>>,
    metrics: Arc<FontMetrics>,
}

impl LoadedFont {
    pub fn from_bytes(name: impl Into<String>, data: Vec<u8>) -> Result<Self, PdfError> {
        let data = Arc::new(data);
        let metrics = FontMetrics::new(Arc::clone(&data))?;
        Ok(Self { name: name.into(), data, metrics: Arc::new(metrics) })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn metrics(&self) -> &FontMetrics {
        &self.metrics
    }
}

/// Font readiness as reported by the host
#[derive(Debug, Clone, Default)]
pub enum FontStatus {
    #[default]
    NotRequested,
    /// Download in progress, percent complete
    Downloading(u8),
    Failed(String),
    Ready(LoadedFont),
}

impl FontStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, FontStatus::Ready(_))
    }

    /// The loaded font, or the error explaining why export cannot start
    pub fn ready(&self) -> Result<&LoadedFont, PdfError> {
        match self {
            FontStatus::Ready(font) => Ok(font),
            FontStatus::NotRequested => Err(PdfError::FontNotRequested),
            FontStatus::Downloading(progress) => Err(PdfError::FontDownloading(*progress)),
            FontStatus::Failed(reason) => Err(PdfError::FontFailed(reason.clone())),
        }
    }
}
