//! Draws a [`DocumentLayout`] with printpdf
//!
//! Layout coordinates run from the top of the page; PDF user space runs from
//! the bottom, so every y is flipped here.

use std::io::Cursor;

use printpdf::path::PaintMode;
use printpdf::{Color, IndirectFontRef, Line, Mm, PdfDocument, PdfLayerReference, Point, Rect, Rgb as PdfRgb};

use crate::shared::errors::PdfError;

use super::font::LoadedFont;
use super::layout::{DocumentLayout, DrawCommand, Rgb};

/// Horizontal offset of the second pass used to embolden text
const FAUX_BOLD_OFFSET: f32 = 0.15;

fn color(c: Rgb) -> Color {
    Color::Rgb(PdfRgb::new(c.r, c.g, c.b, None))
}

fn draw(layer: &PdfLayerReference, font: &IndirectFontRef, page_height: f32, command: &DrawCommand) {
    match command {
        DrawCommand::Text { x, y, size, text, color: c, bold, .. } => {
            layer.set_fill_color(color(*c));
            layer.use_text(text.as_str(), *size, Mm(*x), Mm(page_height - y), font);
            if *bold {
                layer.use_text(text.as_str(), *size, Mm(*x + FAUX_BOLD_OFFSET), Mm(page_height - y), font);
            }
        }
        DrawCommand::Rect { x, y, width, height, fill, stroke, .. } => {
            let mode = match (fill, stroke) {
                (Some(_), Some(_)) => PaintMode::FillStroke,
                (Some(_), None) => PaintMode::Fill,
                (None, Some(_)) => PaintMode::Stroke,
                (None, None) => return,
            };
            if let Some(fill) = fill {
                layer.set_fill_color(color(*fill));
            }
            if let Some(stroke) = stroke {
                layer.set_outline_color(color(*stroke));
                layer.set_outline_thickness(0.5);
            }
            let rect = Rect::new(Mm(*x), Mm(page_height - y - height), Mm(x + width), Mm(page_height - y)).with_mode(mode);
            layer.add_rect(rect);
        }
        DrawCommand::Line { x1, y1, x2, y2, color: c, width } => {
            layer.set_outline_color(color(*c));
            // thickness is in points
            layer.set_outline_thickness(width / super::font::MM_PER_PT);
            layer.add_line(Line {
                points: vec![
                    (Point::new(Mm(*x1), Mm(page_height - y1)), false),
                    (Point::new(Mm(*x2), Mm(page_height - y2)), false),
                ],
                is_closed: false,
            });
        }
    }
}

/// Render the laid-out pages into PDF bytes, embedding `font`
pub fn render_pdf(layout: &DocumentLayout, title: &str, font: &LoadedFont) -> Result<Vec<u8>, PdfError> {
    let setup = layout.setup;
    let (doc, first_page, first_layer) = PdfDocument::new(title, Mm(setup.width), Mm(setup.height), "Layer 1");
    let embedded = doc
        .add_external_font(Cursor::new(font.bytes().to_vec()))
        .map_err(|e| PdfError::Render(format!("embedding {}: {}", font.name(), e)))?;

    let mut page_refs = Vec::with_capacity(layout.pages.len());
    for (i, page) in layout.pages.iter().enumerate() {
        let (page_index, layer_index) = if i == 0 {
            (first_page, first_layer)
        } else {
            doc.add_page(Mm(setup.width), Mm(setup.height), "Layer 1")
        };
        let layer = doc.get_page(page_index).get_layer(layer_index);
        for command in &page.commands {
            draw(&layer, &embedded, setup.height, command);
        }
        page_refs.push(page_index);
    }

    for entry in &layout.outline {
        if let Some(page) = page_refs.get(entry.page) {
            doc.add_bookmark(entry.title.as_str(), *page);
        }
    }

    doc.save_to_bytes().map_err(|e| PdfError::Render(e.to_string()))
}
