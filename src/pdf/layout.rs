//! Layout pass of the PDF engine
//!
//! Produces pages of [`DrawCommand`]s in millimetres from the top-left corner.
//! Nothing here touches a PDF library; [`super::render`] draws the result.
//!
//! Document order: title page, table of contents pages (reserved up front
//! when there is more than one message, filled once page numbers are known),
//! message pages, then a footer pass over every page.

use chrono::{DateTime, Local};

use crate::domain::models::Message;
use crate::export::{format_number, ExportSource};
use crate::shared::errors::PdfError;
use crate::shared::logging;

use super::blocks::{parse_blocks, Block};
use super::config::{PageSetup, PdfOptions};
use super::font::{is_wide, TextMeasure, MM_PER_PT};
use super::inline::{parse_inline, InlineRun, RunStyle};
use super::latex::latex_to_unicode;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }
}

pub mod palette {
    use super::Rgb;

    pub const TEXT: Rgb = Rgb::new(0.12, 0.12, 0.14);
    pub const MUTED: Rgb = Rgb::new(0.42, 0.44, 0.48);
    pub const ITALIC: Rgb = Rgb::new(0.25, 0.30, 0.45);
    pub const LINK: Rgb = Rgb::new(0.10, 0.35, 0.80);
    pub const CODE_TEXT: Rgb = Rgb::new(0.55, 0.12, 0.18);
    pub const INLINE_CODE_BG: Rgb = Rgb::new(0.94, 0.94, 0.95);
    pub const CODE_BG: Rgb = Rgb::new(0.965, 0.968, 0.975);
    pub const CODE_BORDER: Rgb = Rgb::new(0.80, 0.82, 0.86);
    pub const LINE_NUMBER: Rgb = Rgb::new(0.60, 0.62, 0.66);
    pub const FORMULA_TEXT: Rgb = Rgb::new(0.35, 0.15, 0.55);
    pub const FORMULA_BG: Rgb = Rgb::new(0.96, 0.94, 0.99);
    pub const FORMULA_BORDER: Rgb = Rgb::new(0.62, 0.50, 0.82);
    pub const HUMAN_BAND: Rgb = Rgb::new(0.91, 0.94, 0.98);
    pub const ASSISTANT_BAND: Rgb = Rgb::new(0.93, 0.97, 0.93);
    pub const RULE: Rgb = Rgb::new(0.82, 0.83, 0.86);
    pub const QUOTE_BAR: Rgb = Rgb::new(0.75, 0.77, 0.82);
}

/// What a text command draws; lets tests and renderers tell runs apart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    Title,
    Meta,
    Heading,
    Label,
    Body,
    Code,
    LineNumber,
    Formula,
    TocEntry,
    Footer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RectKind {
    MessageHeader,
    CodeBlock,
    FormulaBlock,
    InlineCode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// `y` is the baseline
    Text {
        x: f32,
        y: f32,
        size: f32,
        text: String,
        color: Rgb,
        bold: bool,
        kind: TextKind,
    },
    /// `y` is the top edge
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        fill: Option<Rgb>,
        stroke: Option<Rgb>,
        kind: RectKind,
    },
    Line {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        color: Rgb,
        width: f32,
    },
}

#[derive(Debug, Clone, Default)]
pub struct PageLayout {
    pub commands: Vec<DrawCommand>,
}

/// First page and position of a message
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MessageAnchor {
    pub message_index: usize,
    pub page: usize,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutlineEntry {
    pub title: String,
    pub page: usize,
}

#[derive(Debug, Clone)]
pub struct DocumentLayout {
    pub setup: PageSetup,
    pub pages: Vec<PageLayout>,
    pub anchors: Vec<MessageAnchor>,
    pub outline: Vec<OutlineEntry>,
    /// Indices of the table of contents pages
    pub toc_pages: Vec<usize>,
    /// Fragments or messages that fell back to plain text
    pub fallbacks: usize,
}

impl DocumentLayout {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

const LINE_SPACING: f32 = 1.4;
const CODE_LINE_SPACING: f32 = 1.3;
const BOX_PADDING: f32 = 2.0;
const HEADER_HEIGHT: f32 = 8.0;
const PREVIEW_CHARS: usize = 60;

fn line_height(size: f32) -> f32 {
    size * MM_PER_PT * LINE_SPACING
}

#[derive(Debug, Clone, Copy)]
struct Checkpoint {
    pages: usize,
    commands: usize,
    y: f32,
}

#[derive(Debug, Clone)]
struct Piece {
    text: String,
    style: RunStyle,
    link: Option<String>,
    space: bool,
}

/// One line inside a boxed region (code, formula)
#[derive(Debug, Clone)]
struct BoxLine {
    number: Option<usize>,
    text: String,
}

#[derive(Debug, Clone, Copy)]
struct BoxStyle {
    kind: RectKind,
    fill: Rgb,
    stroke: Rgb,
    text_color: Rgb,
    text_kind: TextKind,
    size: f32,
    numbered: bool,
}

#[derive(Debug, Clone, Copy)]
enum Tone {
    Normal,
    Muted,
}

impl Tone {
    fn color(&self) -> Rgb {
        match self {
            Tone::Normal => palette::TEXT,
            Tone::Muted => palette::MUTED,
        }
    }
}

struct LayoutEngine<'a> {
    measure: &'a dyn TextMeasure,
    setup: PageSetup,
    size: f32,
    pages: Vec<PageLayout>,
    y: f32,
    /// Left edge of the current flow
    indent: f32,
    /// Vertical bar drawn beside each text line (quotes, thinking)
    bar: Option<f32>,
    message_index: usize,
    fallbacks: usize,
}

impl<'a> LayoutEngine<'a> {
    fn new(measure: &'a dyn TextMeasure, options: &PdfOptions) -> Self {
        let setup = options.page;
        Self {
            measure,
            setup,
            size: options.font_size,
            pages: vec![PageLayout::default()],
            y: setup.margin_top,
            indent: 0.0,
            bar: None,
            message_index: 0,
            fallbacks: 0,
        }
    }

    fn new_page(&mut self) {
        self.pages.push(PageLayout::default());
        self.y = self.setup.margin_top;
    }

    fn page_index(&self) -> usize {
        self.pages.len().saturating_sub(1)
    }

    fn remaining(&self) -> f32 {
        self.setup.content_bottom() - self.y
    }

    fn at_page_top(&self) -> bool {
        self.y <= self.setup.margin_top + 0.01
    }

    /// Break the page unless `height` still fits
    fn ensure(&mut self, height: f32) {
        if height > self.remaining() && !self.at_page_top() {
            self.new_page();
        }
    }

    fn push(&mut self, command: DrawCommand) {
        if self.pages.is_empty() {
            self.new_page();
        }
        if let Some(page) = self.pages.last_mut() {
            page.commands.push(command);
        }
    }

    fn push_to(&mut self, page: usize, command: DrawCommand) {
        if let Some(page) = self.pages.get_mut(page) {
            page.commands.push(command);
        }
    }

    fn left(&self) -> f32 {
        self.setup.margin_left + self.indent
    }

    fn width(&self) -> f32 {
        self.setup.content_width() - self.indent
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            pages: self.pages.len(),
            commands: self.pages.last().map(|p| p.commands.len()).unwrap_or(0),
            y: self.y,
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint) {
        self.pages.truncate(checkpoint.pages);
        if let Some(page) = self.pages.last_mut() {
            page.commands.truncate(checkpoint.commands);
        }
        self.y = checkpoint.y;
        self.indent = 0.0;
        self.bar = None;
    }

    fn text_width(&self, text: &str, size: f32) -> Result<f32, PdfError> {
        self.measure.text_width(text, size)
    }

    /// Cut `text` with an ellipsis so it fits `width`
    fn fit_text(&self, text: &str, width: f32, size: f32) -> Result<String, PdfError> {
        if self.text_width(text, size)? <= width {
            return Ok(text.to_string());
        }
        let chars: Vec<char> = text.chars().collect();
        let mut keep = chars.len();
        while keep > 0 {
            keep -= 1;
            let candidate: String = chars[..keep].iter().collect::<String>() + "…";
            if self.text_width(&candidate, size)? <= width {
                return Ok(candidate);
            }
        }
        Ok("…".to_string())
    }

    fn spacing(&mut self, amount: f32) {
        if !self.at_page_top() {
            self.y += amount;
        }
    }

    // --- inline text ---

    /// Runs for a fragment; malformed markup degrades to the raw string
    fn inline_or_plain(&mut self, text: &str) -> Vec<InlineRun> {
        match parse_inline(text) {
            Ok(runs) => runs,
            Err(e) => {
                let preview: String = text.chars().take(PREVIEW_CHARS).collect();
                logging::log_pdf_fallback(self.message_index, &preview, &e.to_string());
                self.fallbacks += 1;
                vec![InlineRun::plain(text.replace('\n', " "))]
            }
        }
    }

    fn pieces(runs: &[InlineRun]) -> Vec<Piece> {
        let mut pieces: Vec<Piece> = Vec::new();
        for run in runs {
            let mut word = String::new();
            let flush = |word: &mut String, pieces: &mut Vec<Piece>| {
                if !word.is_empty() {
                    pieces.push(Piece {
                        text: std::mem::take(word),
                        style: run.style,
                        link: run.link.clone(),
                        space: false,
                    });
                }
            };
            for c in run.text.chars() {
                if c.is_whitespace() {
                    flush(&mut word, &mut pieces);
                    if !pieces.last().is_some_and(|p| p.space) {
                        pieces.push(Piece { text: " ".into(), style: run.style, link: run.link.clone(), space: true });
                    }
                } else if is_wide(c) {
                    flush(&mut word, &mut pieces);
                    pieces.push(Piece { text: c.to_string(), style: run.style, link: run.link.clone(), space: false });
                } else {
                    word.push(c);
                }
            }
            flush(&mut word, &mut pieces);
        }
        pieces
    }

    /// Split a piece too wide for one line into chunks of at most `width`
    fn break_piece(&self, piece: &Piece, width: f32, size: f32) -> Result<Vec<(Piece, f32)>, PdfError> {
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_w = 0.0;
        for c in piece.text.chars() {
            let w = self.text_width(c.encode_utf8(&mut [0u8; 4]), size)?;
            if current_w + w > width && !current.is_empty() {
                chunks.push((Piece { text: std::mem::take(&mut current), ..piece.clone() }, current_w));
                current_w = 0.0;
            }
            current.push(c);
            current_w += w;
        }
        if !current.is_empty() {
            chunks.push((Piece { text: current, ..piece.clone() }, current_w));
        }
        Ok(chunks)
    }

    fn wrap(&self, runs: &[InlineRun], width: f32, size: f32) -> Result<Vec<Vec<(Piece, f32)>>, PdfError> {
        let mut lines: Vec<Vec<(Piece, f32)>> = vec![Vec::new()];
        let mut line_w = 0.0;

        for piece in Self::pieces(runs) {
            let w = self.text_width(&piece.text, size)?;
            let line_empty = lines.last().is_none_or(|l| l.is_empty());

            if piece.space {
                if !line_empty && line_w + w <= width {
                    line_w += w;
                    if let Some(line) = lines.last_mut() {
                        line.push((piece, w));
                    }
                }
                continue;
            }

            if line_w + w <= width {
                line_w += w;
                if let Some(line) = lines.last_mut() {
                    line.push((piece, w));
                }
                continue;
            }

            if w <= width {
                lines.push(vec![(piece, w)]);
                line_w = w;
                continue;
            }

            // Longer than a full line: hard-break by characters
            if !line_empty {
                lines.push(Vec::new());
            }
            let chunks = self.break_piece(&piece, width, size)?;
            let last = chunks.len().saturating_sub(1);
            for (i, (chunk, cw)) in chunks.into_iter().enumerate() {
                if let Some(line) = lines.last_mut() {
                    line.push((chunk, cw));
                }
                line_w = cw;
                if i < last {
                    lines.push(Vec::new());
                }
            }
        }

        for line in &mut lines {
            while line.last().is_some_and(|(p, _)| p.space) {
                line.pop();
            }
        }
        lines.retain(|l| !l.is_empty());
        Ok(lines)
    }

    fn layout_runs(&mut self, runs: &[InlineRun], size: f32, color: Rgb, kind: TextKind, force_bold: bool) -> Result<(), PdfError> {
        let lh = line_height(size);
        let x0 = self.left();
        let lines = self.wrap(runs, self.width(), size)?;

        for line in lines {
            self.ensure(lh);
            let top = self.y;
            let baseline = top + lh * 0.72;
            if let Some(bar_x) = self.bar {
                self.push(DrawCommand::Line { x1: bar_x, y1: top, x2: bar_x, y2: top + lh, color: palette::QUOTE_BAR, width: 0.6 });
            }

            // Merge consecutive pieces sharing a style into one text command
            let mut segments: Vec<(String, f32, RunStyle, Option<String>)> = Vec::new();
            for (piece, w) in line {
                match segments.last_mut() {
                    Some((text, width, style, link)) if *style == piece.style && *link == piece.link => {
                        text.push_str(&piece.text);
                        *width += w;
                    }
                    _ => segments.push((piece.text, w, piece.style, piece.link)),
                }
            }

            let mut x = x0;
            for (text, w, style, link) in segments {
                let (seg_color, seg_kind) = if style.formula {
                    (palette::FORMULA_TEXT, TextKind::Formula)
                } else if style.code {
                    (palette::CODE_TEXT, TextKind::Code)
                } else if link.is_some() {
                    (palette::LINK, kind)
                } else if style.italic {
                    (palette::ITALIC, kind)
                } else {
                    (color, kind)
                };
                if style.code && !text.trim().is_empty() {
                    self.push(DrawCommand::Rect {
                        x: x - 0.3,
                        y: top + 0.4,
                        width: w + 0.6,
                        height: lh - 0.8,
                        fill: Some(palette::INLINE_CODE_BG),
                        stroke: None,
                        kind: RectKind::InlineCode,
                    });
                }
                if link.is_some() && !text.trim().is_empty() {
                    self.push(DrawCommand::Line { x1: x, y1: baseline + 0.5, x2: x + w, y2: baseline + 0.5, color: palette::LINK, width: 0.2 });
                }
                self.push(DrawCommand::Text {
                    x,
                    y: baseline,
                    size,
                    text,
                    color: seg_color,
                    bold: style.bold || force_bold,
                    kind: seg_kind,
                });
                x += w;
            }
            self.y += lh;
        }
        Ok(())
    }

    fn layout_plain(&mut self, text: &str, size: f32, color: Rgb, kind: TextKind) -> Result<(), PdfError> {
        for line in text.lines() {
            if line.trim().is_empty() {
                self.y += line_height(size) * 0.5;
                continue;
            }
            self.layout_runs(&[InlineRun::plain(line)], size, color, kind, false)?;
        }
        Ok(())
    }

    // --- boxed regions (code, formulas) ---

    fn wrap_box_lines(&self, lines: &[BoxLine], width: f32, size: f32) -> Result<Vec<BoxLine>, PdfError> {
        let mut out = Vec::with_capacity(lines.len());
        for line in lines {
            let text = line.text.replace('\t', "    ");
            if self.text_width(&text, size)? <= width {
                out.push(BoxLine { number: line.number, text });
                continue;
            }
            let piece = Piece { text, style: RunStyle::default(), link: None, space: false };
            for (i, (chunk, _)) in self.break_piece(&piece, width, size)?.into_iter().enumerate() {
                out.push(BoxLine { number: if i == 0 { line.number } else { None }, text: chunk.text });
            }
        }
        Ok(out)
    }

    /// Lay out a bordered region that continues across page breaks.
    /// Each page gets its own background segment, drawn before its lines.
    fn layout_boxed(&mut self, lines: Vec<BoxLine>, style: BoxStyle) -> Result<(), PdfError> {
        let lh = style.size * MM_PER_PT * CODE_LINE_SPACING;
        let x = self.left();
        let width = self.width();
        let gutter = if style.numbered {
            let max_number = lines.iter().filter_map(|l| l.number).max().unwrap_or(1);
            self.text_width(&format!("{}", max_number), style.size)? + 2.0 * BOX_PADDING
        } else {
            0.0
        };
        let text_x = x + gutter + BOX_PADDING;
        let text_width = (width - gutter - 2.0 * BOX_PADDING).max(10.0);
        let lines = self.wrap_box_lines(&lines, text_width, style.size)?;
        if lines.is_empty() {
            return Ok(());
        }

        let mut next = 0;
        while next < lines.len() {
            if self.remaining() < 2.0 * BOX_PADDING + lh && !self.at_page_top() {
                self.new_page();
            }
            let available = self.remaining() - 2.0 * BOX_PADDING;
            let fit = ((available / lh).floor() as usize).max(1).min(lines.len() - next);
            let height = fit as f32 * lh + 2.0 * BOX_PADDING;
            let top = self.y;

            self.push(DrawCommand::Rect {
                x,
                y: top,
                width,
                height,
                fill: Some(style.fill),
                stroke: Some(style.stroke),
                kind: style.kind,
            });
            if style.numbered {
                self.push(DrawCommand::Line {
                    x1: x + gutter,
                    y1: top,
                    x2: x + gutter,
                    y2: top + height,
                    color: style.stroke,
                    width: 0.2,
                });
            }

            for (i, line) in lines[next..next + fit].iter().enumerate() {
                let baseline = top + BOX_PADDING + i as f32 * lh + lh * 0.75;
                if let Some(number) = line.number {
                    let label = number.to_string();
                    let label_w = self.text_width(&label, style.size)?;
                    self.push(DrawCommand::Text {
                        x: x + gutter - BOX_PADDING - label_w,
                        y: baseline,
                        size: style.size,
                        text: label,
                        color: palette::LINE_NUMBER,
                        bold: false,
                        kind: TextKind::LineNumber,
                    });
                }
                if !line.text.is_empty() {
                    self.push(DrawCommand::Text {
                        x: text_x,
                        y: baseline,
                        size: style.size,
                        text: line.text.clone(),
                        color: style.text_color,
                        bold: false,
                        kind: style.text_kind,
                    });
                }
            }

            self.y = top + height;
            next += fit;
            if next < lines.len() {
                self.new_page();
            }
        }
        self.spacing(2.0);
        Ok(())
    }

    fn layout_code(&mut self, source_lines: &[String]) -> Result<(), PdfError> {
        let lines = source_lines
            .iter()
            .enumerate()
            .map(|(i, l)| BoxLine { number: Some(i + 1), text: l.clone() })
            .collect();
        self.layout_boxed(
            lines,
            BoxStyle {
                kind: RectKind::CodeBlock,
                fill: palette::CODE_BG,
                stroke: palette::CODE_BORDER,
                text_color: palette::TEXT,
                text_kind: TextKind::Code,
                size: self.size * 0.88,
                numbered: true,
            },
        )
    }

    fn layout_formula(&mut self, body: &str) -> Result<(), PdfError> {
        match latex_to_unicode(body) {
            Ok(unicode) => {
                let lines = unicode.lines().map(|l| BoxLine { number: None, text: l.trim().to_string() }).collect();
                self.layout_boxed(
                    lines,
                    BoxStyle {
                        kind: RectKind::FormulaBlock,
                        fill: palette::FORMULA_BG,
                        stroke: palette::FORMULA_BORDER,
                        text_color: palette::FORMULA_TEXT,
                        text_kind: TextKind::Formula,
                        size: self.size * 1.05,
                        numbered: false,
                    },
                )
            }
            Err(e) => {
                logging::log_pdf_fallback(self.message_index, body, &e.to_string());
                self.fallbacks += 1;
                self.layout_plain(&format!("$${}$$", body), self.size, palette::TEXT, TextKind::Body)
            }
        }
    }

    // --- blocks ---

    fn layout_blocks(&mut self, text: &str, tone: Tone) -> Result<(), PdfError> {
        let base_indent = self.indent;
        let size = self.size;
        let gap = line_height(size) * 0.35;

        for block in parse_blocks(text) {
            match block {
                Block::Heading { level, text } => {
                    let scale = match level {
                        1 => 1.45,
                        2 => 1.3,
                        3 => 1.15,
                        _ => 1.05,
                    };
                    self.spacing(gap);
                    self.ensure(line_height(size * scale) * 2.0);
                    let runs = self.inline_or_plain(&text);
                    self.layout_runs(&runs, size * scale, tone.color(), TextKind::Heading, true)?;
                    self.spacing(gap * 0.5);
                }
                Block::Paragraph(text) => {
                    let runs = self.inline_or_plain(&text);
                    self.layout_runs(&runs, size, tone.color(), TextKind::Body, false)?;
                    self.spacing(gap);
                }
                Block::ListItem { marker, depth, text } => {
                    let marker_x = self.left() + depth as f32 * 5.0;
                    let marker_w = self.text_width(&marker, size)?;
                    self.ensure(line_height(size));
                    self.push(DrawCommand::Text {
                        x: marker_x,
                        y: self.y + line_height(size) * 0.72,
                        size,
                        text: marker,
                        color: tone.color(),
                        bold: false,
                        kind: TextKind::Body,
                    });
                    self.indent = base_indent + depth as f32 * 5.0 + marker_w.max(3.0) + 1.5;
                    let runs = self.inline_or_plain(&text);
                    let result = self.layout_runs(&runs, size, tone.color(), TextKind::Body, false);
                    self.indent = base_indent;
                    result?;
                    self.spacing(gap * 0.3);
                }
                Block::Quote(text) => {
                    let outer_bar = self.bar;
                    self.bar = Some(self.left() + 1.0);
                    self.indent = base_indent + 4.0;
                    let runs = self.inline_or_plain(&text);
                    let result = self.layout_runs(&runs, size, palette::MUTED, TextKind::Body, false);
                    self.indent = base_indent;
                    self.bar = outer_bar;
                    result?;
                    self.spacing(gap);
                }
                Block::Rule => {
                    self.ensure(4.0);
                    let y = self.y + 2.0;
                    let (x1, x2) = (self.left(), self.left() + self.width());
                    self.push(DrawCommand::Line { x1, y1: y, x2, y2: y, color: palette::RULE, width: 0.3 });
                    self.y += 4.0;
                }
                Block::Code { lines, .. } => self.layout_code(&lines)?,
                Block::Formula(body) => self.layout_formula(&body)?,
            }
        }
        Ok(())
    }

    fn layout_label(&mut self, text: &str) -> Result<(), PdfError> {
        self.spacing(line_height(self.size) * 0.2);
        self.ensure(line_height(self.size) * 2.0);
        let size = self.size * 0.9;
        self.layout_runs(&[InlineRun::plain(text)], size, palette::MUTED, TextKind::Label, true)
    }

    // --- document parts ---

    fn layout_title_page(&mut self, source: &ExportSource<'_>, message_count: usize, exported_at: DateTime<Local>) -> Result<(), PdfError> {
        let meta = source.metadata;
        self.y = self.setup.margin_top + 40.0;
        let title_runs = vec![InlineRun::plain(source.title())];
        self.layout_runs(&title_runs, 22.0, palette::TEXT, TextKind::Title, true)?;
        self.y += 8.0;

        let mut lines = vec![format!("Platform: {}", meta.platform)];
        if let Some(model) = &meta.model {
            lines.push(format!("Model: {}", model));
        }
        if let Some(created) = &meta.created_at {
            lines.push(format!("Created: {}", created));
        }
        if let Some(updated) = &meta.updated_at {
            lines.push(format!("Updated: {}", updated));
        }
        lines.push(format!("Exported: {}", exported_at.format("%Y-%m-%d %H:%M")));
        lines.push(format!("Messages: {}", message_count));
        for line in lines {
            self.layout_runs(&[InlineRun::plain(line)], 11.0, palette::MUTED, TextKind::Meta, false)?;
        }
        Ok(())
    }

    fn toc_line_height(&self) -> f32 {
        line_height(self.size) * 1.1
    }

    fn toc_heading_height(&self) -> f32 {
        line_height(self.size * 1.45) + 6.0
    }

    fn reserve_toc(&mut self, entries: usize) -> Vec<usize> {
        let per_page = ((self.setup.content_height() - self.toc_heading_height()) / self.toc_line_height())
            .floor()
            .max(1.0) as usize;
        let count = entries.div_ceil(per_page);
        let mut pages = Vec::with_capacity(count);
        for _ in 0..count {
            self.new_page();
            pages.push(self.page_index());
        }
        pages
    }

    /// Write the entries onto the reserved pages; returns how many fit
    fn fill_toc(&mut self, toc_pages: &[usize], entries: &[(String, usize)]) -> Result<usize, PdfError> {
        let Some(&first) = toc_pages.first() else {
            return Ok(0);
        };
        let size = self.size;
        let lh = self.toc_line_height();
        let left = self.setup.margin_left;
        let right = self.setup.margin_left + self.setup.content_width();

        let heading_size = size * 1.45;
        self.push_to(first, DrawCommand::Text {
            x: left,
            y: self.setup.margin_top + line_height(heading_size) * 0.72,
            size: heading_size,
            text: "Contents".to_string(),
            color: palette::TEXT,
            bold: true,
            kind: TextKind::Heading,
        });

        let dot_w = self.text_width(". ", size)?.max(0.1);
        let mut page_slot = 0;
        let mut y = self.setup.margin_top + self.toc_heading_height();
        let mut written = 0;

        for (label, page) in entries {
            if y + lh > self.setup.content_bottom() {
                page_slot += 1;
                y = self.setup.margin_top;
            }
            let Some(&toc_page) = toc_pages.get(page_slot) else {
                logging::log_toc_overflow(written, entries.len() - written);
                break;
            };
            let baseline = y + lh * 0.72;
            let number = (page + 1).to_string();
            let number_w = self.text_width(&number, size)?;
            let label_max = (right - left - number_w - 12.0).max(10.0);
            let label = self.fit_text(label, label_max, size)?;
            let label_w = self.text_width(&label, size)?;

            let gap = right - number_w - 2.0 - (left + label_w + 2.0);
            let dots = if gap > dot_w { ". ".repeat((gap / dot_w).floor() as usize) } else { String::new() };

            self.push_to(toc_page, DrawCommand::Text {
                x: left,
                y: baseline,
                size,
                text: label,
                color: palette::TEXT,
                bold: false,
                kind: TextKind::TocEntry,
            });
            if !dots.is_empty() {
                self.push_to(toc_page, DrawCommand::Text {
                    x: left + label_w + 2.0,
                    y: baseline,
                    size,
                    text: dots,
                    color: palette::RULE,
                    bold: false,
                    kind: TextKind::TocEntry,
                });
            }
            self.push_to(toc_page, DrawCommand::Text {
                x: right - number_w,
                y: baseline,
                size,
                text: number,
                color: palette::LINK,
                bold: false,
                kind: TextKind::TocEntry,
            });
            y += lh;
            written += 1;
        }
        Ok(written)
    }

    fn layout_footers(&mut self, exported_at: DateTime<Local>) {
        let total = self.pages.len();
        let size = self.size * 0.75;
        let line_y = self.setup.content_bottom() + 4.0;
        let baseline = line_y + 5.0;
        let left = self.setup.margin_left;
        let right = left + self.setup.content_width();
        let stamp = format!("Exported {}", exported_at.format("%Y-%m-%d %H:%M"));

        for page in 0..total {
            let label = format!("page {} / {}", page + 1, total);
            // Footer text is short; an estimate is fine if measuring fails
            let label_w = self
                .text_width(&label, size)
                .unwrap_or(label.chars().count() as f32 * size * MM_PER_PT * 0.5);
            self.push_to(page, DrawCommand::Line { x1: left, y1: line_y, x2: right, y2: line_y, color: palette::RULE, width: 0.2 });
            self.push_to(page, DrawCommand::Text {
                x: left,
                y: baseline,
                size,
                text: stamp.clone(),
                color: palette::MUTED,
                bold: false,
                kind: TextKind::Footer,
            });
            self.push_to(page, DrawCommand::Text {
                x: right - label_w,
                y: baseline,
                size,
                text: label,
                color: palette::MUTED,
                bold: false,
                kind: TextKind::Footer,
            });
        }
    }

    fn layout_message_header(&mut self, message: &Message, number_label: &str, options: &PdfOptions) -> Result<(), PdfError> {
        let x = self.setup.margin_left;
        let width = self.setup.content_width();
        let top = self.y;
        let band = if message.sender.is_human() { palette::HUMAN_BAND } else { palette::ASSISTANT_BAND };
        self.push(DrawCommand::Rect {
            x,
            y: top,
            width,
            height: HEADER_HEIGHT,
            fill: Some(band),
            stroke: None,
            kind: RectKind::MessageHeader,
        });

        let size = self.size;
        let baseline = top + HEADER_HEIGHT * 0.68;
        let mut title = format!("{}{}", number_label, options.sender_labels.label(message.sender));
        if !message.branch.is_main() {
            title.push_str(&format!("  [{}]", message.branch.branch_id));
        }
        self.push(DrawCommand::Text {
            x: x + 2.0,
            y: baseline,
            size,
            text: title,
            color: palette::TEXT,
            bold: true,
            kind: TextKind::Label,
        });

        if options.include_timestamps {
            if let Some(ts) = &message.timestamp {
                let ts_size = size * 0.8;
                let ts_w = self.text_width(ts, ts_size)?;
                self.push(DrawCommand::Text {
                    x: x + width - 2.0 - ts_w,
                    y: baseline,
                    size: ts_size,
                    text: ts.clone(),
                    color: palette::MUTED,
                    bold: false,
                    kind: TextKind::Meta,
                });
            }
        }
        self.y = top + HEADER_HEIGHT + 2.5;
        Ok(())
    }

    fn layout_message(&mut self, message: &Message, number_label: &str, options: &PdfOptions) -> Result<(), PdfError> {
        self.layout_message_header(message, number_label, options)?;

        if options.include_thinking {
            if let Some(thinking) = message.thinking_text() {
                self.layout_label("Thinking")?;
                self.bar = Some(self.setup.margin_left + 1.0);
                self.indent = 4.0;
                let result = self.layout_blocks(thinking, Tone::Muted);
                self.bar = None;
                self.indent = 0.0;
                result?;
            }
        }

        if message.has_text() {
            self.layout_blocks(&message.display_text, Tone::Normal)?;
        }

        if options.include_attachments && message.sender.is_human() {
            for attachment in &message.attachments {
                let label = match attachment.file_size {
                    Some(size) => format!("Attachment: {} ({} bytes)", attachment.file_name, size),
                    None => format!("Attachment: {}", attachment.file_name),
                };
                self.layout_label(&label)?;
            }
        }

        if options.include_artifacts && !message.sender.is_human() {
            for artifact in &message.artifacts {
                self.layout_label(&format!("Artifact: {}", artifact.title))?;
                if !artifact.content.is_empty() {
                    let lines: Vec<String> = artifact.content.lines().map(String::from).collect();
                    self.layout_code(&lines)?;
                } else if artifact.old_str.is_some() || artifact.new_str.is_some() {
                    let lines: Vec<String> = artifact
                        .old_str
                        .iter()
                        .flat_map(|s| s.lines().map(|l| format!("- {}", l)))
                        .chain(artifact.new_str.iter().flat_map(|s| s.lines().map(|l| format!("+ {}", l))))
                        .collect();
                    self.layout_code(&lines)?;
                }
            }
        }

        if options.include_tools {
            for tool in &message.tools {
                self.layout_label(&format!("Tool: {}", tool.name))?;
                if !tool.input.is_null() {
                    let input = serde_json::to_string_pretty(&tool.input).unwrap_or_else(|_| tool.input.to_string());
                    let lines: Vec<String> = input.lines().map(String::from).collect();
                    self.layout_code(&lines)?;
                }
                if let Some(result) = &tool.result {
                    self.layout_label(if tool.is_error { "Error" } else { "Result" })?;
                    let lines: Vec<String> = result.lines().map(String::from).collect();
                    self.layout_code(&lines)?;
                }
            }
        }

        if options.include_citations && !message.citations.is_empty() {
            self.layout_label("Sources")?;
            for (i, citation) in message.citations.iter().enumerate() {
                let title = citation.title.clone().filter(|t| !t.is_empty()).unwrap_or_else(|| citation.url.clone());
                let runs = vec![
                    InlineRun::plain(format!("{}. ", i + 1)),
                    InlineRun { text: title, style: RunStyle::default(), link: Some(citation.url.clone()) },
                ];
                self.layout_runs(&runs, self.size * 0.9, palette::TEXT, TextKind::Body, false)?;
            }
        }

        self.spacing(line_height(self.size));
        Ok(())
    }

    /// Last resort for a message whose layout failed: header and raw text
    fn layout_message_plain(&mut self, message: &Message, number_label: &str, options: &PdfOptions) -> Result<(), PdfError> {
        self.layout_message_header(message, number_label, options)?;
        self.layout_plain(&message.display_text, self.size, palette::TEXT, TextKind::Body)?;
        self.spacing(line_height(self.size));
        Ok(())
    }
}

fn preview(message: &Message) -> String {
    let flat: String = message.display_text.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut preview: String = flat.chars().take(PREVIEW_CHARS).collect();
    if flat.chars().count() > PREVIEW_CHARS {
        preview.push('…');
    }
    preview
}

/// Lay out a whole document. Failures inside one message degrade that
/// message to plain text; only measurement failures outside messages abort.
pub fn layout_document(
    source: &ExportSource<'_>,
    options: &PdfOptions,
    measure: &dyn TextMeasure,
    exported_at: DateTime<Local>,
) -> Result<DocumentLayout, PdfError> {
    let messages = options.filter.apply(source);
    if messages.is_empty() {
        return Err(PdfError::EmptyInput(format!("{} has no messages to export", source.title())));
    }

    let mut engine = LayoutEngine::new(measure, options);
    engine.layout_title_page(source, messages.len(), exported_at)?;

    let toc_pages = if messages.len() > 1 { engine.reserve_toc(messages.len()) } else { Vec::new() };

    engine.new_page();
    let mut anchors = Vec::with_capacity(messages.len());
    let mut toc_entries = Vec::with_capacity(messages.len());
    let mut outline = Vec::with_capacity(messages.len() + 1);
    if let Some(&first) = toc_pages.first() {
        outline.push(OutlineEntry { title: "Contents".to_string(), page: first });
    }

    for (index, message) in messages.iter().enumerate() {
        engine.message_index = index;
        let number = format_number(options.numbering, index + 1);
        let number_label = if number.is_empty() { number } else { format!("{} ", number) };

        engine.ensure(HEADER_HEIGHT + line_height(engine.size) * 2.0);
        let anchor = MessageAnchor { message_index: index, page: engine.page_index(), y: engine.y };
        let checkpoint = engine.checkpoint();

        if let Err(e) = engine.layout_message(message, &number_label, options) {
            engine.restore(checkpoint);
            logging::log_pdf_fallback(index, "message", &e.to_string());
            engine.fallbacks += 1;
            if let Err(e) = engine.layout_message_plain(message, &number_label, options) {
                engine.restore(checkpoint);
                logging::log_pdf_fallback(index, "plain text", &e.to_string());
            }
        }

        let label = format!("{}{}: {}", number_label, options.sender_labels.label(message.sender), preview(message));
        toc_entries.push((label.clone(), anchor.page));
        outline.push(OutlineEntry { title: label, page: anchor.page });
        anchors.push(anchor);
    }

    engine.fill_toc(&toc_pages, &toc_entries)?;
    engine.layout_footers(exported_at);

    Ok(DocumentLayout {
        setup: engine.setup,
        fallbacks: engine.fallbacks,
        pages: engine.pages,
        anchors,
        outline,
        toc_pages,
    })
}
