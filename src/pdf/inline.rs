//! Inline markdown to styled runs
//!
//! Formulas are cut out first (`$...$`), replaced by a marker char, then the
//! rest goes through pulldown-cmark so emphasis can span a formula.

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};

use crate::shared::errors::LatexError;

use super::latex::{latex_to_unicode, split_inline_math, MathSegment};

const FORMULA_MARK: char = '\u{E000}';

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStyle {
    pub bold: bool,
    pub italic: bool,
    pub code: bool,
    pub formula: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineRun {
    pub text: String,
    pub style: RunStyle,
    pub link: Option<String>,
}

impl InlineRun {
    pub fn plain(text: impl Into<String>) -> Self {
        Self { text: text.into(), style: RunStyle::default(), link: None }
    }
}

/// Styled runs of one paragraph. Fails on malformed formulas so the caller
/// can fall back to [`InlineRun::plain`].
pub fn parse_inline(text: &str) -> Result<Vec<InlineRun>, LatexError> {
    let mut formulas = Vec::new();
    let mut masked = String::with_capacity(text.len());
    for segment in split_inline_math(text) {
        match segment {
            MathSegment::Text(t) => masked.push_str(&t.replace(FORMULA_MARK, "")),
            MathSegment::Formula(f) => {
                formulas.push(latex_to_unicode(&f)?);
                masked.push(FORMULA_MARK);
            }
        }
    }

    let source = escape_block_starts(&masked);
    let mut builder = RunBuilder { runs: Vec::new(), formulas: formulas.into_iter() };
    let mut bold = 0u32;
    let mut italic = 0u32;
    let mut links: Vec<String> = Vec::new();

    for event in Parser::new_ext(&source, Options::ENABLE_STRIKETHROUGH) {
        let style = RunStyle { bold: bold > 0, italic: italic > 0, code: false, formula: false };
        let link = links.last().cloned();
        match event {
            Event::Start(Tag::Strong) => bold += 1,
            Event::End(TagEnd::Strong) => bold = bold.saturating_sub(1),
            Event::Start(Tag::Emphasis) => italic += 1,
            Event::End(TagEnd::Emphasis) => italic = italic.saturating_sub(1),
            Event::Start(Tag::Link { dest_url, .. }) => links.push(dest_url.to_string()),
            Event::End(TagEnd::Link) => {
                links.pop();
            }
            Event::Text(t) | Event::Html(t) | Event::InlineHtml(t) => builder.text(&t, style, link),
            Event::Code(t) => builder.push(t.to_string(), RunStyle { code: true, ..style }, link),
            Event::SoftBreak | Event::HardBreak => builder.push(" ".to_string(), style, link),
            _ => {}
        }
    }

    Ok(builder.runs)
}

struct RunBuilder {
    runs: Vec<InlineRun>,
    formulas: std::vec::IntoIter<String>,
}

impl RunBuilder {
    fn text(&mut self, text: &str, style: RunStyle, link: Option<String>) {
        let mut parts = text.split(FORMULA_MARK).peekable();
        while let Some(part) = parts.next() {
            if !part.is_empty() {
                self.push(part.to_string(), style, link.clone());
            }
            if parts.peek().is_some() {
                if let Some(formula) = self.formulas.next() {
                    self.push(formula, RunStyle { formula: true, ..style }, link.clone());
                }
            }
        }
    }

    /// Append, merging with the previous run when styles match
    fn push(&mut self, text: String, style: RunStyle, link: Option<String>) {
        if text.is_empty() {
            return;
        }
        if let Some(last) = self.runs.last_mut() {
            if last.style == style && last.link == link {
                last.text.push_str(&text);
                return;
            }
        }
        self.runs.push(InlineRun { text, style, link });
    }
}

/// Escape what CommonMark would read as block syntax at a line start;
/// block structure is handled before text reaches this module.
fn escape_block_starts(text: &str) -> String {
    text.lines()
        .map(|line| {
            let line = line.trim_start();
            let mut chars = line.chars();
            match chars.next() {
                Some('#' | '>' | '+' | '-' | '=') => format!("\\{}", line),
                Some('*') if chars.next().is_some_and(char::is_whitespace) => format!("\\{}", line),
                Some(c) if c.is_ascii_digit() => {
                    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
                    match line[digits..].chars().next() {
                        Some(p @ ('.' | ')')) => format!("{}\\{}{}", &line[..digits], p, &line[digits + 1..]),
                        _ => line.to_string(),
                    }
                }
                _ => line.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(runs: &[InlineRun]) -> Vec<&str> {
        runs.iter().map(|r| r.text.as_str()).collect()
    }

    #[test]
    fn test_emphasis_code_and_links() {
        let runs = parse_inline("plain **bold** *it* ***both*** `code` [site](https://a.b)").unwrap();
        assert_eq!(texts(&runs), vec!["plain ", "bold", " ", "it", " ", "both", " ", "code", " ", "site"]);
        assert!(runs[1].style.bold && !runs[1].style.italic);
        assert!(runs[3].style.italic);
        assert!(runs[5].style.bold && runs[5].style.italic);
        assert!(runs[7].style.code);
        assert_eq!(runs[9].link.as_deref(), Some("https://a.b"));
    }

    #[test]
    fn test_formula_inside_emphasis() {
        let runs = parse_inline("see **area $\\pi r^2$ here**").unwrap();
        assert_eq!(texts(&runs), vec!["see ", "area ", "π r²", " here"]);
        assert!(runs[2].style.formula && runs[2].style.bold);
    }

    #[test]
    fn test_currency_dollars_stay_text() {
        let runs = parse_inline("costs $5 and $10 today").unwrap();
        assert_eq!(texts(&runs), vec!["costs $5 and $10 today"]);
        assert!(!runs[0].style.formula);
    }

    #[test]
    fn test_malformed_formula_is_error() {
        assert_eq!(parse_inline("bad $\\frac{1}{$"), Err(LatexError::UnbalancedBraces));
    }

    #[test]
    fn test_block_syntax_kept_literal() {
        let runs = parse_inline("2024. was a year\n# not a heading").unwrap();
        assert_eq!(texts(&runs), vec!["2024. was a year # not a heading"]);
    }
}
