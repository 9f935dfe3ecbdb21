//! Block-level markdown for the PDF layout

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { level: u8, text: String },
    Paragraph(String),
    ListItem { marker: String, depth: usize, text: String },
    Quote(String),
    Rule,
    Code { language: Option<String>, lines: Vec<String> },
    /// `$$...$$` body
    Formula(String),
}

fn is_rule(line: &str) -> bool {
    let compact: String = line.chars().filter(|c| !c.is_whitespace()).collect();
    compact.len() >= 3
        && (compact.chars().all(|c| c == '-') || compact.chars().all(|c| c == '*') || compact.chars().all(|c| c == '_'))
}

fn heading(line: &str) -> Option<(u8, String)> {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = &line[hashes..];
    if !rest.is_empty() && !rest.starts_with(' ') {
        return None;
    }
    Some((hashes as u8, rest.trim().trim_end_matches('#').trim().to_string()))
}

fn list_item(line: &str) -> Option<(String, usize, String)> {
    let indent = line.chars().take_while(|c| *c == ' ').count();
    let body = &line[indent..];
    let depth = indent / 2;
    for bullet in ["- ", "* ", "+ "] {
        if let Some(text) = body.strip_prefix(bullet) {
            return Some(("•".to_string(), depth, text.trim().to_string()));
        }
    }
    let digits = body.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 && digits <= 9 {
        let rest = &body[digits..];
        if let Some(text) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return Some((format!("{}.", &body[..digits]), depth, text.trim().to_string()));
        }
    }
    None
}

fn fence(line: &str) -> Option<(&'static str, String)> {
    let trimmed = line.trim_start();
    for marker in ["```", "~~~"] {
        if let Some(info) = trimmed.strip_prefix(marker) {
            return Some((marker, info.trim_start_matches(marker.chars().next().unwrap_or('`')).trim().to_string()));
        }
    }
    None
}

fn flush(paragraph: &mut Vec<&str>, blocks: &mut Vec<Block>) {
    if !paragraph.is_empty() {
        blocks.push(Block::Paragraph(paragraph.join("\n")));
        paragraph.clear();
    }
}

/// Split message text into blocks. Unclosed fences run to the end of the
/// text; an unclosed `$$` stays a paragraph.
pub fn parse_blocks(text: &str) -> Vec<Block> {
    let lines: Vec<&str> = text.lines().collect();
    let mut blocks = Vec::new();
    let mut paragraph: Vec<&str> = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        let trimmed = line.trim();

        if let Some((marker, info)) = fence(line) {
            flush(&mut paragraph, &mut blocks);
            let mut code = Vec::new();
            i += 1;
            while i < lines.len() && !lines[i].trim_start().starts_with(marker) {
                code.push(lines[i].to_string());
                i += 1;
            }
            i += 1;
            let language = if info.is_empty() { None } else { Some(info) };
            blocks.push(Block::Code { language, lines: code });
            continue;
        }

        if trimmed.starts_with("$$") {
            let after = &trimmed[2..];
            if let Some(end) = after.find("$$") {
                flush(&mut paragraph, &mut blocks);
                blocks.push(Block::Formula(after[..end].trim().to_string()));
                i += 1;
                continue;
            }
            let mut body = vec![after.to_string()];
            let mut j = i + 1;
            let mut closed = false;
            while j < lines.len() {
                let l = lines[j].trim_end();
                if let Some(stripped) = l.strip_suffix("$$") {
                    body.push(stripped.to_string());
                    closed = true;
                    break;
                }
                body.push(l.to_string());
                j += 1;
            }
            if closed {
                flush(&mut paragraph, &mut blocks);
                blocks.push(Block::Formula(body.join("\n").trim().to_string()));
                i = j + 1;
                continue;
            }
        }

        if trimmed.is_empty() {
            flush(&mut paragraph, &mut blocks);
        } else if is_rule(trimmed) {
            flush(&mut paragraph, &mut blocks);
            blocks.push(Block::Rule);
        } else if let Some((level, text)) = heading(trimmed) {
            flush(&mut paragraph, &mut blocks);
            blocks.push(Block::Heading { level, text });
        } else if let Some(quoted) = trimmed.strip_prefix('>') {
            flush(&mut paragraph, &mut blocks);
            let quoted = quoted.trim();
            match blocks.last_mut() {
                Some(Block::Quote(existing)) if i > 0 && lines[i - 1].trim().starts_with('>') => {
                    existing.push('\n');
                    existing.push_str(quoted);
                }
                _ => blocks.push(Block::Quote(quoted.to_string())),
            }
        } else if let Some((marker, depth, text)) = list_item(line) {
            flush(&mut paragraph, &mut blocks);
            blocks.push(Block::ListItem { marker, depth, text });
        } else {
            paragraph.push(trimmed);
        }
        i += 1;
    }
    flush(&mut paragraph, &mut blocks);
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_blocks() {
        let text = "# Title\n\nSome *text*\ncontinued\n\n- one\n  - nested\n2. two\n\n> quoted\n> more\n\n---\n```rust\nfn main() {}\n```\n$$\\frac{1}{2}$$";
        let blocks = parse_blocks(text);
        assert_eq!(
            blocks,
            vec![
                Block::Heading { level: 1, text: "Title".into() },
                Block::Paragraph("Some *text*\ncontinued".into()),
                Block::ListItem { marker: "•".into(), depth: 0, text: "one".into() },
                Block::ListItem { marker: "•".into(), depth: 1, text: "nested".into() },
                Block::ListItem { marker: "2.".into(), depth: 0, text: "two".into() },
                Block::Quote("quoted\nmore".into()),
                Block::Rule,
                Block::Code { language: Some("rust".into()), lines: vec!["fn main() {}".into()] },
                Block::Formula("\\frac{1}{2}".into()),
            ]
        );
    }

    #[test]
    fn test_unclosed_fence_runs_to_end() {
        let blocks = parse_blocks("intro\n```\nline 1\nline 2");
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1], Block::Code { language: None, lines: vec!["line 1".into(), "line 2".into()] });
    }

    #[test]
    fn test_multiline_and_unclosed_formula() {
        let blocks = parse_blocks("$$\na + b\n= c\n$$");
        assert_eq!(blocks, vec![Block::Formula("a + b\n= c".into())]);

        let blocks = parse_blocks("$$ x + y\nno end");
        assert_eq!(blocks, vec![Block::Paragraph("$$ x + y\nno end".into())]);
    }
}
