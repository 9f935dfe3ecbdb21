//! Output file names for exported documents

use chrono::NaiveDate;

const MAX_TITLE_CHARS: usize = 100;
const FALLBACK_TITLE: &str = "conversation";

/// Make a title safe to use as a file name.
///
/// Path separators, reserved and control characters are dropped, whitespace
/// runs become a single `_`, and the result is capped at 100 characters.
/// Non-ASCII letters (CJK titles) are kept.
pub fn sanitize_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut pending_sep = false;

    for c in title.trim().chars() {
        if c.is_whitespace() {
            pending_sep = true;
            continue;
        }
        if c.is_control() || matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') {
            continue;
        }
        if pending_sep && !out.is_empty() {
            out.push('_');
        }
        pending_sep = false;
        out.push(c);
    }

    let capped: String = out.chars().take(MAX_TITLE_CHARS).collect();
    let capped = capped.trim_matches(|c| c == '_' || c == '.').to_string();
    if capped.is_empty() {
        FALLBACK_TITLE.to_string()
    } else {
        capped
    }
}

/// `{sanitized-title}_{YYYYMMDD}.{ext}`
pub fn export_filename(title: &str, extension: &str, date: NaiveDate) -> String {
    format!("{}_{}.{}", sanitize_title(title), date.format("%Y%m%d"), extension)
}

/// [`export_filename`] stamped with today's local date
pub fn export_filename_today(title: &str, extension: &str) -> String {
    export_filename(title, extension, chrono::Local::now().date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title("My  chat: a/b?"), "My_chat_ab");
        assert_eq!(sanitize_title("   "), "conversation");
        assert_eq!(sanitize_title("..."), "conversation");
        assert_eq!(sanitize_title("日本語の会話"), "日本語の会話");
        assert_eq!(sanitize_title(&"x".repeat(300)).chars().count(), 100);
    }

    #[test]
    fn test_export_filename() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(export_filename("Rust tips", "md", date), "Rust_tips_20240309.md");
        assert_eq!(export_filename("", "pdf", date), "conversation_20240309.pdf");
    }
}
