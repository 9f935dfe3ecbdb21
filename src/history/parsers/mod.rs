//! Platform-specific parsers
//!
//! Each export format has its own parser module:
//! - `claude`: Claude `conversations.json` / `projects.json`
//! - `gemini`: Google AI Studio prompt exports
//! - `sillytavern`: SillyTavern chat `.jsonl` logs

pub mod claude;
pub mod gemini;
pub mod sillytavern;

// Re-export main parsing functions for convenience
pub use claude::{parse_claude_conversations, parse_claude_projects};
pub use gemini::parse_gemini_prompt;
pub use sillytavern::{looks_like_sillytavern, parse_sillytavern_lines};
