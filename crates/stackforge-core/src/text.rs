//! Text utilities for conversation content.
//!
//! Assistant turns embed file changes as fenced code blocks whose first line
//! is a comment naming the target path. These helpers extract those blocks
//! (for applying and for the navigation hint) and strip them (so planning
//! and follow-up prompts see prose, not file bodies).

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// One file change embedded in assistant output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    /// Full path inside the sandbox.
    pub path: String,
    /// New file content.
    pub content: String,
}

/// Code block shapes recognized as file changes, one per comment style:
/// `#`/`//` line comments, C-style `/* */`, and HTML `<!-- -->`.
static CODE_BLOCK_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"```[\w.]+\n[#/]+ (\S+)\n([\s\S]+?)```",
        r"```[\w.]+\n[/*]+ (\S+) \*/\n([\s\S]+?)```",
        r"```[\w.]+\n<!-- (\S+) -->\n([\s\S]+?)```",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static pattern"))
    .collect()
});

static FOLLOW_UP_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*-\s*(.+)").expect("static pattern"));

/// Extract every file-change block from assistant content.
pub fn parse_file_changes(content: &str) -> Vec<FileChange> {
    let mut changes = Vec::new();
    for pattern in CODE_BLOCK_PATTERNS.iter() {
        for caps in pattern.captures_iter(content) {
            changes.push(FileChange {
                path: caps[1].to_string(),
                content: caps[2].trim().to_string(),
            });
        }
    }
    changes
}

/// Remove every file-change block, leaving the surrounding prose.
pub fn remove_file_changes(content: &str) -> String {
    let mut out = content.to_string();
    for pattern in CODE_BLOCK_PATTERNS.iter() {
        out = pattern.replace_all(&out, "").into_owned();
    }
    out
}

/// Parse a plain-text dash list of follow-up suggestions.
///
/// Tolerant by design: any line shaped like `- text` counts, everything
/// else is ignored, and unparseable input yields an empty list.
pub fn parse_follow_ups(content: &str) -> Vec<String> {
    FOLLOW_UP_PATTERN
        .captures_iter(content)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Last `max_chars` characters of `s` (char-safe suffix).
pub fn tail_chars(s: &str, max_chars: usize) -> &str {
    let count = s.chars().count();
    if count <= max_chars {
        return s;
    }
    let skip = count - max_chars;
    match s.char_indices().nth(skip) {
        Some((idx, _)) => &s[idx..],
        None => "",
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
