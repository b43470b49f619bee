// src/frontmatter.rs

//! Front matter extraction for markdown documents.
//!
//! Two header forms are recognized. The block form:
//!
//! ```text
//! ---
//! title: Document Title
//! tags: [tag1, tag2]
//! ---
//! And the rest is markdown.
//! ```
//!
//! and the one-line form, where the whole header sits on the first line:
//!
//! ```text
//! ---title: this is a one line front matter---
//! And the rest is markdown.
//! ```
//!
//! Keys are lower-cased; a repeated key keeps the last value seen.

use std::collections::HashMap;
use tracing::debug;

/// The header delimiter line.
const DELIMITER: &str = "---";

/// Metadata read from a document header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontMatter {
    entries: HashMap<String, String>,
}

impl FrontMatter {
    /// Returns the value stored under `key`. Lookups are case-insensitive.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(&key.to_lowercase())
            .map(String::as_str)
    }

    /// The `title` entry, if any.
    pub fn title(&self) -> Option<&str> {
        self.get("title")
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn insert(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_lowercase(), value.to_string());
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FrontMatter {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fm = FrontMatter::default();
        for (k, v) in iter {
            fm.insert(&k.into(), &v.into());
        }
        fm
    }
}

/// Position of the line scanner relative to the header block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    BeforeBlock,
    InBlock,
    AfterBlock,
}

/// Splits `content` into its markdown body and its front matter.
///
/// Never fails: content without a recognizable header is returned unchanged
/// with empty metadata.
///
/// A block header that is never closed by a `---` line swallows the rest of
/// the document, leaving the body empty.
pub fn extract(content: &str) -> (String, FrontMatter) {
    let mut meta = FrontMatter::default();
    if content.is_empty() {
        return (String::new(), meta);
    }

    let (first_line, rest) = match content.find('\n') {
        Some(i) => (&content[..i], &content[i + 1..]),
        None => (content, ""),
    };

    if let Some((key, value)) = one_line_entry(first_line) {
        meta.insert(key, value);
        return (rest.to_string(), meta);
    }

    let mut body = String::new();
    let mut state = Scan::BeforeBlock;
    for line in content.split('\n') {
        state = match state {
            Scan::BeforeBlock if line == DELIMITER && content.starts_with("---\n") => {
                Scan::InBlock
            }
            // No header: the document is its own body.
            Scan::BeforeBlock => return (content.to_string(), meta),
            Scan::InBlock if line == DELIMITER => Scan::AfterBlock,
            Scan::InBlock => {
                if let Some((key, value)) = block_entry(line) {
                    meta.insert(key, value);
                }
                Scan::InBlock
            }
            Scan::AfterBlock => {
                body.push_str(line);
                body.push('\n');
                Scan::AfterBlock
            }
        };
    }

    if state == Scan::InBlock {
        debug!("front matter block is never closed, document body discarded");
    }
    (body, meta)
}

/// Matches `---<key>:<space>*<value>---` where the key has no whitespace or colon.
fn one_line_entry(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_end();
    if line.len() < 2 * DELIMITER.len() {
        return None;
    }
    let inner = line
        .strip_prefix(DELIMITER)?
        .strip_suffix(DELIMITER)?;
    let (key, value) = inner.split_once(':')?;
    let key = key.trim_end();
    if key.is_empty() || key.chars().any(char::is_whitespace) {
        return None;
    }
    Some((key, value.trim_start()))
}

/// Matches `<word>:<space>*<value>` where the word is ASCII alphanumerics or `_`.
fn block_entry(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    if key.is_empty() || !key.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
        return None;
    }
    Some((key, value.trim_start()))
}
