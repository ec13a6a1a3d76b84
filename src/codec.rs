//! Paragraph codec
//!
//! Splits raw text into paragraphs and renders a [`Snapshot`] back to text.
//!
//! # Segmentation rules
//!
//! - Text is split on `\n`; a trailing newline terminates the last line.
//! - Consecutive non-blank lines form a paragraph; the first blank line
//!   (empty after trimming) ends it. The paragraph is trimmed.
//! - Each further blank line appends a `\n` to the most recent paragraph, so
//!   spacing survives a render/segment round trip.
//! - Blank lines before the first paragraph carry no entry.
//!
//! Keys are `namespace:LINE`, where `LINE` is the paragraph's starting line,
//! zero-padded to the digit count of the document's line count.

use crate::key::{Key, digit_count};
use crate::snapshot::Snapshot;

/// Paragraph separator as it appears in rendered text.
pub const SEPARATOR: &str = "\n\n";

/// A paragraph with the line it starts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Zero-based starting line
    pub start_line: usize,
    /// Trimmed text, plus one `\n` per extra blank line that followed it
    pub text: String,
}

/// Split `text` into blocks, returning them with the line count.
pub fn blocks(text: &str) -> (Vec<Block>, usize) {
    let mut lines: Vec<&str> = text.split('\n').collect();
    if text.ends_with('\n') {
        lines.pop();
    }

    let mut blocks: Vec<Block> = Vec::new();
    let mut buf = String::new();
    let mut start_line = 0;

    for (i, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            if buf.is_empty() {
                if let Some(last) = blocks.last_mut() {
                    last.text.push('\n');
                }
            } else {
                blocks.push(Block {
                    start_line,
                    text: buf.trim().to_string(),
                });
                buf.clear();
            }
            continue;
        }
        if buf.is_empty() {
            start_line = i;
        }
        buf.push_str(line);
        buf.push('\n');
    }

    if !buf.trim().is_empty() {
        blocks.push(Block {
            start_line,
            text: buf.trim().to_string(),
        });
    }

    (blocks, lines.len())
}

/// Paragraph texts of `text`, in order.
pub fn paragraphs(text: &str) -> Vec<String> {
    blocks(text).0.into_iter().map(|b| b.text).collect()
}

/// Segment `text` into a snapshot keyed by starting line under `namespace`.
pub fn segment(text: &str, namespace: &str) -> Snapshot {
    let (blocks, line_count) = blocks(text);
    let width = digit_count(line_count);
    blocks
        .into_iter()
        .map(|b| (Key::for_line(namespace, b.start_line, width), b.text))
        .collect()
}

/// Render paragraphs in key order, each followed by [`SEPARATOR`].
pub fn render(snapshot: &Snapshot) -> String {
    let mut out = String::with_capacity(snapshot.texts().map(|t| t.len() + SEPARATOR.len()).sum());
    for text in snapshot.texts() {
        out.push_str(text);
        out.push_str(SEPARATOR);
    }
    out
}

/// Collapse `\r\n` to `\n` and trim, for churn-free comparisons.
pub(crate) fn normalized(text: &str) -> String {
    text.replace("\r\n", "\n").trim().to_string()
}
