//! Paragraph walk
//!
//! Walks the old paragraphs (in key order) against a normalized edit script
//! and classifies every paragraph of the new text:
//!
//! | Script shape                          | Outcome                      |
//! |---------------------------------------|------------------------------|
//! | `Insert("new\n\n")`                   | inserted, old key untouched  |
//! | `Equal("old\n\n")`                    | kept                         |
//! | `Delete("old\n\n")`                   | deleted                      |
//! | anything else                         | region, resolved by matching |
//!
//! A region is the smallest run of spans that consumes whole old paragraphs
//! on the old side and ends at a paragraph separator on the new side. Old
//! and new paragraphs of a region are then paired in order: equal text
//! first, then the edit-distance threshold, then the first-key exemption.
//! Unpaired old paragraphs are deleted and unpaired new ones inserted.
//!
//! Whitespace that the script leaves on the far side of a region boundary is
//! carried into the next region (see [`Carry`]).

use std::mem;

use smallvec::SmallVec;

use crate::algo::{Op, Span, TextDiffer};
use crate::codec::{SEPARATOR, normalized, paragraphs};
use crate::error::{ReconcileError, ReconcileResult};
use crate::key::Key;

// =============================================================================
// Slot
// =============================================================================

/// Classification of one paragraph, in new document order.
///
/// Deleted paragraphs keep their old position so they can bracket keys
/// minted next to them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Slot<'a> {
    /// Same text (after normalization); the stored text is kept verbatim.
    Kept { key: &'a Key, text: &'a str },
    /// Same key, new text.
    Edited { key: &'a Key, text: String },
    /// Old paragraph with no counterpart.
    Deleted { key: &'a Key },
    /// New paragraph needing a key.
    Inserted { text: String },
}

impl<'a> Slot<'a> {
    /// Existing key occupying this position, if any.
    pub(crate) fn key(&self) -> Option<&'a Key> {
        match self {
            Self::Kept { key, .. } | Self::Edited { key, .. } | Self::Deleted { key } => Some(key),
            Self::Inserted { .. } => None,
        }
    }
}

/// Edit test between an old paragraph and its candidate replacement.
///
/// Lengths and distance are in characters.
pub(crate) fn is_edit(differ: &impl TextDiffer, old: &str, new: &str) -> bool {
    let (a, b) = (old.chars().count(), new.chars().count());
    let (bigger, smaller) = (a.max(b), a.min(b));
    differ.distance(old, new) < (bigger - smaller) + bigger / 2
}

// =============================================================================
// Carry
// =============================================================================

/// Text left over at a region boundary.
///
/// `old` is old-side text the script has not consumed yet (whitespace only);
/// `new` is whitespace-only new-side text that formed no paragraph.
#[derive(Debug, Default)]
struct Carry {
    old: String,
    new: String,
}

// =============================================================================
// Walker
// =============================================================================

pub(crate) struct Walker<'a, 'd, D> {
    old: &'a [(&'a Key, &'a str)],
    spans: &'a [Span],
    differ: &'d D,
    cursor: usize,
    carry: Carry,
    slots: Vec<Slot<'a>>,
}

impl<'a, 'd, D: TextDiffer> Walker<'a, 'd, D> {
    pub(crate) fn new(old: &'a [(&'a Key, &'a str)], spans: &'a [Span], differ: &'d D) -> Self {
        Self {
            old,
            spans,
            differ,
            cursor: 0,
            carry: Carry::default(),
            slots: Vec::with_capacity(old.len()),
        }
    }

    /// Classify every paragraph, in new document order.
    pub(crate) fn run(mut self) -> ReconcileResult<Vec<Slot<'a>>> {
        let mut index = 0;
        while index < self.old.len() {
            if self.carry.old.is_empty() {
                if let Some(consumed) = self.fast_path(index) {
                    index += consumed;
                    continue;
                }
            }
            index = self.region(index)?;
        }
        self.tail()?;
        Ok(self.slots)
    }

    /// Handle a span that maps onto exactly one paragraph.
    ///
    /// Returns the number of old paragraphs consumed (an insertion consumes
    /// none), or `None` if the span needs region handling.
    fn fast_path(&mut self, index: usize) -> Option<usize> {
        let spans = self.spans;
        let span = spans.get(self.cursor)?;
        let (key, text) = self.old[index];
        let whole = span.text.strip_suffix(SEPARATOR) == Some(text);

        let consumed = match span.op {
            Op::Insert if span.text.ends_with(SEPARATOR) => {
                let new = mem::take(&mut self.carry.new) + &span.text;
                self.cursor += 1;
                let parts = paragraphs(&new);
                if parts.is_empty() {
                    // Blank lines only: hold them for whatever follows
                    self.carry.new = new;
                    return self.fast_path(index);
                }
                self.slots.extend(parts.into_iter().map(|text| Slot::Inserted { text }));
                return Some(0);
            }
            Op::Equal if whole => {
                self.slots.push(Slot::Kept { key, text });
                1
            }
            Op::Delete if whole => {
                self.slots.push(Slot::Deleted { key });
                1
            }
            _ => return None,
        };
        self.carry.new.clear();
        self.cursor += 1;
        Some(consumed)
    }

    /// Accumulate spans from old paragraph `start` until a region boundary,
    /// resolve the region, and return the index of the next old paragraph.
    fn region(&mut self, start: usize) -> ReconcileResult<usize> {
        let spans = self.spans;
        let start_key = self.old[start].0;
        let mut end = start + 1;

        let mut expected = mem::take(&mut self.carry.old);
        expected.push_str(self.old[start].1);
        expected.push_str(SEPARATOR);
        let mut consumed = 0;
        let mut new_text = mem::take(&mut self.carry.new);

        loop {
            let Some(span) = spans.get(self.cursor) else {
                if expected[consumed..].trim().is_empty() {
                    break;
                }
                return Err(ReconcileError::ScriptExhausted {
                    key: start_key.to_string(),
                });
            };

            if span.op == Op::Insert {
                new_text.push_str(&span.text);
            } else {
                // Span reaches into the following paragraphs: widen
                while expected.len() - consumed < span.text.len() && end < self.old.len() {
                    expected.push_str(self.old[end].1);
                    expected.push_str(SEPARATOR);
                    end += 1;
                }
                let owed = &expected[consumed..];
                if !owed.starts_with(span.text.as_str()) {
                    return Err(ReconcileError::Inconsistent {
                        key: start_key.to_string(),
                        expected: owed.to_owned(),
                        found: span.text.clone(),
                    });
                }
                consumed += span.text.len();
                if span.op == Op::Equal {
                    new_text.push_str(&span.text);
                }
            }
            self.cursor += 1;

            if expected[consumed..].trim().is_empty() {
                let next = spans.get(self.cursor);
                let new_blank = new_text.trim().is_empty();
                if new_text.ends_with(SEPARATOR)
                    || (new_blank && next.is_none_or(|s| s.op != Op::Insert))
                    || next.is_none()
                {
                    break;
                }
            }
        }

        self.carry.old = expected[consumed..].to_owned();
        let parts = if new_text.trim().is_empty() {
            self.carry.new = new_text;
            Vec::new()
        } else {
            paragraphs(&new_text)
        };
        self.resolve(start, end, parts);
        Ok(end)
    }

    /// Pair old paragraphs `start..end` with the new paragraphs of a region.
    fn resolve(&mut self, start: usize, end: usize, parts: Vec<String>) {
        let old_norm: Vec<String> = self.old[start..end].iter().map(|(_, t)| normalized(t)).collect();
        let part_norm: Vec<String> = parts.iter().map(|p| normalized(p)).collect();

        let mut next_old = start;
        let mut pending: SmallVec<[String; 2]> = SmallVec::new();

        for (i, part) in parts.into_iter().enumerate() {
            let equal = (next_old..end).find(|&j| old_norm[j - start] == part_norm[i]);
            let matched = equal.or_else(|| {
                let j = next_old;
                if j == end {
                    return None;
                }
                // Leave an old paragraph to the later part that repeats it
                if part_norm[i + 1..].contains(&old_norm[j - start]) {
                    return None;
                }
                let similar = is_edit(self.differ, self.old[j].1, &part);
                (similar || j == 0).then_some(j)
            });

            let Some(j) = matched else {
                pending.push(part);
                continue;
            };

            for &(key, _) in &self.old[next_old..j] {
                self.slots.push(Slot::Deleted { key });
            }
            self.slots.extend(pending.drain(..).map(|text| Slot::Inserted { text }));

            let (key, old_text) = self.old[j];
            if old_norm[j - start] == part_norm[i] {
                self.slots.push(Slot::Kept { key, text: old_text });
            } else {
                self.slots.push(Slot::Edited { key, text: part });
            }
            next_old = j + 1;
        }

        for &(key, _) in &self.old[next_old..end] {
            self.slots.push(Slot::Deleted { key });
        }
        self.slots.extend(pending.into_iter().map(|text| Slot::Inserted { text }));
    }

    /// Spans after the last old paragraph can only insert.
    fn tail(&mut self) -> ReconcileResult<()> {
        let mut owed = mem::take(&mut self.carry.old);
        let mut new_text = mem::take(&mut self.carry.new);
        let last_key = || self.old.last().map(|(k, _)| k.to_string()).unwrap_or_default();

        let spans = self.spans;
        for span in &spans[self.cursor..] {
            if span.op == Op::Insert {
                new_text.push_str(&span.text);
                continue;
            }
            let Some(rest) = owed.strip_prefix(span.text.as_str()) else {
                return Err(ReconcileError::Inconsistent {
                    key: last_key(),
                    expected: owed.clone(),
                    found: span.text.clone(),
                });
            };
            owed = rest.to_owned();
            if span.op == Op::Equal {
                new_text.push_str(&span.text);
            }
        }
        if !owed.is_empty() {
            return Err(ReconcileError::ScriptExhausted { key: last_key() });
        }

        self.cursor = self.spans.len();
        self.slots.extend(paragraphs(&new_text).into_iter().map(|text| Slot::Inserted { text }));
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
