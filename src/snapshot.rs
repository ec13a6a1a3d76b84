//! Document snapshots
//!
//! A [`Snapshot`] maps keys to paragraph text; iteration is in key order,
//! which is document order. [`RetainedKeys`] records every key ever minted
//! for a document so deleted keys are never handed out again.
//! [`DocumentState`] bundles both: it is what a reconciliation run consumes
//! and produces, and what callers persist between runs.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::key::Key;

// =============================================================================
// Snapshot
// =============================================================================

/// Paragraph text keyed by stable paragraph keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    entries: BTreeMap<Key, String>,
}

impl Snapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of paragraphs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the snapshot has no paragraphs.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Text stored under `key`.
    pub fn get(&self, key: &Key) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Check if `key` is present.
    pub fn contains_key(&self, key: &Key) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or replace a paragraph, returning the previous text.
    pub fn insert(&mut self, key: Key, text: impl Into<String>) -> Option<String> {
        self.entries.insert(key, text.into())
    }

    /// Remove a paragraph.
    pub fn remove(&mut self, key: &Key) -> Option<String> {
        self.entries.remove(key)
    }

    /// Iterate `(key, text)` in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&Key, &str)> {
        self.entries.iter().map(|(k, v)| (k, v.as_str()))
    }

    /// Keys in document order.
    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.entries.keys()
    }

    /// Paragraph texts in document order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(String::as_str)
    }

    /// First key in document order.
    pub fn first_key(&self) -> Option<&Key> {
        self.entries.keys().next()
    }
}

impl FromIterator<(Key, String)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (Key, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = (&'a Key, &'a String);
    type IntoIter = std::collections::btree_map::Iter<'a, Key, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

// =============================================================================
// RetainedKeys
// =============================================================================

/// Every key ever minted for a document, in sorted order.
pub type RetainedKeys = BTreeSet<Key>;

// =============================================================================
// DocumentState
// =============================================================================

/// Snapshot plus retained keys: the state persisted between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentState {
    /// Current paragraphs
    pub snapshot: Snapshot,
    /// All keys ever used, present or deleted
    pub retained: RetainedKeys,
}

impl DocumentState {
    /// Create a state from its parts.
    pub fn new(snapshot: Snapshot, retained: RetainedKeys) -> Self {
        Self { snapshot, retained }
    }

    /// No prior history: neither paragraphs nor retained keys.
    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty() && self.retained.is_empty()
    }
}
