//! Paragraph keys
//!
//! A key is `namespace:suffix`. The namespace names the document (usually a
//! file path without extension); the suffix carries the sort position.
//!
//! # Ordering
//!
//! Keys compare as plain strings. Because every key of a document shares the
//! namespace, sorting keys sorts suffixes, and the sorted suffixes must equal
//! the paragraph order of the document.
//!
//! # Suffix alphabet
//!
//! Suffixes are drawn from a contiguous character range (see [`Alphabet`]).
//! Segmentation produces zero-padded line numbers; minted suffixes may use
//! any character of the range but never end with the floor character, which
//! guarantees a key can always be minted below any existing key.

use std::fmt;

use compact_str::{CompactString, format_compact};
use serde::{Deserialize, Serialize};

use crate::error::{ReconcileError, ReconcileResult};

/// Separator between namespace and suffix.
pub const NAMESPACE_SEPARATOR: char = ':';

// =============================================================================
// Alphabet
// =============================================================================

/// Character range allowed in key suffixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alphabet {
    /// Lowest character. Never the last character of a minted suffix.
    pub floor: char,
    /// Highest character.
    pub ceiling: char,
}

impl Alphabet {
    /// Default range: `-` `.` `/`, digits, punctuation, upper and lower case
    /// letters. The floor sits below `0` so keys can be minted before
    /// line-number suffixes such as `00`.
    pub const DEFAULT: Self = Self {
        floor: '-',
        ceiling: 'z',
    };

    /// Check whether `c` lies in the range.
    #[inline]
    pub fn contains(&self, c: char) -> bool {
        (self.floor..=self.ceiling).contains(&c)
    }

    /// Validate a suffix: non-empty, inside the range, not ending at the floor.
    pub fn check_suffix(&self, suffix: &str) -> Result<(), &'static str> {
        let Some(last) = suffix.chars().next_back() else {
            return Err("empty ordering suffix");
        };
        if !suffix.chars().all(|c| self.contains(c)) {
            return Err("character outside the key alphabet");
        }
        if last == self.floor {
            return Err("ordering suffix ends with the alphabet floor");
        }
        Ok(())
    }
}

impl Default for Alphabet {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// =============================================================================
// Key
// =============================================================================

/// Stable paragraph identifier, doubling as its sort position.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(CompactString);

impl Key {
    /// Build a key from a namespace and an ordering suffix.
    pub fn new(namespace: &str, suffix: &str) -> Self {
        Self(format_compact!("{namespace}{NAMESPACE_SEPARATOR}{suffix}"))
    }

    /// Wrap a raw key string without validation.
    pub fn from_raw(raw: impl Into<CompactString>) -> Self {
        Self(raw.into())
    }

    /// Key for a paragraph starting at `line`, zero-padded to `width` digits.
    pub fn for_line(namespace: &str, line: usize, width: usize) -> Self {
        Self(format_compact!("{namespace}{NAMESPACE_SEPARATOR}{line:0width$}"))
    }

    /// The full key string.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Text before the first separator, or the whole key if there is none.
    pub fn namespace(&self) -> &str {
        self.0
            .split_once(NAMESPACE_SEPARATOR)
            .map_or(self.as_str(), |(ns, _)| ns)
    }

    /// Ordering suffix, if the key belongs to `namespace`.
    pub fn suffix_in(&self, namespace: &str) -> Option<&str> {
        self.0
            .strip_prefix(namespace)?
            .strip_prefix(NAMESPACE_SEPARATOR)
    }

    /// Validate membership in `namespace` and the suffix alphabet,
    /// returning the suffix.
    pub fn validate<'a>(&'a self, namespace: &str, alphabet: &Alphabet) -> ReconcileResult<&'a str> {
        let suffix = self
            .suffix_in(namespace)
            .ok_or_else(|| ReconcileError::malformed(self.as_str(), "key outside the document namespace"))?;
        alphabet
            .check_suffix(suffix)
            .map_err(|reason| ReconcileError::malformed(self.as_str(), reason))?;
        Ok(suffix)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.0)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Key {
    fn from(raw: &str) -> Self {
        Self::from_raw(raw)
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Reject namespaces that would make key prefixes ambiguous.
pub fn check_namespace(namespace: &str) -> ReconcileResult<()> {
    if namespace.contains(NAMESPACE_SEPARATOR) {
        return Err(ReconcileError::InvalidNamespace(namespace.to_string()));
    }
    Ok(())
}

/// Number of decimal digits needed to print `n` (at least one).
pub(crate) fn digit_count(n: usize) -> usize {
    n.max(1).ilog10() as usize + 1
}
