//! Error types for parakeet.
//!
//! Malformed input is rejected before a run starts. Internal consistency
//! faults abort the run; no partial state is ever returned.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reconciling or persisting a document.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A stored key does not belong to the document namespace or uses
    /// characters outside the key alphabet.
    #[error("malformed key {key:?}: {reason}")]
    MalformedKey {
        /// The offending key
        key: String,
        /// What is wrong with it
        reason: &'static str,
    },

    /// The namespace cannot be used as a key prefix.
    #[error("invalid namespace {0:?}: must not contain ':'")]
    InvalidNamespace(String),

    /// The edit script does not reconstruct the stored paragraph text.
    #[error("edit script disagrees with paragraph {key}: expected {expected:?}, found {found:?}")]
    Inconsistent {
        /// Key of the paragraph being reconstructed
        key: String,
        /// Old-side text still owed by the script
        expected: String,
        /// Span text the script produced instead
        found: String,
    },

    /// The edit script ended while an old paragraph was still unconsumed.
    #[error("edit script ended before paragraph {key} was consumed")]
    ScriptExhausted {
        /// Key of the unconsumed paragraph
        key: String,
    },

    /// No key exists strictly between the two bounds.
    #[error("no key fits between {prev:?} and {next:?}")]
    NoRoom {
        /// Lower bound (exclusive), if any
        prev: Option<String>,
        /// Upper bound (exclusive), if any
        next: Option<String>,
    },

    /// An inserted paragraph in a document with prior paragraphs has
    /// neither a previous nor a next key.
    #[error("inserted paragraph has neither a previous nor a next key to position it")]
    Unanchored,

    /// Reading or writing a persisted file failed.
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// A persisted JSON file could not be decoded or encoded.
    #[error("json error on {}: {source}", path.display())]
    Json {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// Binary snapshot was written with an incompatible schema.
    #[error("snapshot version mismatch: expected v{expected}, found v{found}")]
    VersionMismatch {
        /// Expected schema version
        expected: u32,
        /// Found schema version
        found: u32,
    },

    /// Magic bytes validation failed.
    #[error("invalid snapshot format: expected magic bytes {expected:?}, found {found:?}")]
    InvalidMagic {
        /// Expected magic bytes
        expected: [u8; 4],
        /// Found magic bytes
        found: [u8; 4],
    },

    /// Binary serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialize(String),
}

/// Result type alias for reconciliation operations.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

impl ReconcileError {
    /// Create a malformed-key error.
    pub fn malformed(key: impl Into<String>, reason: &'static str) -> Self {
        Self::MalformedKey {
            key: key.into(),
            reason,
        }
    }

    /// Create an i/o error for a path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error signals a bug in the differ integration rather
    /// than bad caller input.
    pub fn is_internal_fault(&self) -> bool {
        matches!(
            self,
            Self::Inconsistent { .. } | Self::ScriptExhausted { .. } | Self::Unanchored | Self::NoRoom { .. }
        )
    }
}

#[cfg(feature = "cache")]
impl From<rkyv::rancor::Error> for ReconcileError {
    fn from(err: rkyv::rancor::Error) -> Self {
        Self::Serialize(err.to_string())
    }
}
