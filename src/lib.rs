//! parakeet - Stable paragraph keys for evolving text documents
//!
//! Keeps a key attached to every paragraph of a document across edits, so a
//! companion key-value table (translations, review notes) stays aligned when
//! paragraphs are edited, inserted, deleted or moved.
//!
//! ## Core Concepts
//!
//! **Keys double as positions**: sorting a document's keys yields its
//! paragraph order. Inserted paragraphs get keys minted strictly between
//! their neighbours, so existing keys never need renumbering.
//!
//! **Retained keys**: every key ever handed out is remembered, so a deleted
//! paragraph's key is never reissued to different text.
//!
//! ## Modules
//! - `codec`: paragraph segmentation and rendering
//! - `index`: order-maintenance trie that mints keys between keys
//! - `algo`: Myers text diff and edit script normalization
//! - `reconcile`: the reconciler and change reports
//! - `store`: in-memory and JSON file persistence
//! - `serialize`: binary archives (feature `cache`)
//!
//! ## Usage
//!
//! ```ignore
//! use parakeet::prelude::*;
//!
//! let reconciler = Reconciler::new(ReconcileConfig::default());
//! let v1 = reconciler.reconcile(&DocumentState::default(), "Hello\n\nWorld\n\n", "doc")?;
//! let v2 = reconciler.reconcile(&v1, "Hello\n\nbrave new\n\nWorld\n\n", "doc")?;
//! for (key, text) in v2.snapshot.iter() {
//!     println!("{key} = {text}");
//! }
//! ```

/// Error types
pub mod error;

/// Paragraph keys and the key alphabet
pub mod key;

/// Snapshots and persisted document state
pub mod snapshot;

/// Paragraph segmentation and rendering
pub mod codec;

/// Reconciler configuration
pub mod config;

/// Order-maintenance index
pub mod index;

/// Algorithms: myers, normalize
pub mod algo;

/// Reconciliation and change reports
pub mod reconcile;

/// Persistence of document states
pub mod store;

/// Binary archives
#[cfg(feature = "cache")]
pub mod serialize;

/// Prelude for common imports
pub mod prelude;

// =============================================================================
// Re-exports
// =============================================================================

pub use algo::{MyersDiffer, Op, Span, TextDiffer};
pub use codec::{paragraphs, render, segment};
pub use config::ReconcileConfig;
pub use error::{ReconcileError, ReconcileResult};
pub use index::KeyIndex;
pub use key::{Alphabet, Key};
pub use reconcile::{Change, ChangeCounts, ChangeSink, ReconcileStats, Reconciler, reconcile};
pub use snapshot::{DocumentState, RetainedKeys, Snapshot};
pub use store::{DocumentId, JsonFileStore, SharedStore, SnapshotStore, update_file, update_files};

#[cfg(feature = "cache")]
pub use rkyv;
