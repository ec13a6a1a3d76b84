//! Prelude module for common imports.
//!
//! ```ignore
//! use parakeet::prelude::*;
//! ```

// State
pub use crate::key::{Alphabet, Key};
pub use crate::snapshot::{DocumentState, RetainedKeys, Snapshot};

// Reconciliation
pub use crate::config::ReconcileConfig;
pub use crate::reconcile::{Change, ChangeCounts, ChangeSink, ReconcileStats, Reconciler, reconcile};

// Algorithms
pub use crate::algo::{MyersDiffer, TextDiffer};
pub use crate::index::KeyIndex;

// Persistence
pub use crate::store::{DocumentId, JsonFileStore, SharedStore, SnapshotStore};

// Error
pub use crate::error::{ReconcileError, ReconcileResult};
