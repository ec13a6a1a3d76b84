//! Persistence of document states between runs.
//!
//! - `memory`: thread-safe in-process store
//! - `fs`: JSON files next to the source document
//!
//! Stores only load and save; [`update`] ties a store to a [`Reconciler`]
//! for the common load, reconcile, save cycle.

mod fs;
mod memory;

use std::fmt;
use std::sync::Arc;

pub use fs::{JsonFileStore, update_file, update_files};
pub use memory::SharedStore;

use crate::algo::TextDiffer;
use crate::error::ReconcileResult;
use crate::reconcile::{ChangeSink, Reconciler};
use crate::snapshot::DocumentState;

// =============================================================================
// Document Id
// =============================================================================

/// Identity of a document within a store; also its default key namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(Arc<str>);

impl DocumentId {
    pub fn new(id: &str) -> Self {
        Self(Arc::from(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

// =============================================================================
// SnapshotStore
// =============================================================================

/// Load/save of [`DocumentState`] by document identity.
pub trait SnapshotStore {
    /// Previous state, or `None` if the document has no history.
    fn load(&self, id: &DocumentId) -> ReconcileResult<Option<DocumentState>>;

    /// Persist `state` as the latest state of `id`.
    fn save(&self, id: &DocumentId, state: &DocumentState) -> ReconcileResult<()>;
}

/// Load the previous state of `id`, reconcile it with `new_text`, and save
/// the result. Nothing is saved if reconciliation fails.
///
/// Callers must not run two updates of the same document concurrently
/// against a store without its own locking; [`SharedStore::update`] does.
pub fn update<S, D>(
    store: &S,
    reconciler: &Reconciler<D>,
    id: &DocumentId,
    new_text: &str,
    sink: &mut impl ChangeSink,
) -> ReconcileResult<DocumentState>
where
    S: SnapshotStore + ?Sized,
    D: TextDiffer,
{
    let previous = store.load(id)?.unwrap_or_default();
    let next = reconciler.reconcile_observed(&previous, new_text, id.as_str(), sink)?;
    store.save(id, &next)?;
    Ok(next)
}
