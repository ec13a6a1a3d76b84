//! In-process store shared between threads.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use super::{DocumentId, SnapshotStore};
use crate::algo::TextDiffer;
use crate::error::ReconcileResult;
use crate::reconcile::{ChangeSink, Reconciler};
use crate::snapshot::DocumentState;

/// A stored state with its revision number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredState {
    pub state: DocumentState,
    /// Bumped on every save; 0 for the first.
    pub revision: u64,
}

/// Non-thread-safe map of document states.
pub type StateMap = FxHashMap<DocumentId, StoredState>;

/// Thread-safe in-memory store.
///
/// Clones share the same map. Uses `parking_lot::RwLock`; [`update`]
/// holds the write lock for the whole load, reconcile, save cycle, so
/// concurrent updates of a document are serialized.
///
/// [`update`]: SharedStore::update
#[derive(Debug, Clone, Default)]
pub struct SharedStore {
    inner: Arc<RwLock<StateMap>>,
}

impl SharedStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Execute a closure with read access to the map.
    pub fn with_read<R>(&self, f: impl FnOnce(&StateMap) -> R) -> R {
        let guard = self.inner.read();
        f(&guard)
    }

    /// Execute a closure with write access to the map.
    pub fn with_write<R>(&self, f: impl FnOnce(&mut StateMap) -> R) -> R {
        let mut guard = self.inner.write();
        f(&mut guard)
    }

    /// Revision of the latest saved state.
    pub fn revision(&self, id: &DocumentId) -> Option<u64> {
        self.with_read(|m| m.get(id).map(|s| s.revision))
    }

    /// Forget a document, returning its last state.
    pub fn remove(&self, id: &DocumentId) -> Option<DocumentState> {
        self.with_write(|m| m.remove(id).map(|s| s.state))
    }

    pub fn contains(&self, id: &DocumentId) -> bool {
        self.with_read(|m| m.contains_key(id))
    }

    pub fn len(&self) -> usize {
        self.with_read(|m| m.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.with_write(|m| m.clear());
    }

    /// Reconcile `id` with `new_text` under the write lock and store the
    /// result. On error the stored state is left untouched.
    pub fn update<D: TextDiffer>(
        &self,
        reconciler: &Reconciler<D>,
        id: &DocumentId,
        new_text: &str,
        sink: &mut impl ChangeSink,
    ) -> ReconcileResult<DocumentState> {
        self.with_write(|map| {
            let previous = map.get(id).map(|s| s.state.clone()).unwrap_or_default();
            let next = reconciler.reconcile_observed(&previous, new_text, id.as_str(), sink)?;
            put(map, id, next.clone());
            Ok(next)
        })
    }
}

fn put(map: &mut StateMap, id: &DocumentId, state: DocumentState) {
    match map.get_mut(id) {
        Some(stored) => {
            stored.state = state;
            stored.revision += 1;
        }
        None => {
            map.insert(id.clone(), StoredState { state, revision: 0 });
        }
    }
}

impl SnapshotStore for SharedStore {
    fn load(&self, id: &DocumentId) -> ReconcileResult<Option<DocumentState>> {
        Ok(self.with_read(|m| m.get(id).map(|s| s.state.clone())))
    }

    fn save(&self, id: &DocumentId, state: &DocumentState) -> ReconcileResult<()> {
        self.with_write(|m| put(m, id, state.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::Key;
    use crate::snapshot::Snapshot;
    use std::thread;

    #[test]
    fn test_save_bumps_revision() {
        let store = SharedStore::new();
        let id = DocumentId::new("doc");
        assert_eq!(store.revision(&id), None);

        store.save(&id, &DocumentState::default()).unwrap();
        assert_eq!(store.revision(&id), Some(0));
        store.save(&id, &DocumentState::default()).unwrap();
        assert_eq!(store.revision(&id), Some(1));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_clone_shares_map() {
        let store = SharedStore::new();
        let other = store.clone();
        other.save(&DocumentId::new("a"), &DocumentState::default()).unwrap();
        assert!(store.contains(&DocumentId::new("a")));
        store.clear();
        assert!(other.is_empty());
    }

    #[test]
    fn test_failed_update_keeps_state() {
        let store = SharedStore::new();
        let id = DocumentId::new("doc");
        let snapshot: Snapshot = [(Key::from("doc:0"), "Foo".to_string())].into_iter().collect();
        let mut retained = crate::snapshot::RetainedKeys::new();
        retained.insert(Key::from("doc:0"));
        retained.insert(Key::from("elsewhere:1"));
        let broken = DocumentState::new(snapshot, retained);
        store.save(&id, &broken).unwrap();

        let result = store.update(&Reconciler::default(), &id, "Bar\n\n", &mut ());
        assert!(result.is_err());
        assert_eq!(store.load(&id).unwrap(), Some(broken));
        assert_eq!(store.revision(&id), Some(0));
    }

    #[test]
    fn test_concurrent_updates_serialize() {
        let store = SharedStore::new();
        let reconciler = Reconciler::default();
        let id = DocumentId::new("doc");
        store.update(&reconciler, &id, "Base\n\n", &mut ()).unwrap();

        thread::scope(|s| {
            for i in 0..8 {
                let (store, reconciler, id) = (&store, &reconciler, &id);
                s.spawn(move || {
                    let text = format!("Base\n\nThread {i}\n\n");
                    store.update(reconciler, id, &text, &mut ()).unwrap();
                });
            }
        });

        assert_eq!(store.revision(&id), Some(8));
        let state = store.load(&id).unwrap().unwrap();
        assert_eq!(state.snapshot.get(&Key::from("doc:0")), Some("Base"));
        assert!(state.snapshot.keys().all(|k| state.retained.contains(k)));
    }

    static_assertions::assert_impl_all!(SharedStore: Send, Sync, Clone);
}
