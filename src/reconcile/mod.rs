//! Reconciliation
//!
//! Produces the next [`DocumentState`] of a document from its previous state
//! and its new raw text.
//!
//! # Pipeline
//!
//! ```text
//! previous snapshot ──render──► old text ─┐
//!                                         ├─diff─► normalize ─► walk ─► mint ─► next state
//! new text ───────────────────────────────┘
//! ```
//!
//! 1. **Bootstrap**: no previous state, segment the new text directly.
//! 2. **Walk**: classify every paragraph as kept, edited, deleted or inserted.
//! 3. **Mint**: give each inserted paragraph a key between its neighbours.
//!    The index is seeded with every retained key, so deleted keys are never
//!    handed out again.
//!
//! A run either succeeds or fails as a whole; on error nothing is returned
//! and the caller's previous state stays valid.
//!
//! # Example
//!
//! ```ignore
//! use parakeet::{DocumentState, reconcile};
//!
//! let v1 = reconcile(&DocumentState::default(), "Hello\n\nWorld\n\n", "doc")?;
//! let v2 = reconcile(&v1, "Hello\n\nbig\n\nWorld\n\n", "doc")?;
//! // "big" sorts between the keys of "Hello" and "World"
//! ```

mod change;
mod walk;

pub use change::{Change, ChangeCounts, ChangeSink, changes, report};

use crate::algo::{MyersDiffer, TextDiffer, normalize};
use crate::codec::{render, segment};
use crate::config::ReconcileConfig;
use crate::error::{ReconcileError, ReconcileResult};
use crate::index::KeyIndex;
use crate::key::{Alphabet, Key, check_namespace};
use crate::snapshot::{DocumentState, RetainedKeys, Snapshot};

use walk::{Slot, Walker};

/// Per-run classification counts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct ReconcileStats {
    /// Paragraphs whose text is unchanged
    pub kept: usize,
    /// Paragraphs that kept their key with new text
    pub edited: usize,
    /// Old paragraphs with no counterpart
    pub deleted: usize,
    /// New paragraphs that received a fresh key
    pub inserted: usize,
}

/// Paragraph key reconciler.
///
/// Stateless between runs; one instance can serve any number of documents
/// from any number of threads.
#[derive(Debug, Clone)]
pub struct Reconciler<D = MyersDiffer> {
    differ: D,
    alphabet: Alphabet,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(ReconcileConfig::default())
    }
}

impl Reconciler {
    /// Create a reconciler using the built-in Myers differ.
    pub fn new(config: ReconcileConfig) -> Self {
        Self::with_differ(MyersDiffer::new(config.max_diff_duration))
    }
}

impl<D: TextDiffer> Reconciler<D> {
    /// Create a reconciler around a custom diff oracle.
    pub fn with_differ(differ: D) -> Self {
        Self {
            differ,
            alphabet: Alphabet::DEFAULT,
        }
    }

    /// Use a custom key alphabet.
    pub fn with_alphabet(mut self, alphabet: Alphabet) -> Self {
        self.alphabet = alphabet;
        self
    }

    pub fn differ(&self) -> &D {
        &self.differ
    }

    pub fn alphabet(&self) -> Alphabet {
        self.alphabet
    }

    /// Reconcile `previous` with `new_text`.
    ///
    /// `namespace` prefixes keys when the document has no paragraphs yet;
    /// otherwise the namespace of the existing keys is kept.
    pub fn reconcile(
        &self,
        previous: &DocumentState,
        new_text: &str,
        namespace: &str,
    ) -> ReconcileResult<DocumentState> {
        self.reconcile_observed(previous, new_text, namespace, &mut ())
    }

    /// Like [`reconcile`](Self::reconcile), reporting every added, removed
    /// and changed paragraph to `sink` after a successful run.
    pub fn reconcile_observed(
        &self,
        previous: &DocumentState,
        new_text: &str,
        namespace: &str,
        sink: &mut impl ChangeSink,
    ) -> ReconcileResult<DocumentState> {
        let (next, stats) = self.run(previous, new_text, namespace)?;
        tracing::debug!(
            namespace,
            kept = stats.kept,
            edited = stats.edited,
            deleted = stats.deleted,
            inserted = stats.inserted,
            "reconciled document"
        );
        report(&previous.snapshot, &next.snapshot, sink);
        Ok(next)
    }

    /// Reconcile and return the classification counts alongside the state.
    pub fn reconcile_with_stats(
        &self,
        previous: &DocumentState,
        new_text: &str,
        namespace: &str,
    ) -> ReconcileResult<(DocumentState, ReconcileStats)> {
        self.run(previous, new_text, namespace)
    }

    fn run(
        &self,
        previous: &DocumentState,
        new_text: &str,
        namespace: &str,
    ) -> ReconcileResult<(DocumentState, ReconcileStats)> {
        if previous.is_empty() {
            check_namespace(namespace)?;
            return Ok(bootstrap(new_text, namespace));
        }

        let namespace = match previous.snapshot.first_key() {
            Some(first) => first.namespace(),
            None => {
                check_namespace(namespace)?;
                namespace
            }
        };

        // Malformed keys are rejected before any work is done
        let mut index = KeyIndex::with_alphabet(self.alphabet);
        for key in previous.snapshot.keys().chain(&previous.retained) {
            index.insert(key.validate(namespace, &self.alphabet)?);
        }

        let old: Vec<(&Key, &str)> = previous.snapshot.iter().collect();
        let old_text = render(&previous.snapshot);
        let spans = normalize(self.differ.diff(&old_text, new_text));
        let slots = Walker::new(&old, &spans, &self.differ).run()?;

        let mut retained = previous.retained.clone();
        retained.extend(previous.snapshot.keys().cloned());
        let minter = Minter {
            namespace,
            alphabet: &self.alphabet,
            index,
            anchored: !previous.snapshot.is_empty(),
        };
        let (snapshot, stats) = minter.assign(slots, &mut retained)?;
        Ok((DocumentState::new(snapshot, retained), stats))
    }
}

/// Reconcile with the default configuration.
pub fn reconcile(previous: &DocumentState, new_text: &str, namespace: &str) -> ReconcileResult<DocumentState> {
    Reconciler::default().reconcile(previous, new_text, namespace)
}

/// First run for a document: keys come straight from line numbers.
fn bootstrap(new_text: &str, namespace: &str) -> (DocumentState, ReconcileStats) {
    let snapshot = segment(new_text, namespace);
    let retained: RetainedKeys = snapshot.keys().cloned().collect();
    let stats = ReconcileStats {
        inserted: snapshot.len(),
        ..ReconcileStats::default()
    };
    (DocumentState::new(snapshot, retained), stats)
}

// =============================================================================
// Minting
// =============================================================================

struct Minter<'a> {
    namespace: &'a str,
    alphabet: &'a Alphabet,
    index: KeyIndex,
    /// The walk saw old paragraphs, so every slot run has a keyed neighbour
    anchored: bool,
}

impl Minter<'_> {
    /// Build the new snapshot from classified slots, minting keys for
    /// insertions. Minted keys are added to `retained`.
    fn assign(mut self, slots: Vec<Slot<'_>>, retained: &mut RetainedKeys) -> ReconcileResult<(Snapshot, ReconcileStats)> {
        // Nearest existing key at or after each slot
        let mut upper: Vec<Option<&Key>> = vec![None; slots.len()];
        let mut next = None;
        for (i, slot) in slots.iter().enumerate().rev() {
            upper[i] = next;
            if let Some(key) = slot.key() {
                next = Some(key);
            }
        }

        let mut snapshot = Snapshot::new();
        let mut stats = ReconcileStats::default();
        let mut lower: Option<String> = None;

        for (slot, upper) in slots.into_iter().zip(upper) {
            let key = match slot {
                Slot::Kept { key, text } => {
                    stats.kept += 1;
                    snapshot.insert(key.clone(), text);
                    key
                }
                Slot::Edited { key, text } => {
                    stats.edited += 1;
                    snapshot.insert(key.clone(), text);
                    key
                }
                Slot::Deleted { key } => {
                    stats.deleted += 1;
                    key
                }
                Slot::Inserted { text } => {
                    let next = upper.map(|k| k.validate(self.namespace, self.alphabet)).transpose()?;
                    // An emptied document mints from the whole key space, clear
                    // of the retained keys already in the index
                    if self.anchored && lower.is_none() && next.is_none() {
                        return Err(ReconcileError::Unanchored);
                    }
                    let suffix = self.index.between(lower.as_deref(), next)?;
                    let key = Key::new(self.namespace, &suffix);
                    tracing::trace!(%key, "minted key");

                    stats.inserted += 1;
                    retained.insert(key.clone());
                    snapshot.insert(key, text);
                    lower = Some(suffix);
                    continue;
                }
            };
            lower = Some(key.validate(self.namespace, self.alphabet)?.to_owned());
        }

        Ok((snapshot, stats))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::Span;
    use crate::codec::{normalized, paragraphs};
    use proptest::prelude::*;

    fn state(entries: &[(&str, &str)]) -> DocumentState {
        let snapshot: Snapshot = entries.iter().map(|&(k, v)| (Key::from(k), v.to_owned())).collect();
        let retained = snapshot.keys().cloned().collect();
        DocumentState::new(snapshot, retained)
    }

    fn texts(state: &DocumentState) -> Vec<&str> {
        state.snapshot.texts().collect()
    }

    fn key_of<'a>(state: &'a DocumentState, text: &str) -> &'a Key {
        state
            .snapshot
            .iter()
            .find(|(_, t)| *t == text)
            .map(|(k, _)| k)
            .unwrap()
    }

    #[test]
    fn test_bootstrap() {
        let next = reconcile(&DocumentState::default(), "Hello\n\nWorld\n\n", "doc").unwrap();
        let keys: Vec<&str> = next.snapshot.keys().map(Key::as_str).collect();
        assert_eq!(keys, ["doc:0", "doc:2"]);
        assert_eq!(texts(&next), ["Hello", "World"]);
        assert_eq!(next.retained.len(), 2);
    }

    #[test]
    fn test_bootstrap_rejects_bad_namespace() {
        let err = reconcile(&DocumentState::default(), "A\n\n", "a:b").unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidNamespace(_)));
    }

    #[test]
    fn test_pure_insertion_after() {
        let old = state(&[("doc:0", "Foo")]);
        let next = reconcile(&old, "Foo\n\nBar\n\n", "doc").unwrap();
        assert_eq!(texts(&next), ["Foo", "Bar"]);
        assert_eq!(key_of(&next, "Foo").as_str(), "doc:0");
        assert!(key_of(&next, "Bar").as_str() > "doc:0");
        assert!(next.retained.contains(key_of(&next, "Bar")));
    }

    #[test]
    fn test_pure_insertion_before() {
        let old = state(&[("doc:0", "Foo")]);
        let next = reconcile(&old, "Bar\n\nFoo\n\n", "doc").unwrap();
        assert_eq!(texts(&next), ["Bar", "Foo"]);
        assert_eq!(key_of(&next, "Foo").as_str(), "doc:0");
        assert!(key_of(&next, "Bar").as_str() < "doc:0");
    }

    #[test]
    fn test_insertion_between() {
        let old = state(&[("doc:0", "A"), ("doc:4", "C")]);
        let next = reconcile(&old, "A\n\nB\n\nC\n\n", "doc").unwrap();
        assert_eq!(texts(&next), ["A", "B", "C"]);
        let b = key_of(&next, "B").as_str();
        assert!("doc:0" < b && b < "doc:4");
    }

    #[test]
    fn test_reorder_without_edit() {
        let old = state(&[("doc:0", "Foo"), ("doc:2", "Bar")]);
        let next = reconcile(&old, "Bar\n\nFoo\n\n", "doc").unwrap();
        assert_eq!(texts(&next), ["Bar", "Foo"]);
        assert!(next.retained.contains(&Key::from("doc:0")));
        assert!(next.retained.contains(&Key::from("doc:2")));
        assert_eq!(next.retained.len(), 3);
    }

    #[test]
    fn test_deletion() {
        let old = state(&[("doc:0", "Foo"), ("doc:2", "Bar")]);
        let next = reconcile(&old, "Foo\n\n", "doc").unwrap();
        assert_eq!(next.snapshot.len(), 1);
        assert_eq!(next.snapshot.get(&Key::from("doc:0")), Some("Foo"));
        assert!(!next.snapshot.contains_key(&Key::from("doc:2")));
        assert!(next.retained.contains(&Key::from("doc:2")));
    }

    #[test]
    fn test_deleted_key_not_reused() {
        let old = state(&[("doc:0", "A"), ("doc:2", "B"), ("doc:4", "C")]);
        let v2 = reconcile(&old, "A\n\nC\n\n", "doc").unwrap();
        let v3 = reconcile(&v2, "A\n\nNew text here\n\nC\n\n", "doc").unwrap();
        let key = key_of(&v3, "New text here");
        assert_ne!(key.as_str(), "doc:2");
        assert!("doc:0" < key.as_str() && key.as_str() < "doc:4");
    }

    #[test]
    fn test_small_edit_keeps_key() {
        let old = state(&[("doc:0", "Intro"), ("doc:2", "The cat sat")]);
        let next = reconcile(&old, "Intro\n\nThe dog sat\n\n", "doc").unwrap();
        assert_eq!(next.snapshot.get(&Key::from("doc:2")), Some("The dog sat"));
        assert_eq!(next.snapshot.len(), 2);
    }

    #[test]
    fn test_large_edit_mints_new_key() {
        let old = state(&[("doc:0", "X"), ("doc:2", "abcdefgh")]);
        let next = reconcile(&old, "X\n\n12345678\n\n", "doc").unwrap();
        assert_eq!(texts(&next), ["X", "12345678"]);
        assert!(!next.snapshot.contains_key(&Key::from("doc:2")));
        assert!(key_of(&next, "12345678").as_str() > "doc:2");
        assert!(next.retained.contains(&Key::from("doc:2")));
    }

    #[test]
    fn test_first_key_always_edited_in_place() {
        let old = state(&[("doc:0", "abcdefgh")]);
        let next = reconcile(&old, "12345678\n\n", "doc").unwrap();
        assert_eq!(next.snapshot.get(&Key::from("doc:0")), Some("12345678"));
        assert_eq!(next.retained.len(), 1);
    }

    #[test]
    fn test_paragraph_split() {
        let old = state(&[("doc:0", "Intro"), ("doc:2", "First half. Second half.")]);
        let next = reconcile(&old, "Intro\n\nFirst half.\n\nSecond half.\n\n", "doc").unwrap();
        assert_eq!(texts(&next), ["Intro", "First half.", "Second half."]);
        assert_eq!(next.snapshot.get(&Key::from("doc:2")), Some("First half."));
    }

    #[test]
    fn test_paragraph_merge() {
        let old = state(&[("doc:0", "Intro"), ("doc:2", "Alpha"), ("doc:4", "Beta")]);
        let next = reconcile(&old, "Intro\n\nAlpha Beta\n\n", "doc").unwrap();
        assert_eq!(texts(&next), ["Intro", "Alpha Beta"]);
        assert_eq!(next.snapshot.get(&Key::from("doc:2")), Some("Alpha Beta"));
        assert!(next.retained.contains(&Key::from("doc:4")));
    }

    #[test]
    fn test_crlf_does_not_churn() {
        let old = state(&[("doc:0", "Line one\nLine two")]);
        let next = reconcile(&old, "Line one\r\nLine two\r\n\r\n", "doc").unwrap();
        assert_eq!(next, old);
    }

    #[test]
    fn test_stability() {
        let text = "Title\n\nFirst paragraph\nwith two lines\n\n\n\nSecond\n\nThird\n";
        let v1 = reconcile(&DocumentState::default(), text, "doc").unwrap();
        let v2 = reconcile(&v1, &render(&v1.snapshot), "doc").unwrap();
        assert_eq!(v2, v1);
    }

    #[test]
    fn test_namespace_carried_over() {
        let old = state(&[("old:0", "Foo")]);
        let next = reconcile(&old, "Foo\n\nBar\n\n", "renamed").unwrap();
        assert!(next.snapshot.keys().all(|k| k.namespace() == "old"));
    }

    #[test]
    fn test_malformed_retained_key() {
        let mut old = state(&[("doc:0", "Foo")]);
        old.retained.insert(Key::from("doc:0!"));
        let err = reconcile(&old, "Foo\n\n", "doc").unwrap_err();
        assert!(matches!(err, ReconcileError::MalformedKey { .. }));

        let mut old = state(&[("doc:0", "Foo")]);
        old.retained.insert(Key::from("other:1"));
        assert!(reconcile(&old, "Foo\n\n", "doc").is_err());
    }

    #[test]
    fn test_emptied_document_accepts_new_text() {
        let mut old = DocumentState::default();
        old.retained.insert(Key::from("doc:0"));
        let next = reconcile(&old, "Fresh\n\n", "doc").unwrap();
        assert_eq!(texts(&next), ["Fresh"]);
        let key = key_of(&next, "Fresh");
        assert_ne!(key.as_str(), "doc:0");
        assert!(next.retained.contains(key));
        assert!(next.retained.contains(&Key::from("doc:0")));
    }

    #[test]
    fn test_text_cleared_then_rewritten() {
        let first = reconcile(&DocumentState::default(), "Alpha paragraph\n\nBravo paragraph\n\n", "doc").unwrap();
        let cleared = reconcile(&first, "", "doc").unwrap();
        assert!(cleared.snapshot.is_empty());
        assert_eq!(cleared.retained.len(), 2);

        let text = "Charlie paragraph\n\nDelta paragraph\n\nEcho paragraph\n\n";
        let rewritten = reconcile(&cleared, text, "doc").unwrap();
        assert_eq!(texts(&rewritten), ["Charlie paragraph", "Delta paragraph", "Echo paragraph"]);
        assert_eq!(render(&rewritten.snapshot), text);
        for key in rewritten.snapshot.keys() {
            assert!(!cleared.retained.contains(key));
        }
        assert_eq!(rewritten.retained.len(), 5);

        // And the state keeps advancing afterwards
        let again = reconcile(&rewritten, "Charlie paragraph\n\nEcho paragraph\n\n", "doc").unwrap();
        assert_eq!(texts(&again), ["Charlie paragraph", "Echo paragraph"]);
    }

    #[test]
    fn test_unanchored_insertion_in_walked_document() {
        let minter = Minter {
            namespace: "doc",
            alphabet: &Alphabet::default(),
            index: KeyIndex::new(),
            anchored: true,
        };
        let slots = vec![Slot::Inserted {
            text: "Orphan".to_owned(),
        }];
        let err = minter.assign(slots, &mut RetainedKeys::new()).unwrap_err();
        assert!(matches!(err, ReconcileError::Unanchored));
        assert!(err.is_internal_fault());
    }

    struct GarbageDiffer;

    impl TextDiffer for GarbageDiffer {
        fn diff(&self, _old: &str, _new: &str) -> Vec<Span> {
            vec![Span::equal("garbage\n\n")]
        }
    }

    #[test]
    fn test_inconsistent_script_aborts() {
        let reconciler = Reconciler::with_differ(GarbageDiffer);
        let old = state(&[("doc:0", "Foo")]);
        let err = reconciler.reconcile(&old, "Foo\n\n", "doc").unwrap_err();
        assert!(matches!(err, ReconcileError::Inconsistent { .. }));
        assert!(err.is_internal_fault());
    }

    #[test]
    fn test_changes_reported() {
        let old = state(&[("doc:0", "Foo"), ("doc:2", "Bar"), ("doc:4", "The cat sat")]);
        let mut log = Vec::new();
        Reconciler::default()
            .reconcile_observed(&old, "Foo\n\nThe dog sat\n\nNew\n\n", "doc", &mut log)
            .unwrap();
        let counts: ChangeCounts = log.iter().collect();
        assert_eq!(counts, ChangeCounts { added: 1, removed: 1, changed: 1 });
    }

    #[test]
    fn test_stats() {
        let old = state(&[("doc:0", "alpha one"), ("doc:2", "bravo two"), ("doc:4", "charlie three")]);
        let (_, stats) = Reconciler::default()
            .reconcile_with_stats(&old, "alpha one\n\ncharlie three\n\ndelta four\n\n", "doc")
            .unwrap();
        assert_eq!(stats, ReconcileStats { kept: 2, edited: 0, deleted: 1, inserted: 1 });
    }

    fn document() -> impl Strategy<Value = String> {
        let paragraph = proptest::collection::vec("[a-e]{1,6}", 1..4).prop_map(|w| w.join(" "));
        proptest::collection::vec((paragraph, prop_oneof!["\n\n", "\n\n\n", "\n"]), 0..8).prop_map(|ps| {
            ps.into_iter().map(|(p, sep)| p + &sep).collect()
        })
    }

    proptest! {
        #[test]
        fn prop_order_matches_new_text(old in document(), new in document()) {
            let v1 = reconcile(&DocumentState::default(), &old, "doc").unwrap();
            let v2 = reconcile(&v1, &new, "doc").unwrap();

            let got: Vec<String> = v2.snapshot.texts().map(normalized).collect();
            let want: Vec<String> = paragraphs(&new).iter().map(|p| normalized(p)).collect();
            prop_assert_eq!(got, want);
            prop_assert!(v1.retained.is_subset(&v2.retained));
            prop_assert!(v2.snapshot.keys().all(|k| v2.retained.contains(k)));
        }

        #[test]
        fn prop_render_is_stable(text in document()) {
            let v1 = reconcile(&DocumentState::default(), &text, "doc").unwrap();
            let v2 = reconcile(&v1, &render(&v1.snapshot), "doc").unwrap();
            prop_assert_eq!(v2, v1);
        }
    }
}
