//! Order-maintenance index
//!
//! A character trie over key suffixes. Besides membership it answers one
//! question: give me a fresh suffix that sorts strictly between two others.
//!
//! # Minting
//!
//! ```text
//! between("02", "04")      common prefix "0", then '2' < c < '4'  -> "03"
//! between("02", "03")      no room at depth 2, descend into '2'  -> "02S"
//! between(None, "00")      below everything                      -> "/"
//! ```
//!
//! At the first differing character a fresh terminal character is preferred
//! (the shortest possible key). When the range is exhausted, the search
//! descends into the candidate subtree with the smallest height, keeping
//! keys short as insertions pile up in one spot.

use rustc_hash::FxHashMap;

use crate::error::{ReconcileError, ReconcileResult};
use crate::key::Alphabet;

// =============================================================================
// Node
// =============================================================================

#[derive(Debug, Default)]
struct Node {
    /// A stored suffix ends here.
    is_leaf: bool,
    /// Longest stored remainder below this node (0 for a bare leaf).
    height: usize,
    children: FxHashMap<char, Node>,
}

impl Node {
    /// Insert the remainder `chars`, returning the updated height.
    fn insert(&mut self, mut chars: std::str::Chars<'_>) -> usize {
        match chars.next() {
            None => self.is_leaf = true,
            Some(c) => {
                let depth = self.children.entry(c).or_default().insert(chars) + 1;
                self.height = self.height.max(depth);
            }
        }
        self.height
    }

    fn child(&self, c: char) -> Option<&Node> {
        self.children.get(&c)
    }
}

// =============================================================================
// KeyIndex
// =============================================================================

/// Trie of every suffix known for one document.
#[derive(Debug, Default)]
pub struct KeyIndex {
    root: Node,
    alphabet: Alphabet,
    len: usize,
}

impl KeyIndex {
    /// Create an empty index over the default alphabet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty index over a custom alphabet.
    pub fn with_alphabet(alphabet: Alphabet) -> Self {
        Self {
            alphabet,
            ..Self::default()
        }
    }

    /// Record a suffix. Returns `false` if it was already present.
    pub fn insert(&mut self, suffix: &str) -> bool {
        if self.contains(suffix) {
            return false;
        }
        self.root.insert(suffix.chars());
        self.len += 1;
        true
    }

    /// Check whether a suffix is stored.
    pub fn contains(&self, suffix: &str) -> bool {
        let mut node = &self.root;
        for c in suffix.chars() {
            match node.child(c) {
                Some(child) => node = child,
                None => return false,
            }
        }
        node.is_leaf
    }

    /// Number of stored suffixes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Length of the longest stored suffix.
    pub fn height(&self) -> usize {
        self.root.height
    }

    /// Mint and record a fresh suffix strictly between `prev` and `next`.
    ///
    /// `None` stands for "below every key" / "above every key". The result is
    /// never already stored and never ends with the alphabet floor.
    pub fn between(&mut self, prev: Option<&str>, next: Option<&str>) -> ReconcileResult<String> {
        let prev_chars: Vec<char> = prev.map(|s| s.chars().collect()).unwrap_or_default();
        let next_chars: Option<Vec<char>> = next.map(|s| s.chars().collect());

        let search = Search { alphabet: self.alphabet };
        let mut out = String::new();
        if !search.run(Some(&self.root), &prev_chars, next_chars.as_deref(), &mut out) {
            return Err(ReconcileError::NoRoom {
                prev: prev.map(str::to_owned),
                next: next.map(str::to_owned),
            });
        }

        self.insert(&out);
        Ok(out)
    }
}

// =============================================================================
// Search
// =============================================================================

struct Search {
    alphabet: Alphabet,
}

impl Search {
    /// Append to `out` a remainder `t` with `lo < t < hi` that is not stored
    /// under `node`. An empty `lo` is no lower bound; `hi = None` is no upper
    /// bound. Returns `false` (leaving `out` untouched) if none exists.
    fn run(&self, node: Option<&Node>, lo: &[char], hi: Option<&[char]>, out: &mut String) -> bool {
        if hi.is_some_and(<[char]>::is_empty) {
            return false;
        }

        // Shared leading character: the result must start with it too
        if let (Some(&l), Some(&h)) = (lo.first(), hi.and_then(|h| h.first())) {
            if l == h {
                out.push(l);
                let hi_rest = hi.map(|h| &h[1..]);
                if self.run(node.and_then(|n| n.child(l)), &lo[1..], hi_rest, out) {
                    return true;
                }
                out.pop();
                return false;
            }
        }

        let lo_c = lo.first().copied();
        let hi_c = hi.and_then(|h| h.first().copied());
        let low = lo_c.map_or(self.alphabet.floor, |c| c.max(self.alphabet.floor));
        let high = hi_c.map_or(self.alphabet.ceiling, |c| c.min(self.alphabet.ceiling));
        if low > high {
            return false;
        }

        let child = |c: char| node.and_then(|n| n.child(c));

        // Fresh single character
        let target = target(lo_c, hi_c, &self.alphabet);
        let fresh = (low..=high)
            .filter(|&c| Some(c) != lo_c && Some(c) != hi_c && c != self.alphabet.floor)
            .filter(|&c| child(c).is_none())
            .min_by_key(|&c| ((c as u32).abs_diff(target), c));
        if let Some(c) = fresh {
            out.push(c);
            return true;
        }

        // Descend, shallowest subtree first
        let mut candidates: Vec<(usize, char)> = (low..=high)
            .filter(|&c| Some(c) != hi_c || hi.is_some_and(|h| h.len() >= 2))
            .map(|c| (child(c).map_or(0, |n| n.height), c))
            .collect();
        candidates.sort_unstable();

        for (_, c) in candidates {
            let lo_rest: &[char] = if Some(c) == lo_c { &lo[1..] } else { &[] };
            let hi_rest = if Some(c) == hi_c { hi.map(|h| &h[1..]) } else { None };
            out.push(c);
            if self.run(child(c), lo_rest, hi_rest, out) {
                return true;
            }
            out.pop();
        }
        false
    }
}

/// Preferred character for a fresh key.
///
/// Between two bounds: the midpoint. Above the last key: right after it.
/// Below the first key: right before it. Unbounded: middle of the alphabet.
fn target(lo: Option<char>, hi: Option<char>, alphabet: &Alphabet) -> u32 {
    match (lo, hi) {
        (Some(l), Some(h)) => (l as u32 + h as u32) / 2,
        (Some(l), None) => l as u32 + 1,
        (None, Some(h)) => (h as u32).saturating_sub(1),
        (None, None) => (alphabet.floor as u32 + alphabet.ceiling as u32) / 2,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn index(keys: &[&str]) -> KeyIndex {
        let mut index = KeyIndex::new();
        for key in keys {
            index.insert(key);
        }
        index
    }

    fn assert_between(index: &mut KeyIndex, prev: Option<&str>, next: Option<&str>) -> String {
        let key = index.between(prev, next).unwrap();
        if let Some(prev) = prev {
            assert!(prev < key.as_str(), "{prev:?} < {key:?}");
        }
        if let Some(next) = next {
            assert!(key.as_str() < next, "{key:?} < {next:?}");
        }
        assert!(Alphabet::DEFAULT.check_suffix(&key).is_ok(), "{key:?}");
        key
    }

    #[test]
    fn test_insert_and_contains() {
        let mut index = index(&["02", "04"]);
        assert!(index.contains("02"));
        assert!(!index.contains("0"));
        assert!(!index.insert("04"));
        assert_eq!(index.len(), 2);
        assert_eq!(index.height(), 2);
    }

    #[test]
    fn test_gap_uses_single_character() {
        let mut index = index(&["02", "04"]);
        assert_eq!(assert_between(&mut index, Some("02"), Some("04")), "03");
        assert!(index.contains("03"));
    }

    #[test]
    fn test_append_after_last() {
        let mut index = index(&["0", "2"]);
        assert_eq!(assert_between(&mut index, Some("2"), None), "3");
    }

    #[test]
    fn test_prepend_before_first() {
        let mut index = index(&["00", "02"]);
        assert_eq!(assert_between(&mut index, None, Some("00")), "/");
    }

    #[test]
    fn test_adjacent_keys_descend() {
        let mut index = index(&["02", "03"]);
        let key = assert_between(&mut index, Some("02"), Some("03"));
        assert!(key.starts_with("02"));
        assert_eq!(key.len(), 3);
    }

    #[test]
    fn test_below_floor_prefix() {
        let mut index = index(&["-0"]);
        let key = assert_between(&mut index, None, Some("-0"));
        assert!(key.starts_with('-'));
    }

    #[test]
    fn test_empty_index() {
        let mut index = KeyIndex::new();
        let key = assert_between(&mut index, None, None);
        assert_eq!(key.chars().count(), 1);
    }

    #[test]
    fn test_no_room() {
        let mut index = index(&["a", "b"]);
        assert!(matches!(
            index.between(Some("b"), Some("a")),
            Err(ReconcileError::NoRoom { .. })
        ));
        assert!(index.between(Some("a"), Some("a")).is_err());
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_prefix_bound() {
        let mut index = index(&["a", "ab"]);
        let key = assert_between(&mut index, Some("a"), Some("ab"));
        assert!(key.starts_with('a'));
    }

    #[test]
    fn test_repeated_insertion_stays_short() {
        let mut index = index(&["0", "2"]);
        let mut prev = "0".to_owned();
        for _ in 0..200 {
            prev = assert_between(&mut index, Some(&prev), Some("2"));
        }
        assert!(index.height() < 20, "height {}", index.height());
    }

    #[test]
    fn test_custom_alphabet() {
        let mut index = KeyIndex::with_alphabet(Alphabet { floor: '0', ceiling: '9' });
        index.insert("1");
        index.insert("3");
        assert_eq!(index.between(Some("1"), Some("3")).unwrap(), "2");
        let key = index.between(Some("1"), Some("2")).unwrap();
        assert!(key.chars().all(|c| c.is_ascii_digit()));
        assert!(!key.ends_with('0'));
    }

    proptest! {
        #[test]
        fn prop_between_is_ordered_and_fresh(
            seeds in proptest::collection::btree_set("[0-9a-z]{1,4}", 0..12),
            picks in proptest::collection::vec(any::<prop::sample::Index>(), 1..30),
        ) {
            let mut index = KeyIndex::new();
            let mut keys: Vec<String> = seeds.into_iter().collect();
            for key in &keys {
                index.insert(key);
            }

            for pick in picks {
                // Mint into the gap before keys[slot]
                let slot = pick.index(keys.len() + 1);
                let prev = slot.checked_sub(1).map(|i| keys[i].clone());
                let next = keys.get(slot).cloned();

                let key = index.between(prev.as_deref(), next.as_deref()).unwrap();
                prop_assert!(prev.as_deref().is_none_or(|p| p < key.as_str()));
                prop_assert!(next.as_deref().is_none_or(|n| key.as_str() < n));
                prop_assert!(!keys.contains(&key));
                prop_assert!(!key.ends_with('-'));
                keys.insert(slot, key);
            }

            prop_assert!(keys.windows(2).all(|w| w[0] < w[1]));
            prop_assert_eq!(index.len(), keys.len());
        }
    }
}
