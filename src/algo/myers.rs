//! Myers diff over text
//!
//! Character-level edit scripts between two full texts, computed with the
//! linear-space (divide-and-conquer) variant of Myers' algorithm.
//!
//! | Step | Purpose |
//! |------|---------|
//! | Common prefix/suffix | Most edits touch a small middle region |
//! | Containment check | One text inside the other needs no search |
//! | Bisect | Find the middle snake, split, recurse |
//!
//! The search is bounded by a wall-clock deadline. When the deadline passes,
//! the unresolved region is reported as one deletion plus one insertion:
//! still a valid script, just not a minimal one.
//!
//! # References
//!
//! - Myers, E.W. "An O(ND) Difference Algorithm and Its Variations" (1986)

use std::time::{Duration, Instant};

// =============================================================================
// Public Types
// =============================================================================

/// Operation of an edit script span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Text present in both versions
    Equal,
    /// Text only in the new version
    Insert,
    /// Text only in the old version
    Delete,
}

/// One span of an edit script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub op: Op,
    pub text: String,
}

impl Span {
    pub fn new(op: Op, text: impl Into<String>) -> Self {
        Self { op, text: text.into() }
    }

    pub fn equal(text: impl Into<String>) -> Self {
        Self::new(Op::Equal, text)
    }

    pub fn insert(text: impl Into<String>) -> Self {
        Self::new(Op::Insert, text)
    }

    pub fn delete(text: impl Into<String>) -> Self {
        Self::new(Op::Delete, text)
    }

    /// Whether the span contributes to the old text.
    pub fn is_old_side(&self) -> bool {
        matches!(self.op, Op::Equal | Op::Delete)
    }

    /// Whether the span contributes to the new text.
    pub fn is_new_side(&self) -> bool {
        matches!(self.op, Op::Equal | Op::Insert)
    }
}

/// Rebuild the old text (Equal + Delete spans).
pub fn old_text(spans: &[Span]) -> String {
    spans.iter().filter(|s| s.is_old_side()).map(|s| s.text.as_str()).collect()
}

/// Rebuild the new text (Equal + Insert spans).
pub fn new_text(spans: &[Span]) -> String {
    spans.iter().filter(|s| s.is_new_side()).map(|s| s.text.as_str()).collect()
}

/// Edit distance implied by a script, in characters.
///
/// Each change block between two Equal spans costs the larger of its
/// inserted and deleted character counts (a substitution counts once).
pub fn levenshtein(spans: &[Span]) -> usize {
    let mut distance = 0;
    let mut inserted = 0;
    let mut deleted = 0;
    for span in spans {
        match span.op {
            Op::Insert => inserted += span.text.chars().count(),
            Op::Delete => deleted += span.text.chars().count(),
            Op::Equal => {
                distance += inserted.max(deleted);
                inserted = 0;
                deleted = 0;
            }
        }
    }
    distance + inserted.max(deleted)
}

// =============================================================================
// TextDiffer
// =============================================================================

/// Diff oracle used by the reconciler.
///
/// Implementations must return a script whose Equal+Delete spans rebuild
/// `old` exactly and whose Equal+Insert spans rebuild `new` exactly.
pub trait TextDiffer {
    /// Compute an edit script from `old` to `new`.
    fn diff(&self, old: &str, new: &str) -> Vec<Span>;

    /// Edit distance between two strings, in characters.
    fn distance(&self, a: &str, b: &str) -> usize {
        levenshtein(&self.diff(a, b))
    }
}

/// Default maximum time spent on one diff.
pub const DEFAULT_MAX_DIFF_DURATION: Duration = Duration::from_secs(60);

/// Myers differ with a wall-clock budget per diff.
#[derive(Debug, Clone, Copy)]
pub struct MyersDiffer {
    max_duration: Duration,
}

impl Default for MyersDiffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DIFF_DURATION)
    }
}

impl MyersDiffer {
    /// Create a differ that gives up refining after `max_duration`.
    pub fn new(max_duration: Duration) -> Self {
        Self { max_duration }
    }

    /// The configured budget.
    pub fn max_duration(&self) -> Duration {
        self.max_duration
    }
}

impl TextDiffer for MyersDiffer {
    fn diff(&self, old: &str, new: &str) -> Vec<Span> {
        // A budget too large for Instant arithmetic means "no deadline".
        let deadline = Instant::now().checked_add(self.max_duration);
        let old: Vec<char> = old.chars().collect();
        let new: Vec<char> = new.chars().collect();

        let mut out = Vec::new();
        diff_main(&old, &new, deadline, &mut out);
        compact(out)
    }
}

// =============================================================================
// Myers Algorithm Core
// =============================================================================

type Deadline = Option<Instant>;

fn expired(deadline: Deadline) -> bool {
    deadline.is_some_and(|d| Instant::now() > d)
}

fn push(out: &mut Vec<Span>, op: Op, chars: &[char]) {
    if chars.is_empty() {
        return;
    }
    match out.last_mut() {
        Some(last) if last.op == op => last.text.extend(chars),
        _ => out.push(Span::new(op, chars.iter().collect::<String>())),
    }
}

/// Diff with common prefix/suffix stripped before the real search.
fn diff_main(old: &[char], new: &[char], deadline: Deadline, out: &mut Vec<Span>) {
    let prefix_len = old.iter().zip(new).take_while(|(a, b)| a == b).count();
    let old_rest = &old[prefix_len..];
    let new_rest = &new[prefix_len..];

    let suffix_len = old_rest
        .iter()
        .rev()
        .zip(new_rest.iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    push(out, Op::Equal, &old[..prefix_len]);
    diff_compute(
        &old_rest[..old_rest.len() - suffix_len],
        &new_rest[..new_rest.len() - suffix_len],
        deadline,
        out,
    );
    push(out, Op::Equal, &old_rest[old_rest.len() - suffix_len..]);
}

/// Diff two texts that share no common prefix or suffix.
fn diff_compute(old: &[char], new: &[char], deadline: Deadline, out: &mut Vec<Span>) {
    if old.is_empty() {
        push(out, Op::Insert, new);
        return;
    }
    if new.is_empty() {
        push(out, Op::Delete, old);
        return;
    }

    let (long, short, long_op) = if old.len() > new.len() {
        (old, new, Op::Delete)
    } else {
        (new, old, Op::Insert)
    };

    if expired(deadline) {
        push(out, Op::Delete, old);
        push(out, Op::Insert, new);
        return;
    }

    // Shorter text inside the longer one
    if let Some(at) = find(long, short) {
        push(out, long_op, &long[..at]);
        push(out, Op::Equal, short);
        push(out, long_op, &long[at + short.len()..]);
        return;
    }

    // A single character that is not contained cannot be kept
    if short.len() == 1 {
        push(out, Op::Delete, old);
        push(out, Op::Insert, new);
        return;
    }

    bisect(old, new, deadline, out);
}

/// Char offset of the first occurrence of `needle` in `haystack`.
///
/// Runs on the UTF-8 form so the search is linear; matches always fall on
/// char boundaries.
fn find(haystack: &[char], needle: &[char]) -> Option<usize> {
    let haystack: String = haystack.iter().collect();
    let needle: String = needle.iter().collect();
    let at = haystack.find(needle.as_str())?;
    Some(haystack[..at].chars().count())
}

/// Find the middle snake and recurse on both halves.
///
/// Forward and reverse searches advance one edit at a time on each diagonal
/// `k = x - y`, storing the furthest reaching x in `v1`/`v2`. When the paths
/// overlap, the overlap point splits the problem in two.
fn bisect(old: &[char], new: &[char], deadline: Deadline, out: &mut Vec<Span>) {
    let n = old.len() as isize;
    let m = new.len() as isize;
    let max_d = (n + m + 1) / 2;
    let v_offset = max_d;
    let v_len = 2 * max_d;

    let mut v1 = vec![-1isize; v_len as usize];
    let mut v2 = vec![-1isize; v_len as usize];
    v1[(v_offset + 1) as usize] = 0;
    v2[(v_offset + 1) as usize] = 0;

    let delta = n - m;
    // Odd delta: the forward path detects the overlap
    let front = delta % 2 != 0;

    let (mut k1_start, mut k1_end, mut k2_start, mut k2_end) = (0isize, 0isize, 0isize, 0isize);

    for d in 0..max_d {
        if expired(deadline) {
            break;
        }

        let mut k1 = -d + k1_start;
        while k1 <= d - k1_end {
            let k1_offset = (v_offset + k1) as usize;
            let mut x1 = if k1 == -d || (k1 != d && v1[k1_offset - 1] < v1[k1_offset + 1]) {
                v1[k1_offset + 1]
            } else {
                v1[k1_offset - 1] + 1
            };
            let mut y1 = x1 - k1;
            while x1 < n && y1 < m && old[x1 as usize] == new[y1 as usize] {
                x1 += 1;
                y1 += 1;
            }
            v1[k1_offset] = x1;

            if x1 > n {
                // Ran off the right of the graph
                k1_end += 2;
            } else if y1 > m {
                // Ran off the bottom of the graph
                k1_start += 2;
            } else if front {
                let k2_offset = v_offset + delta - k1;
                if (0..v_len).contains(&k2_offset) && v2[k2_offset as usize] != -1 {
                    let x2 = n - v2[k2_offset as usize];
                    if x1 >= x2 {
                        split(old, new, x1 as usize, y1 as usize, deadline, out);
                        return;
                    }
                }
            }
            k1 += 2;
        }

        let mut k2 = -d + k2_start;
        while k2 <= d - k2_end {
            let k2_offset = (v_offset + k2) as usize;
            let mut x2 = if k2 == -d || (k2 != d && v2[k2_offset - 1] < v2[k2_offset + 1]) {
                v2[k2_offset + 1]
            } else {
                v2[k2_offset - 1] + 1
            };
            let mut y2 = x2 - k2;
            while x2 < n
                && y2 < m
                && old[(n - x2 - 1) as usize] == new[(m - y2 - 1) as usize]
            {
                x2 += 1;
                y2 += 1;
            }
            v2[k2_offset] = x2;

            if x2 > n {
                k2_end += 2;
            } else if y2 > m {
                k2_start += 2;
            } else if !front {
                let k1_offset = v_offset + delta - k2;
                if (0..v_len).contains(&k1_offset) && v1[k1_offset as usize] != -1 {
                    let x1 = v1[k1_offset as usize];
                    let y1 = v_offset + x1 - k1_offset;
                    if x1 >= n - x2 {
                        split(old, new, x1 as usize, y1 as usize, deadline, out);
                        return;
                    }
                }
            }
            k2 += 2;
        }
    }

    // Deadline hit or no commonality at all
    push(out, Op::Delete, old);
    push(out, Op::Insert, new);
}

fn split(old: &[char], new: &[char], x: usize, y: usize, deadline: Deadline, out: &mut Vec<Span>) {
    diff_main(&old[..x], &new[..y], deadline, out);
    diff_main(&old[x..], &new[y..], deadline, out);
}

/// Merge adjacent spans and order each change block as Delete then Insert.
fn compact(spans: Vec<Span>) -> Vec<Span> {
    let mut out: Vec<Span> = Vec::with_capacity(spans.len());
    let mut deleted = String::new();
    let mut inserted = String::new();

    let flush = |out: &mut Vec<Span>, deleted: &mut String, inserted: &mut String| {
        if !deleted.is_empty() {
            out.push(Span::delete(std::mem::take(deleted)));
        }
        if !inserted.is_empty() {
            out.push(Span::insert(std::mem::take(inserted)));
        }
    };

    for span in spans {
        match span.op {
            Op::Delete => deleted.push_str(&span.text),
            Op::Insert => inserted.push_str(&span.text),
            Op::Equal => {
                flush(&mut out, &mut deleted, &mut inserted);
                match out.last_mut() {
                    Some(last) if last.op == Op::Equal => last.text.push_str(&span.text),
                    _ => out.push(span),
                }
            }
        }
    }
    flush(&mut out, &mut deleted, &mut inserted);
    out
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn diff(old: &str, new: &str) -> Vec<Span> {
        MyersDiffer::default().diff(old, new)
    }

    fn assert_rebuilds(old: &str, new: &str) {
        let spans = diff(old, new);
        assert_eq!(old_text(&spans), old);
        assert_eq!(new_text(&spans), new);
    }

    #[test]
    fn test_identical() {
        assert_eq!(diff("abc", "abc"), [Span::equal("abc")]);
        assert!(diff("", "").is_empty());
    }

    #[test]
    fn test_insert_all() {
        assert_eq!(diff("", "abc"), [Span::insert("abc")]);
    }

    #[test]
    fn test_delete_all() {
        assert_eq!(diff("abc", ""), [Span::delete("abc")]);
    }

    #[test]
    fn test_append_paragraph() {
        assert_eq!(
            diff("Foo\n\n", "Foo\n\nBar\n\n"),
            [Span::equal("Foo\n\n"), Span::insert("Bar\n\n")]
        );
    }

    #[test]
    fn test_substitution_orders_delete_first() {
        assert_eq!(
            diff("The cat sat", "The dog sat"),
            [
                Span::equal("The "),
                Span::delete("cat"),
                Span::insert("dog"),
                Span::equal(" sat"),
            ]
        );
    }

    #[test]
    fn test_bisect_rebuilds_both_sides() {
        assert_rebuilds("Foo\n\nBar\n\n", "Bar\n\nFoo\n\n");
        assert_rebuilds("abcxyz123", "xbzc1y2a3");
        assert_rebuilds("héllo wörld", "hello world");
    }

    #[test]
    fn test_unrelated_texts() {
        let spans = diff("abcdefgh", "12345678");
        assert_eq!(spans, [Span::delete("abcdefgh"), Span::insert("12345678")]);
        assert_eq!(levenshtein(&spans), 8);
    }

    #[test]
    fn test_expired_deadline_degrades_to_coarse_script() {
        let differ = MyersDiffer::new(Duration::ZERO);
        let spans = differ.diff("xaaaby", "xcccdy");
        assert_eq!(old_text(&spans), "xaaaby");
        assert_eq!(new_text(&spans), "xcccdy");
    }

    #[test]
    fn test_containment_respects_deadline() {
        let short = format!("{}b", "a".repeat(200_000));
        let long = format!("c{}d", "a".repeat(400_000));
        let differ = MyersDiffer::new(Duration::from_millis(100));

        let started = Instant::now();
        let spans = differ.diff(&short, &long);
        assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
        assert_eq!(old_text(&spans), short);
        assert_eq!(new_text(&spans), long);
    }

    #[test]
    fn test_find_counts_chars() {
        let chars = |s: &str| s.chars().collect::<Vec<_>>();
        assert_eq!(find(&chars("äöxyz"), &chars("xy")), Some(2));
        assert_eq!(find(&chars("abc"), &chars("abc")), Some(0));
        assert_eq!(find(&chars("abc"), &chars("abd")), None);
    }

    #[test]
    fn test_levenshtein_counts_chars() {
        let differ = MyersDiffer::default();
        assert_eq!(differ.distance("kitten", "sitting"), 3);
        assert_eq!(differ.distance("ä", "ö"), 1);
        assert_eq!(differ.distance("same", "same"), 0);
    }

    proptest! {
        #[test]
        fn prop_script_rebuilds_inputs(old in "[ab\n ]{0,40}", new in "[ab\n ]{0,40}") {
            let spans = diff(&old, &new);
            prop_assert_eq!(old_text(&spans), old);
            prop_assert_eq!(new_text(&spans), new);
        }
    }
}
