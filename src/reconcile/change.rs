//! Change report
//!
//! After a successful run the old and new snapshots are compared key by key
//! and every difference is handed to a [`ChangeSink`]. The report is purely
//! diagnostic: sinks cannot influence the reconciliation result.

use std::cmp::Ordering;
use std::fmt;

use crate::key::Key;
use crate::snapshot::Snapshot;

/// One observed difference between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// Key present only in the new snapshot.
    Added { key: Key, text: String },
    /// Key present only in the old snapshot.
    Removed { key: Key, text: String },
    /// Key present in both with different text.
    Changed { key: Key, old: String, new: String },
}

impl Change {
    pub fn key(&self) -> &Key {
        match self {
            Self::Added { key, .. } | Self::Removed { key, .. } | Self::Changed { key, .. } => key,
        }
    }

    pub fn is_added(&self) -> bool {
        matches!(self, Self::Added { .. })
    }

    pub fn is_removed(&self) -> bool {
        matches!(self, Self::Removed { .. })
    }

    pub fn is_changed(&self) -> bool {
        matches!(self, Self::Changed { .. })
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added { key, text } => write!(f, "New key {key}: {text:?}"),
            Self::Removed { key, text } => write!(f, "Deleted key {key}: {text:?}"),
            Self::Changed { key, old, new } => {
                write!(f, "Changed string {key}: {old:?} -> {new:?}")
            }
        }
    }
}

/// Receiver of change reports.
pub trait ChangeSink {
    fn record(&mut self, change: Change);
}

impl ChangeSink for Vec<Change> {
    fn record(&mut self, change: Change) {
        self.push(change);
    }
}

/// Sink that drops every report.
impl ChangeSink for () {
    fn record(&mut self, _change: Change) {}
}

/// Number of changes of each kind.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChangeCounts {
    pub added: usize,
    pub removed: usize,
    pub changed: usize,
}

impl<'a> FromIterator<&'a Change> for ChangeCounts {
    fn from_iter<I: IntoIterator<Item = &'a Change>>(iter: I) -> Self {
        iter.into_iter().fold(Self::default(), |mut counts, change| {
            match change {
                Change::Added { .. } => counts.added += 1,
                Change::Removed { .. } => counts.removed += 1,
                Change::Changed { .. } => counts.changed += 1,
            }
            counts
        })
    }
}

/// Report every difference between `old` and `new` in key order.
pub fn report(old: &Snapshot, new: &Snapshot, sink: &mut impl ChangeSink) {
    let mut old_iter = old.iter().peekable();
    let mut new_iter = new.iter().peekable();

    loop {
        let order = match (old_iter.peek(), new_iter.peek()) {
            (None, None) => break,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some((a, _)), Some((b, _))) => a.cmp(b),
        };
        match order {
            Ordering::Less => {
                if let Some((key, text)) = old_iter.next() {
                    sink.record(Change::Removed { key: key.clone(), text: text.to_owned() });
                }
            }
            Ordering::Greater => {
                if let Some((key, text)) = new_iter.next() {
                    sink.record(Change::Added { key: key.clone(), text: text.to_owned() });
                }
            }
            Ordering::Equal => {
                if let (Some((key, old_text)), Some((_, new_text))) = (old_iter.next(), new_iter.next()) {
                    if old_text != new_text {
                        sink.record(Change::Changed {
                            key: key.clone(),
                            old: old_text.to_owned(),
                            new: new_text.to_owned(),
                        });
                    }
                }
            }
        }
    }
}

/// Collect the differences between two snapshots.
pub fn changes(old: &Snapshot, new: &Snapshot) -> Vec<Change> {
    let mut out = Vec::new();
    report(old, new, &mut out);
    out
}
