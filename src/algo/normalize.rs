//! Edit script normalization.
//!
//! Raw scripts from a character differ cut spans wherever characters stop
//! matching, which rarely lines up with paragraph separators. Normalization
//! rewrites the script (without changing the texts it rebuilds) so that every
//! span either ends exactly at a paragraph separator or is a boundary-less
//! fragment that the reconciler carries into the next span.

use super::myers::{Op, Span};
use crate::codec::SEPARATOR;

/// Normalize a raw script for paragraph-level walking.
pub fn normalize(spans: Vec<Span>) -> Vec<Span> {
    let mut spans = coalesce(spans);
    rebalance_newlines(&mut spans);
    recut(spans)
}

/// Merge runs of spans with the same operation, dropping empty spans.
fn coalesce(spans: Vec<Span>) -> Vec<Span> {
    let mut out: Vec<Span> = Vec::with_capacity(spans.len());
    for span in spans {
        if span.text.is_empty() {
            continue;
        }
        match out.last_mut() {
            Some(last) if last.op == span.op => last.text.push_str(&span.text),
            _ => out.push(span),
        }
    }
    out
}

/// Move a misattributed separator newline downstream.
///
/// When a line is added to the end of a paragraph the differ tends to emit
/// `Equal("..para\n") Insert("new line\n") Equal("\nnext..")`: the separator
/// is split across three spans. Shifting one newline down each span gives
/// `Equal("..para") Insert("\nnew line") Equal("\n\nnext..")`, keeping the
/// inserted line attached to its paragraph.
fn rebalance_newlines(spans: &mut [Span]) {
    for i in 2..spans.len() {
        let shape = spans[i].op == Op::Equal
            && spans[i - 1].op == Op::Insert
            && spans[i - 2].op == Op::Equal;
        if !shape
            || !spans[i].text.starts_with('\n')
            || !spans[i - 1].text.ends_with('\n')
            || !spans[i - 2].text.ends_with('\n')
        {
            continue;
        }

        spans[i].text.insert(0, '\n');

        let inserted = &mut spans[i - 1].text;
        inserted.pop();
        inserted.insert(0, '\n');

        spans[i - 2].text.pop();
    }
}

/// Re-cut spans at paragraph separators, keeping the separator on the left.
fn recut(spans: Vec<Span>) -> Vec<Span> {
    let mut out: Vec<Span> = Vec::with_capacity(spans.len());
    for span in spans {
        for (i, piece) in span.text.split_inclusive(SEPARATOR).enumerate() {
            if i == 0 {
                if let Some(last) = out.last_mut() {
                    if last.op == span.op && !last.text.ends_with(SEPARATOR) {
                        last.text.push_str(piece);
                        continue;
                    }
                }
            }
            out.push(Span::new(span.op, piece));
        }
    }
    out
}
