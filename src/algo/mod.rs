//! Text diffing for reconciliation.
//!
//! - `myers`: character-level Myers diff with a wall-clock budget
//! - `normalize`: re-cuts edit scripts at paragraph separators

mod myers;
mod normalize;

pub use myers::{
    DEFAULT_MAX_DIFF_DURATION, MyersDiffer, Op, Span, TextDiffer, levenshtein, new_text, old_text,
};
pub use normalize::normalize;
