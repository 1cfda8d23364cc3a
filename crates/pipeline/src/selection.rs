//! Numbered-reply protocol shared by every list the user picks from.

use crate::error::{PipelineError, Result};

/// A reply counts as a selection iff it is a positive integer (no sign, no leading zero).
///
/// Numbers too large for `usize` saturate, so they still get an out-of-range answer.
#[must_use]
pub fn parse_selection(text: &str) -> Option<usize> {
    let text = text.trim();
    let mut chars = text.chars();
    match chars.next() {
        Some('1'..='9') if chars.all(|c| c.is_ascii_digit()) => {
            Some(text.parse().unwrap_or(usize::MAX))
        },
        _ => None,
    }
}

/// Pick the 1-based `index` from `items`.
pub fn select<T>(items: &[T], index: usize) -> Result<&T> {
    index
        .checked_sub(1)
        .and_then(|i| items.get(i))
        .ok_or(PipelineError::InvalidSelection {
            index,
            len: items.len(),
        })
}
