//! Span reconciliation after user corrections.
//!
//! When the user accepts or ignores a correction, the existing span list is
//! updated in place instead of re-running resolution. The functions here
//! are pure over the caller-owned list and need no locking.
//!
//! Contract for `accept_suggestion` on span S = [start, end) with
//! replacement R:
//! - S becomes `UserCorrected` with surface R and end = start + len(R)
//! - spans ending at or before S are untouched
//! - spans starting at or after S's old end shift by len(R) - len(S)
//! - spans partially overlapping S are dropped from the list. This loses
//!   annotation fidelity at the overlap boundary; callers wanting those
//!   annotations back must request a full re-resolution.
//!
//! Reconciling a span absent from the list is a no-op, tolerating stale
//! client state.

use crate::domain::{Classification, TermSpan};

/// Apply an accepted suggestion, mutating the span list in place.
///
/// `start`/`end` identify the target span by its current offsets. Returns
/// whether a matching span was found (false means no-op).
pub fn accept_suggestion(
    spans: &mut Vec<TermSpan>,
    start: usize,
    end: usize,
    replacement: &str,
) -> bool {
    let Some(target) = spans.iter().position(|s| s.start == start && s.end == end) else {
        return false;
    };

    let delta = replacement.len() as isize - (end - start) as isize;

    let mut updated = Vec::with_capacity(spans.len());
    for (i, mut span) in spans.drain(..).enumerate() {
        if i == target {
            span.classification = Classification::UserCorrected;
            span.surface_text = replacement.to_string();
            span.end = start + replacement.len();
            span.suggestions.clear();
            span.confidence = 1.0;
            updated.push(span);
        } else if span.end <= start {
            updated.push(span);
        } else if span.start >= end {
            span.start = (span.start as isize + delta) as usize;
            span.end = (span.end as isize + delta) as usize;
            updated.push(span);
        }
        // Partial overlap with the corrected range: dropped
    }

    *spans = updated;
    true
}

/// Mark a span reviewed without changing the text.
///
/// The span keeps its surface text and offsets but transitions to
/// `UserCorrected`, so no matcher may reclassify it. Returns whether a
/// matching span was found.
pub fn ignore_span(spans: &mut [TermSpan], start: usize, end: usize) -> bool {
    match spans.iter_mut().find(|s| s.start == start && s.end == end) {
        Some(span) => {
            span.classification = Classification::UserCorrected;
            span.confidence = 1.0;
            true
        }
        None => false,
    }
}

/// Produce the edited text for an accepted replacement over `[start, end)`
pub fn apply_replacement(text: &str, start: usize, end: usize, replacement: &str) -> String {
    let mut edited = String::with_capacity(text.len() + replacement.len());
    edited.push_str(&text[..start]);
    edited.push_str(replacement);
    edited.push_str(&text[end..]);
    edited
}
