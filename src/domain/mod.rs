//! Domain types for the annotation engine.
//!
//! This module contains the core data structures:
//! - TermSpan: a classified text range with ranked suggestions
//! - Suggestion: a single correction candidate with explicit provenance

pub mod span;

// Re-export commonly used types
pub use span::{
    normalize_term, spans_are_ordered, Classification, MatchSource, Suggestion, SuggestionSource,
    TermSpan,
};
