//! Resolution pipeline.
//!
//! This module contains:
//! - Extract: candidate span detection over a text snapshot
//! - Resolver: source aggregation, classification, and suggestion merging
//! - Reconcile: in-place span updates after user corrections

pub mod extract;
pub mod reconcile;
pub mod resolver;

// Re-export commonly used types
pub use extract::{extract_candidates, word_tokens, Candidate, CandidateKind};
pub use reconcile::{accept_suggestion, apply_replacement, ignore_span};
pub use resolver::{Resolver, ResolverSettings};
