//! medcheck - Medical term annotation engine for clinical notes
//!
//! Flags misspelled medical terms and confusable drug names in free-text
//! notes, producing positioned spans with ranked correction suggestions.
//!
//! # Architecture
//!
//! The system is built around a resolution pipeline:
//! - Candidate extraction finds the text ranges worth classifying
//! - Source matchers are consulted cheapest first (dictionary, dynamic
//!   list, caches, external terminology validator)
//! - User corrections reconcile the existing span list in place instead
//!   of re-running resolution
//!
//! # Modules
//!
//! - `matchers`: Source matchers (dictionary, dynamic list, validator, confusion)
//! - `core`: Resolution pipeline (extract, resolver, reconcile)
//! - `cache`: Content-hashed, TTL-bound caching
//! - `domain`: Data structures (TermSpan, Suggestion, Classification)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Check a note
//! echo "Patient takes wofarin daily" | medcheck check
//!
//! # Suggestions for a single term
//! medcheck suggest wofarin
//!
//! # Confirm a term as correct
//! medcheck confirm apixaban
//! ```

pub mod cache;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod matchers;

// Re-export main types at crate root for convenience
pub use cache::{CacheKind, CacheSet, CacheSettings, CacheStats};
pub use core::{Resolver, ResolverSettings};
pub use domain::{Classification, MatchSource, Suggestion, SuggestionSource, TermSpan};
pub use matchers::{
    BreakerSettings, ConfusionTable, Dictionary, DynamicList, GuardedValidator,
    HttpTerminologyService, TerminologyService, ValidationOutcome, ValidatorError,
};
