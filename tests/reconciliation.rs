//! Reconciliation Integration Tests
//!
//! Resolve a note, apply user corrections, and verify the span list stays
//! consistent with the edited text without re-running resolution.

use std::sync::Arc;

use async_trait::async_trait;

use medcheck::cache::{CacheSet, CacheSettings};
use medcheck::core::{accept_suggestion, apply_replacement, ignore_span, Resolver, ResolverSettings};
use medcheck::domain::{spans_are_ordered, Classification};
use medcheck::matchers::{
    BreakerSettings, ConfusionTable, Dictionary, DynamicList, GuardedValidator,
    TerminologyService, ValidationOutcome, ValidatorError,
};

/// Validator that never matches anything
struct NullService;

#[async_trait]
impl TerminologyService for NullService {
    async fn lookup(&self, _term: &str, _limit: usize) -> Result<ValidationOutcome, ValidatorError> {
        Ok(ValidationOutcome {
            valid: false,
            suggestions: Vec::new(),
        })
    }
}

fn resolver() -> Resolver {
    Resolver::new(
        Dictionary::with_defaults(),
        DynamicList::in_memory(),
        ConfusionTable::with_defaults(),
        GuardedValidator::new(Box::new(NullService), BreakerSettings::default()),
        Arc::new(CacheSet::in_memory(CacheSettings::default())),
        ResolverSettings::default(),
    )
}

#[tokio::test]
async fn test_accept_correction_end_to_end() {
    let resolver = resolver();
    let text = "Patient takes wofarin daily";

    let mut spans = resolver.resolve(text).await;
    assert_eq!(spans[0].classification, Classification::Misspelled);
    let (start, end) = (spans[0].start, spans[0].end);
    let replacement = spans[0].suggestions[0].value.clone();

    assert!(accept_suggestion(&mut spans, start, end, &replacement));
    let edited = apply_replacement(text, start, end, &replacement);

    assert_eq!(edited, "Patient takes warfarin daily");
    assert_eq!(spans[0].classification, Classification::UserCorrected);
    assert_eq!(&edited[spans[0].start..spans[0].end], "warfarin");
    assert!(spans[0].suggestions.is_empty());
}

#[tokio::test]
async fn test_later_spans_track_the_edit() {
    let resolver = resolver();
    let text = "wofarin and diabetis noted";

    let mut spans = resolver.resolve(text).await;
    assert_eq!(spans.len(), 2);
    let (start, end) = (spans[0].start, spans[0].end);

    accept_suggestion(&mut spans, start, end, "warfarin");
    let edited = apply_replacement(text, start, end, "warfarin");

    // The second span still covers its word after the shift
    assert_eq!(&edited[spans[1].start..spans[1].end], "diabetis");
    assert_eq!(spans[1].classification, Classification::Misspelled);
    assert!(spans_are_ordered(&spans));
}

#[tokio::test]
async fn test_ignored_span_survives_as_corrected() {
    let resolver = resolver();
    let mut spans = resolver.resolve("Patient takes wofarin daily").await;
    let (start, end) = (spans[0].start, spans[0].end);

    assert!(ignore_span(&mut spans, start, end));
    assert_eq!(spans[0].classification, Classification::UserCorrected);
    assert_eq!(spans[0].surface_text, "wofarin");
    assert_eq!((spans[0].start, spans[0].end), (start, end));
}

#[tokio::test]
async fn test_stale_offsets_are_a_noop() {
    let resolver = resolver();
    let mut spans = resolver.resolve("Patient takes wofarin daily").await;
    let before = spans.clone();

    assert!(!accept_suggestion(&mut spans, 100, 110, "warfarin"));
    assert!(!ignore_span(&mut spans, 0, 3));
    assert_eq!(spans, before);
}
