//! Term resolution pipeline.
//!
//! Aggregates the source matchers into one classification per candidate
//! span plus a ranked suggestion list. Sources are consulted cheapest
//! first: dictionary, dynamic list, classification cache, cached validator
//! response, and only then a live validator call. The drug-confusion
//! matcher runs independently over the same snapshot and its verdict
//! overrides plain spelling classification wherever spans overlap.
//!
//! Resolution never fails: validator errors, timeouts, and open-breaker
//! skips degrade the affected span to `Unvalidated` and the rest of the
//! batch proceeds.
//!
//! Concurrent `resolve` calls for the same snapshot are coalesced into a
//! single in-flight resolution whose result all waiters share, so an
//! uncached term costs at most one external call per snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, OnceCell};

use crate::cache::{CacheKind, CacheSet, CacheStats};
use crate::core::extract::{self, Candidate, CandidateKind};
use crate::domain::{
    normalize_term, Classification, MatchSource, Suggestion, SuggestionSource, TermSpan,
};
use crate::matchers::{
    similarity, ConfusionTable, Dictionary, DictionaryLookup, DynamicList, DynamicListError,
    GuardedValidator, ValidationOutcome,
};

/// Tunables for suggestion merging and validator lookups
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    /// Maximum suggestions kept per span (K)
    pub max_suggestions: usize,

    /// Minimum normalized similarity between a suggestion and the original
    /// term; anything below is dropped
    pub similarity_floor: f64,

    /// Concepts requested per validator lookup
    pub validator_limit: usize,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            max_suggestions: 5,
            similarity_floor: 0.6,
            validator_limit: 3,
        }
    }
}

/// Payload stored in the classification cache
#[derive(Debug, Serialize, Deserialize)]
struct CachedClassification {
    classification: Classification,
    confidence: f64,
    source: Option<MatchSource>,
}

/// Coalescing key: hash of the snapshot with trailing whitespace ignored.
/// Leading text is kept verbatim so offsets stay faithful to the caller's
/// snapshot.
fn snapshot_key(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.trim_end().as_bytes());
    hex::encode(hasher.finalize())
}

/// The annotation engine: source matchers, caches, and the resolution
/// pipeline behind the `resolve` / `suggest` / `confirm_term` operations
pub struct Resolver {
    dictionary: Dictionary,
    dynamic_list: DynamicList,
    confusion: ConfusionTable,
    validator: GuardedValidator,
    caches: Arc<CacheSet>,
    settings: ResolverSettings,

    /// One in-flight resolution per snapshot key
    in_flight: Mutex<HashMap<String, Arc<OnceCell<Vec<TermSpan>>>>>,
}

impl Resolver {
    pub fn new(
        dictionary: Dictionary,
        dynamic_list: DynamicList,
        confusion: ConfusionTable,
        validator: GuardedValidator,
        caches: Arc<CacheSet>,
        settings: ResolverSettings,
    ) -> Self {
        Self {
            dictionary,
            dynamic_list,
            confusion,
            validator,
            caches,
            settings,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Full pipeline run over a text snapshot.
    ///
    /// Returns spans sorted ascending by start, non-overlapping. Empty or
    /// whitespace-only input yields an empty list.
    pub async fn resolve(&self, text: &str) -> Vec<TermSpan> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let key = snapshot_key(text);
        let cell = {
            let mut in_flight = self.in_flight.lock().await;
            in_flight
                .entry(key.clone())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let spans = cell
            .get_or_init(|| self.resolve_uncoalesced(text))
            .await
            .clone();

        // Drop the in-flight slot so a later resolve observes fresh
        // cache/dynamic-list state
        let mut in_flight = self.in_flight.lock().await;
        if let Some(current) = in_flight.get(&key) {
            if Arc::ptr_eq(current, &cell) {
                in_flight.remove(&key);
            }
        }

        spans
    }

    async fn resolve_uncoalesced(&self, text: &str) -> Vec<TermSpan> {
        let candidates = extract::extract_candidates(text, &self.dictionary, &self.dynamic_list);

        let mut spans = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            spans.push(self.classify_candidate(candidate).await);
        }

        // Independent confusion pass; overlapping spans take the
        // drug-confusion classification over the spelling one
        for confusion_span in self.confusion.scan(text) {
            match spans
                .iter()
                .position(|s| s.overlaps(confusion_span.start, confusion_span.end))
            {
                Some(i) => {
                    let existing = &mut spans[i];
                    existing.classification = Classification::DrugConfusable;
                    existing.source = Some(MatchSource::DrugConfusion);
                    existing.confidence = existing.confidence.max(confusion_span.confidence);
                    existing.suggestions.extend(confusion_span.suggestions);
                }
                None => spans.push(confusion_span),
            }
        }

        spans.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| b.end.cmp(&a.end)));
        let mut result: Vec<TermSpan> = Vec::with_capacity(spans.len());
        for span in spans {
            if result.last().map_or(true, |last| span.start >= last.end) {
                result.push(span);
            }
        }

        for span in &mut result {
            let pool = std::mem::take(&mut span.suggestions);
            span.suggestions = self.merge_suggestions(&span.surface_text, pool);
        }

        result
    }

    /// Classify one candidate, consulting sources in priority order
    async fn classify_candidate(&self, candidate: Candidate) -> TermSpan {
        let mut span =
            TermSpan::unvalidated(candidate.start, candidate.end, candidate.surface.clone());

        // Dosage and abbreviation tokens are well-formed by construction
        if candidate.kind != CandidateKind::Term {
            span.classification = Classification::Correct;
            span.source = Some(MatchSource::Dictionary);
            span.confidence = 0.9;
            return span;
        }

        let term = &candidate.surface;

        match self.dictionary.lookup(term) {
            DictionaryLookup::Correct { .. } => {
                span.classification = Classification::Correct;
                span.source = Some(MatchSource::Dictionary);
                span.confidence = 1.0;
                return span;
            }
            DictionaryLookup::Misspelled { .. } => {
                span.classification = Classification::Misspelled;
                span.source = Some(MatchSource::Dictionary);
                span.confidence = 0.9;
                span.suggestions = self.dictionary_suggestions(term);
                return span;
            }
            DictionaryLookup::Unknown => {}
        }

        // User-confirmed terms fail open to correct, no validator call
        if self.dynamic_list.contains(term) {
            span.classification = Classification::Correct;
            span.source = Some(MatchSource::DynamicList);
            span.confidence = 1.0;
            return span;
        }

        if let Some(cached) = self.cached_classification(term) {
            span.classification = cached.classification;
            span.source = cached.source;
            span.confidence = cached.confidence;
            if cached.classification == Classification::Misspelled {
                span.suggestions = self.dictionary_suggestions(term);
                if let Some(outcome) = self.cached_validator_outcome(term) {
                    span.suggestions.extend(outcome_suggestions(&outcome));
                }
            }
            return span;
        }

        // Cached validator response, then (miss only) a live call
        let outcome = match self.cached_validator_outcome(term) {
            Some(outcome) => Some(outcome),
            None => match self
                .validator
                .lookup(term, self.settings.validator_limit)
                .await
            {
                Ok(outcome) => {
                    if let Ok(payload) = serde_json::to_value(&outcome) {
                        self.caches.put(CacheKind::Validator, term, payload);
                    }
                    Some(outcome)
                }
                Err(e) => {
                    tracing::warn!("Validator lookup failed for '{}': {}", term, e);
                    None
                }
            },
        };

        match outcome {
            Some(outcome) if outcome.valid => {
                span.classification = Classification::Correct;
                span.source = Some(MatchSource::Validator);
                span.confidence = 0.95;
            }
            Some(outcome) => {
                span.classification = Classification::Misspelled;
                span.source = Some(MatchSource::Validator);
                span.confidence = 0.7;
                span.suggestions = self.dictionary_suggestions(term);
                span.suggestions.extend(outcome_suggestions(&outcome));
            }
            None => {
                // Degraded: validator unreachable, leave unvalidated but
                // still offer local suggestions. Not cached, so a later
                // resolve retries the validator.
                span.suggestions = self.dictionary_suggestions(term);
                return span;
            }
        }

        let cached = CachedClassification {
            classification: span.classification,
            confidence: span.confidence,
            source: span.source,
        };
        if let Ok(payload) = serde_json::to_value(&cached) {
            self.caches.put(CacheKind::Classification, term, payload);
        }

        span
    }

    /// Suggestion lookup independent of full resolution, used by
    /// "show alternatives" flows. Consults the suggestion cache first.
    pub async fn suggest(&self, term: &str) -> Vec<Suggestion> {
        let normalized = normalize_term(term);
        if normalized.is_empty() {
            return Vec::new();
        }

        if let Some(entry) = self.caches.get(CacheKind::Suggestion, term) {
            if let Ok(suggestions) = serde_json::from_value::<Vec<Suggestion>>(entry.payload) {
                return suggestions;
            }
            // Malformed payload: treat as a miss
        }

        let mut pool = self.dictionary_suggestions(term);

        let outcome = match self.cached_validator_outcome(term) {
            Some(outcome) => Some(outcome),
            None => match self
                .validator
                .lookup(term, self.settings.validator_limit)
                .await
            {
                Ok(outcome) => {
                    if let Ok(payload) = serde_json::to_value(&outcome) {
                        self.caches.put(CacheKind::Validator, term, payload);
                    }
                    Some(outcome)
                }
                Err(e) => {
                    tracing::warn!("Validator suggestions unavailable for '{}': {}", term, e);
                    None
                }
            },
        };
        if let Some(outcome) = outcome {
            pool.extend(outcome_suggestions(&outcome));
        }

        if let Some(alternatives) = self.confusion.alternatives(term) {
            pool.extend(
                alternatives
                    .iter()
                    .map(|alt| Suggestion::new(alt.clone(), SuggestionSource::DrugConfusion)),
            );
        }

        let merged = self.merge_suggestions(term, pool);
        if let Ok(payload) = serde_json::to_value(&merged) {
            self.caches.put(CacheKind::Suggestion, term, payload);
        }
        merged
    }

    /// Add a user-confirmed term to the dynamic list (durable)
    pub fn confirm_term(&self, term: &str) -> Result<bool, DynamicListError> {
        self.dynamic_list.confirm(term)
    }

    /// Delete expired entries from every cache kind
    pub fn sweep_caches(&self) -> usize {
        self.caches.sweep_all()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.caches.stats()
    }

    pub fn dynamic_list(&self) -> &DynamicList {
        &self.dynamic_list
    }

    pub fn caches(&self) -> &Arc<CacheSet> {
        &self.caches
    }

    fn cached_classification(&self, term: &str) -> Option<CachedClassification> {
        let entry = self.caches.get(CacheKind::Classification, term)?;
        serde_json::from_value(entry.payload).ok()
    }

    fn cached_validator_outcome(&self, term: &str) -> Option<ValidationOutcome> {
        let entry = self.caches.get(CacheKind::Validator, term)?;
        serde_json::from_value(entry.payload).ok()
    }

    fn dictionary_suggestions(&self, term: &str) -> Vec<Suggestion> {
        self.dictionary
            .fuzzy_suggestions(term, self.settings.max_suggestions)
            .into_iter()
            .map(|value| Suggestion::new(value, SuggestionSource::DictionaryFuzzy))
            .collect()
    }

    /// Merge a suggestion pool: dedup by normalized value (highest-priority
    /// source wins), drop entries below the similarity floor, order by
    /// source priority then similarity then value, truncate to K, and
    /// assign final ranks.
    fn merge_suggestions(&self, term: &str, pool: Vec<Suggestion>) -> Vec<Suggestion> {
        let mut best: HashMap<String, Suggestion> = HashMap::new();
        for suggestion in pool {
            let key = normalize_term(&suggestion.value);
            if key.is_empty() || key == normalize_term(term) {
                continue;
            }
            match best.get(&key) {
                Some(existing) if existing.source.priority() <= suggestion.source.priority() => {}
                _ => {
                    best.insert(key, suggestion);
                }
            }
        }

        let mut merged: Vec<(f64, Suggestion)> = best
            .into_values()
            .filter_map(|s| {
                let score = similarity(term, &s.value);
                (score >= self.settings.similarity_floor).then_some((score, s))
            })
            .collect();

        merged.sort_by(|(score_a, a), (score_b, b)| {
            a.source
                .priority()
                .cmp(&b.source.priority())
                .then_with(|| score_b.total_cmp(score_a))
                .then_with(|| a.value.cmp(&b.value))
        });

        merged
            .into_iter()
            .take(self.settings.max_suggestions)
            .enumerate()
            .map(|(rank, (_, mut suggestion))| {
                suggestion.rank = rank;
                suggestion
            })
            .collect()
    }
}

/// Convert a validator outcome into validator-sourced suggestions
fn outcome_suggestions(outcome: &ValidationOutcome) -> Vec<Suggestion> {
    outcome
        .suggestions
        .iter()
        .map(|value| Suggestion::new(value.clone(), SuggestionSource::Validator))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheSettings;
    use crate::matchers::{BreakerSettings, TerminologyService, ValidatorError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted terminology service: validates a fixed set of terms and
    /// counts calls
    struct FakeService {
        valid_terms: Vec<&'static str>,
        calls: AtomicUsize,
    }

    impl FakeService {
        fn new(valid_terms: Vec<&'static str>) -> Self {
            Self {
                valid_terms,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TerminologyService for FakeService {
        async fn lookup(
            &self,
            term: &str,
            _limit: usize,
        ) -> Result<ValidationOutcome, ValidatorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let valid = self.valid_terms.contains(&normalize_term(term).as_str());
            Ok(ValidationOutcome {
                valid,
                suggestions: Vec::new(),
            })
        }
    }

    fn resolver_with(service: FakeService) -> Resolver {
        Resolver::new(
            Dictionary::with_defaults(),
            DynamicList::in_memory(),
            ConfusionTable::with_defaults(),
            GuardedValidator::new(Box::new(service), BreakerSettings::default()),
            Arc::new(CacheSet::in_memory(CacheSettings::default())),
            ResolverSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_misspelling_example() {
        let resolver = resolver_with(FakeService::new(vec![]));
        let spans = resolver.resolve("Patient takes wofarin daily").await;

        assert_eq!(spans.len(), 1);
        assert_eq!((spans[0].start, spans[0].end), (14, 21));
        assert_eq!(spans[0].surface_text, "wofarin");
        assert_eq!(spans[0].classification, Classification::Misspelled);
        assert!(spans[0]
            .suggestions
            .iter()
            .any(|s| s.value == "warfarin" && s.source == SuggestionSource::DictionaryFuzzy));
    }

    #[tokio::test]
    async fn test_empty_input_yields_no_spans() {
        let resolver = resolver_with(FakeService::new(vec![]));
        assert!(resolver.resolve("").await.is_empty());
        assert!(resolver.resolve("   \n\t ").await.is_empty());
    }

    #[tokio::test]
    async fn test_dynamic_list_hit_skips_validator() {
        let resolver = resolver_with(FakeService::new(vec![]));
        resolver.confirm_term("apixaban").unwrap();

        let spans = resolver.resolve("continue apixaban").await;
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].classification, Classification::Correct);
        assert_eq!(spans[0].source, Some(MatchSource::DynamicList));
    }

    #[tokio::test]
    async fn test_confusion_overrides_correct_spelling() {
        let resolver = resolver_with(FakeService::new(vec![]));
        let spans = resolver
            .resolve("hydralazine 25 mg and hydroxyzine 10 mg")
            .await;

        let confusable: Vec<&TermSpan> = spans
            .iter()
            .filter(|s| s.classification == Classification::DrugConfusable)
            .collect();
        assert_eq!(confusable.len(), 2);
        assert!(confusable[0]
            .suggestions
            .iter()
            .any(|s| s.source == SuggestionSource::DrugConfusion));
    }

    #[tokio::test]
    async fn test_deterministic_resolution() {
        let resolver = resolver_with(FakeService::new(vec![]));
        let text = "asprin and metaformin for diabetis";
        let first = resolver.resolve(text).await;
        let second = resolver.resolve(text).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_merge_dedups_and_ranks() {
        let resolver = resolver_with(FakeService::new(vec![]));
        let pool = vec![
            Suggestion::new("warfarin", SuggestionSource::Validator),
            Suggestion::new("Warfarin", SuggestionSource::DictionaryFuzzy),
            Suggestion::new("warfarn", SuggestionSource::Validator),
        ];

        let merged = resolver.merge_suggestions("wofarin", pool);
        // Dedup keeps the dictionary-fuzzy copy; ranks are sequential
        assert_eq!(merged[0].source, SuggestionSource::DictionaryFuzzy);
        assert_eq!(merged[0].rank, 0);
        assert!(merged.iter().all(|s| normalize_term(&s.value) != "wofarin"));
        for (i, s) in merged.iter().enumerate() {
            assert_eq!(s.rank, i);
        }
    }

    #[tokio::test]
    async fn test_merge_drops_below_similarity_floor() {
        let resolver = resolver_with(FakeService::new(vec![]));
        let pool = vec![Suggestion::new(
            "colonoscopy",
            SuggestionSource::Validator,
        )];
        let merged = resolver.merge_suggestions("aspirin", pool);
        assert!(merged.is_empty());
    }
}
