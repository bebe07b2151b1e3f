//! Confusable medication-name matcher.
//!
//! Scans text against a table of look-alike/sound-alike drug pairs and
//! flags every occurrence, whether or not the name is spelled correctly.
//! A confusable hit outranks a plain spelling classification downstream.

use std::collections::HashMap;

use crate::core::extract::word_tokens;
use crate::domain::{
    normalize_term, Classification, MatchSource, Suggestion, SuggestionSource, TermSpan,
};

/// Confidence attached to confusable-drug spans
const CONFUSION_CONFIDENCE: f64 = 0.85;

/// Table of commonly-confused medication name pairs
pub struct ConfusionTable {
    /// Normalized drug name -> names it is confused with
    alternatives: HashMap<String, Vec<String>>,
}

impl ConfusionTable {
    /// Build from explicit pairs; each pair is registered in both directions
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        let mut alternatives: HashMap<String, Vec<String>> = HashMap::new();
        for (a, b) in pairs {
            let a = normalize_term(a);
            let b = normalize_term(b);
            alternatives.entry(a.clone()).or_default().push(b.clone());
            alternatives.entry(b).or_default().push(a);
        }
        for list in alternatives.values_mut() {
            list.sort();
            list.dedup();
        }
        Self { alternatives }
    }

    /// Built-in look-alike/sound-alike pair set
    pub fn with_defaults() -> Self {
        Self::from_pairs(&[
            ("hydralazine", "hydroxyzine"),
            ("clonidine", "clonazepam"),
            ("metformin", "metronidazole"),
            ("lamotrigine", "lamivudine"),
            ("celecoxib", "citalopram"),
            ("tramadol", "trazodone"),
            ("bupropion", "buspirone"),
            ("glipizide", "glyburide"),
            ("prednisone", "prednisolone"),
            ("fludarabine", "flumazenil"),
            ("dopamine", "dobutamine"),
            ("vinblastine", "vincristine"),
        ])
    }

    /// Names the given drug is commonly confused with
    pub fn alternatives(&self, term: &str) -> Option<&[String]> {
        self.alternatives
            .get(&normalize_term(term))
            .map(|v| v.as_slice())
    }

    /// Scan a snapshot and produce a `DrugConfusable` span for every
    /// occurrence of a tabled name, with the confusable alternatives as
    /// suggestions. Runs independently of spelling classification.
    pub fn scan(&self, text: &str) -> Vec<TermSpan> {
        let mut spans = Vec::new();

        for (start, end) in word_tokens(text) {
            let word = &text[start..end];
            let Some(alternatives) = self.alternatives(word) else {
                continue;
            };

            let suggestions = alternatives
                .iter()
                .enumerate()
                .map(|(rank, alt)| Suggestion {
                    value: alt.clone(),
                    source: SuggestionSource::DrugConfusion,
                    rank,
                })
                .collect();

            spans.push(TermSpan {
                start,
                end,
                surface_text: word.to_string(),
                classification: Classification::DrugConfusable,
                suggestions,
                source: Some(MatchSource::DrugConfusion),
                confidence: CONFUSION_CONFIDENCE,
            });
        }

        spans
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pairs_are_bidirectional() {
        let table = ConfusionTable::with_defaults();
        assert!(table
            .alternatives("hydralazine")
            .unwrap()
            .contains(&"hydroxyzine".to_string()));
        assert!(table
            .alternatives("hydroxyzine")
            .unwrap()
            .contains(&"hydralazine".to_string()));
        assert!(table.alternatives("aspirin").is_none());
    }

    #[test]
    fn test_scan_flags_correctly_spelled_names() {
        let table = ConfusionTable::with_defaults();
        let text = "switch hydralazine to hydroxyzine";
        let spans = table.scan(text);

        assert_eq!(spans.len(), 2);
        assert!(spans
            .iter()
            .all(|s| s.classification == Classification::DrugConfusable));
        assert_eq!(&text[spans[0].start..spans[0].end], "hydralazine");
        assert_eq!(&text[spans[1].start..spans[1].end], "hydroxyzine");
        assert_eq!(spans[0].suggestions[0].value, "hydroxyzine");
        assert_eq!(spans[0].suggestions[0].source, SuggestionSource::DrugConfusion);
    }

    #[test]
    fn test_scan_is_case_insensitive() {
        let table = ConfusionTable::with_defaults();
        let spans = table.scan("Tramadol 50 mg");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].surface_text, "Tramadol");
    }

    #[test]
    fn test_scan_clean_text_is_empty() {
        let table = ConfusionTable::with_defaults();
        assert!(table.scan("aspirin for headache").is_empty());
    }
}
