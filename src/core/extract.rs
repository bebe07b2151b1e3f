//! Candidate span extraction.
//!
//! First stage of resolution: find the text ranges worth classifying.
//! Candidates come from three passes over the snapshot:
//! - regex patterns for medication/condition suffixes, dosage tokens, and
//!   clinical abbreviations
//! - a word scan against the local dictionary (including misspellings)
//! - a word scan against the user-confirmed dynamic list
//!
//! Output is deduplicated, sorted ascending by start, and non-overlapping
//! (earlier span wins, then the longer one).

use std::sync::OnceLock;

use regex::Regex;

use crate::matchers::{Dictionary, DynamicList};

/// How a candidate was detected; dosage and abbreviation tokens are
/// well-formed by construction and skip source-matcher classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
    /// A word that may be a medical term
    Term,
    /// A dosage token like "500 mg"
    Dosage,
    /// A clinical abbreviation like "INR"
    Abbreviation,
}

/// A text range selected for classification
#[derive(Debug, Clone)]
pub struct Candidate {
    pub start: usize,
    pub end: usize,
    pub surface: String,
    pub kind: CandidateKind,
}

/// Byte ranges of word tokens (letters, digits, hyphens)
pub fn word_tokens(text: &str) -> Vec<(usize, usize)> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;

    for (i, c) in text.char_indices() {
        let is_word = c.is_alphanumeric() || c == '-';
        match (is_word, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                tokens.push((s, i));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        tokens.push((s, text.len()));
    }
    tokens
}

fn suffix_patterns() -> &'static Vec<(Regex, CandidateKind)> {
    static PATTERNS: OnceLock<Vec<(Regex, CandidateKind)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            // Medication name suffixes
            (
                Regex::new(
                    r"(?i)\b[a-z]+(?:cillin|mycin|pril|olol|statin|sartan|azole|tidine|dipine|formin|profen|parin|arin|zepam|oxetine|thiazide|semide|azine|yzine|pentin|thyroxine|sulin)\b",
                )
                .expect("invalid medication pattern"),
                CandidateKind::Term,
            ),
            // Condition suffixes
            (
                Regex::new(r"(?i)\b[a-z]+(?:itis|osis|emia|oma|pathy|algia|rrhea|pnea|ension)\b")
                    .expect("invalid condition pattern"),
                CandidateKind::Term,
            ),
            // Dosage tokens
            (
                Regex::new(r"(?i)\b\d+(?:\.\d+)?\s*(?:mg|mcg|g|ml|cc|units?|iu|meq|mmol)\b")
                    .expect("invalid dosage pattern"),
                CandidateKind::Dosage,
            ),
            // Clinical abbreviations (case-sensitive on purpose)
            (
                Regex::new(r"\b(?:BP|HR|RR|CT|MRI|ECG|EKG|CBC|BMP|CMP|INR|CXR|IV|PO|PRN|QID|TID|BID)\b")
                    .expect("invalid abbreviation pattern"),
                CandidateKind::Abbreviation,
            ),
        ]
    })
}

/// Extract candidate spans from a text snapshot
pub fn extract_candidates(
    text: &str,
    dictionary: &Dictionary,
    dynamic_list: &DynamicList,
) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = Vec::new();

    for (pattern, kind) in suffix_patterns() {
        for m in pattern.find_iter(text) {
            let surface = m.as_str();
            if *kind == CandidateKind::Term && dictionary.should_skip(surface) {
                continue;
            }
            candidates.push(Candidate {
                start: m.start(),
                end: m.end(),
                surface: surface.to_string(),
                kind: *kind,
            });
        }
    }

    for (start, end) in word_tokens(text) {
        let word = &text[start..end];
        if dictionary.should_skip(word) {
            continue;
        }
        if dictionary.is_known(word) || dynamic_list.contains(word) {
            candidates.push(Candidate {
                start,
                end,
                surface: word.to_string(),
                kind: CandidateKind::Term,
            });
        }
    }

    // Ascending start; on ties prefer the longer span
    candidates.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| b.end.cmp(&a.end)));
    candidates.dedup_by(|a, b| a.start == b.start && a.end == b.end);

    // Drop overlaps, keeping the earlier (then longer) span
    let mut result: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        match result.last() {
            Some(last) if candidate.start < last.end => {}
            _ => result.push(candidate),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Dictionary, DynamicList) {
        (Dictionary::with_defaults(), DynamicList::in_memory())
    }

    #[test]
    fn test_word_tokens_offsets() {
        let tokens = word_tokens("Patient takes wofarin daily");
        let words: Vec<&str> = tokens.iter().map(|&(s, e)| &"Patient takes wofarin daily"[s..e]).collect();
        assert_eq!(words, vec!["Patient", "takes", "wofarin", "daily"]);
        assert_eq!(tokens[2], (14, 21));
    }

    #[test]
    fn test_suffix_pattern_catches_misspelled_drug() {
        let (dict, dynamic) = setup();
        let candidates = extract_candidates("Patient takes wofarin daily", &dict, &dynamic);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].surface, "wofarin");
        assert_eq!(candidates[0].start, 14);
        assert_eq!(candidates[0].end, 21);
        assert_eq!(candidates[0].kind, CandidateKind::Term);
    }

    #[test]
    fn test_dosage_and_abbreviation_candidates() {
        let (dict, dynamic) = setup();
        let candidates = extract_candidates("metformin 500 mg PO BID", &dict, &dynamic);

        let kinds: Vec<CandidateKind> = candidates.iter().map(|c| c.kind).collect();
        assert!(kinds.contains(&CandidateKind::Dosage));
        assert!(kinds.contains(&CandidateKind::Abbreviation));

        let dosage = candidates.iter().find(|c| c.kind == CandidateKind::Dosage).unwrap();
        assert_eq!(dosage.surface, "500 mg");
    }

    #[test]
    fn test_dynamic_list_terms_are_candidates() {
        let (dict, dynamic) = setup();
        dynamic.confirm("ozempic").unwrap();

        let candidates = extract_candidates("started Ozempic last week", &dict, &dynamic);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].surface, "Ozempic");
    }

    #[test]
    fn test_skip_words_not_candidates() {
        let (dict, dynamic) = setup();
        let candidates = extract_candidates("the patient and the history", &dict, &dynamic);
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_candidates_sorted_non_overlapping() {
        let (dict, dynamic) = setup();
        let candidates =
            extract_candidates("aspirin for headache, metformin for diabetes", &dict, &dynamic);

        assert!(candidates.windows(2).all(|w| w[0].end <= w[1].start));
        let surfaces: Vec<&str> = candidates.iter().map(|c| c.surface.as_str()).collect();
        assert_eq!(surfaces, vec!["aspirin", "headache", "metformin", "diabetes"]);
    }

    #[test]
    fn test_empty_input() {
        let (dict, dynamic) = setup();
        assert!(extract_candidates("", &dict, &dynamic).is_empty());
        assert!(extract_candidates("   \n ", &dict, &dynamic).is_empty());
    }
}
