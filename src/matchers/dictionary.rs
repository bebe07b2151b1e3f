//! Local medical dictionary with fuzzy matching.
//!
//! The cheapest source matcher: a static map of canonical terms to known
//! misspellings, a reverse index for O(1) lookup, and a bounded
//! edit-distance fuzzy match for suggestions. Queried before any other
//! source; a hit here short-circuits the rest of the pipeline.

use std::collections::{HashMap, HashSet};

use crate::domain::normalize_term;

/// Maximum edit distance considered a plausible misspelling
pub const MAX_EDIT_DISTANCE: usize = 2;

/// Outcome of a dictionary lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DictionaryLookup {
    /// Term matches a canonical spelling
    Correct { canonical: String },
    /// Term is a known misspelling of `canonical`
    Misspelled { canonical: String },
    /// Not in the dictionary
    Unknown,
}

/// Static term list plus fuzzy match
pub struct Dictionary {
    /// Canonical term -> known misspellings/aliases
    terms: HashMap<String, Vec<String>>,

    /// Any known surface form (canonical or misspelling) -> canonical
    reverse: HashMap<String, String>,

    /// Common words never treated as medical-term candidates
    skip_words: HashSet<&'static str>,
}

impl Dictionary {
    /// Build the dictionary from an explicit term map (tests use this)
    pub fn from_terms(terms: HashMap<String, Vec<String>>) -> Self {
        let mut reverse = HashMap::new();
        for (canonical, misspellings) in &terms {
            reverse.insert(canonical.clone(), canonical.clone());
            for m in misspellings {
                reverse.insert(normalize_term(m), canonical.clone());
            }
        }

        Self {
            terms,
            reverse,
            skip_words: default_skip_words(),
        }
    }

    /// Build the dictionary with the built-in clinical term set
    pub fn with_defaults() -> Self {
        Self::from_terms(default_terms())
    }

    /// Exact lookup: canonical spelling, known misspelling, or unknown
    pub fn lookup(&self, term: &str) -> DictionaryLookup {
        let normalized = normalize_term(term);
        match self.reverse.get(&normalized) {
            Some(canonical) if *canonical == normalized => DictionaryLookup::Correct {
                canonical: canonical.clone(),
            },
            Some(canonical) => DictionaryLookup::Misspelled {
                canonical: canonical.clone(),
            },
            None => DictionaryLookup::Unknown,
        }
    }

    /// Whether the term is any known surface form
    pub fn is_known(&self, term: &str) -> bool {
        self.reverse.contains_key(&normalize_term(term))
    }

    /// Whether a candidate should be skipped entirely (stop words, short tokens)
    pub fn should_skip(&self, term: &str) -> bool {
        let normalized = normalize_term(term);
        normalized.len() < 3 || self.skip_words.contains(normalized.as_str())
    }

    /// Canonical terms within [`MAX_EDIT_DISTANCE`] of `term`, closest first.
    ///
    /// A known-misspelling mapping always ranks ahead of pure edit-distance
    /// matches. Ordering is deterministic: distance, then alphabetic.
    pub fn fuzzy_suggestions(&self, term: &str, limit: usize) -> Vec<String> {
        let normalized = normalize_term(term);
        let mut suggestions: Vec<String> = Vec::new();

        if let DictionaryLookup::Misspelled { canonical } = self.lookup(&normalized) {
            suggestions.push(canonical);
        }

        let mut scored: Vec<(usize, &String)> = self
            .terms
            .keys()
            .filter_map(|canonical| {
                edit_distance_bounded(&normalized, canonical, MAX_EDIT_DISTANCE)
                    .filter(|&d| d > 0)
                    .map(|d| (d, canonical))
            })
            .collect();
        scored.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));

        for (_, canonical) in scored {
            if !suggestions.contains(canonical) {
                suggestions.push(canonical.clone());
            }
        }

        suggestions.truncate(limit);
        suggestions
    }
}

/// Levenshtein distance with an early cutoff.
///
/// Returns `None` when the distance exceeds `max`, which lets the caller
/// skip most of the dictionary without computing full distances.
pub fn edit_distance_bounded(a: &str, b: &str, max: usize) -> Option<usize> {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.len().abs_diff(b.len()) > max {
        return None;
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        let mut row_min = curr[0];

        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
            row_min = row_min.min(curr[j + 1]);
        }

        if row_min > max {
            return None;
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    let dist = prev[b.len()];
    (dist <= max).then_some(dist)
}

/// Normalized similarity in 0.0..=1.0 based on full edit distance
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = normalize_term(a);
    let b = normalize_term(b);
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }

    // Unbounded distance: cap at max_len so the ratio stays in range
    let dist = edit_distance_bounded(&a, &b, max_len).unwrap_or(max_len);
    1.0 - (dist as f64 / max_len as f64)
}

fn default_skip_words() -> HashSet<&'static str> {
    [
        "the", "and", "but", "for", "with", "was", "were", "been", "being", "have", "has", "had",
        "does", "did", "will", "would", "could", "should", "may", "might", "can", "this", "that",
        "these", "those", "you", "she", "they", "him", "her", "them", "your", "his", "its", "our",
        "their", "daily", "twice", "takes", "take", "taking", "patient", "history", "online",
        "decide", "side", "alcohol", "wine", "beer", "coffee", "water", "food", "sleep", "work",
        "home", "phone", "time", "day", "night", "morning", "evening", "afternoon",
    ]
    .into_iter()
    .collect()
}

/// Built-in clinical term set: medications, symptoms, conditions,
/// procedures, labs, anatomy, each with its common misspellings.
fn default_terms() -> HashMap<String, Vec<String>> {
    let entries: &[(&str, &[&str])] = &[
        // Medications
        ("acetaminophen", &["acitaminohen", "acetominofen", "acetaminofen"]),
        ("ibuprofen", &["ibuprofin", "ibuprophen"]),
        ("aspirin", &["asprin", "aspirine", "asiprin"]),
        ("amoxicillin", &["amoxicilin", "amoxacillin", "amoxycillin"]),
        ("metformin", &["metaformin", "metformine"]),
        ("lisinopril", &["lisinoprill", "lysinopril", "lisnopril"]),
        ("atorvastatin", &["atorvastatine"]),
        ("levothyroxine", &["levothyroxin"]),
        ("omeprazole", &["omeprazol"]),
        ("simvastatin", &["simvastatine"]),
        ("warfarin", &["wofarin", "warfarn", "warferin"]),
        ("hydralazine", &["hydralazin"]),
        ("hydroxyzine", &["hydroxizine"]),
        ("metoprolol", &["metoprol", "metroprolol"]),
        ("amlodipine", &["amlodipin"]),
        ("furosemide", &["furosemid", "frusemide"]),
        ("gabapentin", &["gabapentine", "gabapenten"]),
        ("insulin", &["insuline"]),
        // Symptoms
        ("cough", &["cogh", "coughf"]),
        ("fever", &["fevar", "feaver"]),
        ("headache", &["hedache", "headach"]),
        ("nausea", &["nausia", "naushea"]),
        ("vomiting", &["vomitting"]),
        ("diarrhea", &["diarhea", "diarreah"]),
        ("fatigue", &["fatique", "fatige"]),
        ("dizziness", &["dizzyness", "dizzines"]),
        ("dyspnea", &["dispnea", "dyspnoea"]),
        // Conditions
        ("hypertension", &["hipertension", "hypertention"]),
        ("diabetes", &["diabetis", "diabeties"]),
        ("hyperglycemia", &["hyperglycaemia"]),
        ("hypoglycemia", &["hypoglycaemia"]),
        ("asthma", &["asma", "athsma"]),
        ("pneumonia", &["pnuemonia", "neumonia"]),
        ("bronchitis", &["bronchitus", "bronkitis"]),
        ("sinusitis", &["sinusitus", "synusitis"]),
        ("migraine", &["migrane", "migriane"]),
        ("arthritis", &["arthrites", "arthritus"]),
        ("osteoporosis", &["osteoporoses"]),
        ("depression", &["depresion", "deppression"]),
        // Procedures
        ("echocardiogram", &["ecocardiogram"]),
        ("electrocardiogram", &["electrocardiograph"]),
        ("colonoscopy", &["colonscopy"]),
        ("biopsy", &["byopsy"]),
        // Labs
        ("hemoglobin", &["haemoglobin"]),
        ("cholesterol", &["cholestrol"]),
        ("triglycerides", &["tryglicerides"]),
        ("creatinine", &["creatinin"]),
        ("glucose", &["glucos"]),
        // Anatomy
        ("abdomen", &["abdomin", "abdoman"]),
        ("cervical", &["cervicle"]),
        ("femur", &["femer"]),
        ("clavicle", &["clavical"]),
        ("sternum", &["sternam"]),
    ];

    entries
        .iter()
        .map(|(canonical, misspellings)| {
            (
                canonical.to_string(),
                misspellings.iter().map(|m| m.to_string()).collect(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correct_spelling() {
        let dict = Dictionary::with_defaults();
        assert_eq!(
            dict.lookup("warfarin"),
            DictionaryLookup::Correct {
                canonical: "warfarin".to_string()
            }
        );
        // Case and whitespace insensitive
        assert_eq!(
            dict.lookup("  Warfarin "),
            DictionaryLookup::Correct {
                canonical: "warfarin".to_string()
            }
        );
    }

    #[test]
    fn test_known_misspelling() {
        let dict = Dictionary::with_defaults();
        assert_eq!(
            dict.lookup("wofarin"),
            DictionaryLookup::Misspelled {
                canonical: "warfarin".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_term() {
        let dict = Dictionary::with_defaults();
        assert_eq!(dict.lookup("zzyzzx"), DictionaryLookup::Unknown);
    }

    #[test]
    fn test_skip_words() {
        let dict = Dictionary::with_defaults();
        assert!(dict.should_skip("the"));
        assert!(dict.should_skip("at")); // too short
        assert!(!dict.should_skip("warfarin"));
    }

    #[test]
    fn test_fuzzy_suggestions_include_canonical() {
        let dict = Dictionary::with_defaults();
        let suggestions = dict.fuzzy_suggestions("wofarin", 5);
        assert_eq!(suggestions.first(), Some(&"warfarin".to_string()));
    }

    #[test]
    fn test_fuzzy_suggestions_deterministic() {
        let dict = Dictionary::with_defaults();
        let a = dict.fuzzy_suggestions("metformn", 5);
        let b = dict.fuzzy_suggestions("metformn", 5);
        assert_eq!(a, b);
        assert!(a.contains(&"metformin".to_string()));
    }

    #[test]
    fn test_edit_distance_bounded() {
        assert_eq!(edit_distance_bounded("warfarin", "warfarin", 2), Some(0));
        assert_eq!(edit_distance_bounded("wofarin", "warfarin", 2), Some(2));
        assert_eq!(edit_distance_bounded("kitten", "sitting", 2), None);
        // Length difference alone can exceed the bound
        assert_eq!(edit_distance_bounded("ab", "abcdef", 2), None);
    }

    #[test]
    fn test_similarity_range() {
        assert_eq!(similarity("warfarin", "warfarin"), 1.0);
        assert!(similarity("wofarin", "warfarin") > 0.6);
        assert!(similarity("aspirin", "colonoscopy") < 0.5);
    }
}
