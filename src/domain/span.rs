//! Term span and suggestion data types.
//!
//! These types are the unit of exchange between the resolver, the
//! reconciler, and callers. All offsets are UTF-8 byte indices into the
//! text snapshot the resolver was given.

use serde::{Deserialize, Serialize};

/// Classification of a term span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Not yet validated (validator unavailable, timed out, or skipped)
    Unvalidated,
    /// Confirmed correct by a source matcher
    Correct,
    /// Known or suspected misspelling
    Misspelled,
    /// Name is confusable with another drug, regardless of spelling
    DrugConfusable,
    /// User accepted or ignored a correction; terminal until re-resolution
    UserCorrected,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Unvalidated => "unvalidated",
            Classification::Correct => "correct",
            Classification::Misspelled => "misspelled",
            Classification::DrugConfusable => "drug_confusable",
            Classification::UserCorrected => "user_corrected",
        }
    }
}

/// Which matcher produced a span's classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    Dictionary,
    DynamicList,
    Validator,
    DrugConfusion,
}

/// Origin of a correction suggestion.
///
/// Always carried explicitly on the suggestion; callers must never infer
/// the origin from the suggestion's shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionSource {
    /// Fuzzy match against the local dictionary (highest priority)
    DictionaryFuzzy,
    /// External terminology validator
    Validator,
    /// Confusable-drug alternative
    DrugConfusion,
    /// Curated knowledge-base entry
    KnowledgeBase,
}

impl SuggestionSource {
    /// Merge priority (lower sorts first)
    pub fn priority(&self) -> u8 {
        match self {
            SuggestionSource::DictionaryFuzzy => 0,
            SuggestionSource::Validator => 1,
            SuggestionSource::DrugConfusion => 2,
            SuggestionSource::KnowledgeBase => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionSource::DictionaryFuzzy => "dictionary",
            SuggestionSource::Validator => "validator",
            SuggestionSource::DrugConfusion => "drug_confusion",
            SuggestionSource::KnowledgeBase => "knowledge_base",
        }
    }
}

/// A ranked correction suggestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    /// The suggested replacement text
    pub value: String,

    /// Where the suggestion came from
    pub source: SuggestionSource,

    /// Position in the final merged ordering (0-based)
    pub rank: usize,
}

impl Suggestion {
    pub fn new(value: impl Into<String>, source: SuggestionSource) -> Self {
        Self {
            value: value.into(),
            source,
            rank: 0,
        }
    }
}

/// A contiguous text range carrying a term classification and suggestions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermSpan {
    /// Start byte offset (inclusive)
    pub start: usize,

    /// End byte offset (exclusive); always > start
    pub end: usize,

    /// The text as it appears in the snapshot
    pub surface_text: String,

    /// Current classification
    pub classification: Classification,

    /// Ranked correction suggestions
    #[serde(default)]
    pub suggestions: Vec<Suggestion>,

    /// Matcher that produced the classification (absent while unvalidated)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<MatchSource>,

    /// Confidence in the classification, 0.0..=1.0
    pub confidence: f64,
}

impl TermSpan {
    /// Create an unvalidated span over `[start, end)`
    pub fn unvalidated(start: usize, end: usize, surface_text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            surface_text: surface_text.into(),
            classification: Classification::Unvalidated,
            suggestions: Vec::new(),
            source: None,
            confidence: 0.0,
        }
    }

    /// Whether the span is terminal (untouchable by matchers)
    pub fn is_user_corrected(&self) -> bool {
        self.classification == Classification::UserCorrected
    }

    /// Byte length of the span
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Whether `[self.start, self.end)` overlaps `[start, end)`
    pub fn overlaps(&self, start: usize, end: usize) -> bool {
        self.start < end && start < self.end
    }
}

/// Normalized term text used for cache and lookup keys: trimmed, lowercased
pub fn normalize_term(term: &str) -> String {
    term.trim().to_lowercase()
}

/// Check the resolver's ordering invariant: ascending starts, no overlap
pub fn spans_are_ordered(spans: &[TermSpan]) -> bool {
    spans.windows(2).all(|w| w[0].end <= w[1].start) && spans.iter().all(|s| s.end > s.start)
}
