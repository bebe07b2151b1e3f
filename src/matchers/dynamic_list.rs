//! Self-growing list of user-confirmed terms.
//!
//! A term lands here only through an explicit confirmation action; nothing
//! is added automatically. Any hit fails open to `Correct` without
//! consulting the validator, so the list acts as a primary filter in front
//! of the network.
//!
//! Persistence is a single JSON file under the engine home. A corrupted
//! file is discarded and the list starts fresh.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::normalize_term;

#[derive(Debug, Error)]
pub enum DynamicListError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// On-disk shape of the list
#[derive(Debug, Serialize, Deserialize)]
struct ListFile {
    terms: Vec<String>,
    last_updated: DateTime<Utc>,
}

/// User-confirmed term list with optional durability
pub struct DynamicList {
    /// Normalized confirmed terms
    terms: RwLock<HashSet<String>>,

    /// Backing file; `None` means memory-only (tests)
    path: Option<PathBuf>,
}

impl DynamicList {
    /// Memory-only list, nothing persisted
    pub fn in_memory() -> Self {
        Self {
            terms: RwLock::new(HashSet::new()),
            path: None,
        }
    }

    /// Open (or create) a durable list backed by `path`
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let terms = match Self::load_file(&path) {
            Some(terms) => terms,
            None => {
                if path.exists() {
                    tracing::warn!(
                        "Discarding unreadable dynamic term list: {}",
                        path.display()
                    );
                }
                HashSet::new()
            }
        };

        Self {
            terms: RwLock::new(terms),
            path: Some(path),
        }
    }

    fn load_file(path: &Path) -> Option<HashSet<String>> {
        let content = std::fs::read_to_string(path).ok()?;
        let file: ListFile = serde_json::from_str(&content).ok()?;
        Some(file.terms.into_iter().map(|t| normalize_term(&t)).collect())
    }

    fn persist(&self) -> Result<(), DynamicListError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let mut terms: Vec<String> = {
            let guard = self.terms.read().expect("dynamic list lock poisoned");
            guard.iter().cloned().collect()
        };
        terms.sort();

        let file = ListFile {
            terms,
            last_updated: Utc::now(),
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }

    /// Whether the normalized term has been confirmed
    pub fn contains(&self, term: &str) -> bool {
        let normalized = normalize_term(term);
        if normalized.is_empty() {
            return false;
        }
        let guard = self.terms.read().expect("dynamic list lock poisoned");
        guard.contains(&normalized)
    }

    /// Confirm a term, persisting the list. Returns whether it was new.
    /// Empty input is ignored.
    pub fn confirm(&self, term: &str) -> Result<bool, DynamicListError> {
        let normalized = normalize_term(term);
        if normalized.is_empty() {
            return Ok(false);
        }

        let added = {
            let mut guard = self.terms.write().expect("dynamic list lock poisoned");
            guard.insert(normalized.clone())
        };

        if added {
            self.persist()?;
            tracing::info!("Confirmed term added to dynamic list: {}", normalized);
        }
        Ok(added)
    }

    /// All confirmed terms, sorted
    pub fn terms(&self) -> Vec<String> {
        let guard = self.terms.read().expect("dynamic list lock poisoned");
        let mut terms: Vec<String> = guard.iter().cloned().collect();
        terms.sort();
        terms
    }

    pub fn len(&self) -> usize {
        let guard = self.terms.read().expect("dynamic list lock poisoned");
        guard.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_confirm_and_contains() {
        let list = DynamicList::in_memory();
        assert!(!list.contains("ozempic"));

        assert!(list.confirm("Ozempic").unwrap());
        assert!(list.contains("ozempic"));
        assert!(list.contains("  OZEMPIC "));

        // Second confirm is a no-op
        assert!(!list.confirm("ozempic").unwrap());
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_empty_term_ignored() {
        let list = DynamicList::in_memory();
        assert!(!list.confirm("   ").unwrap());
        assert!(list.is_empty());
    }

    #[test]
    fn test_durable_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("dynamic_terms.json");

        {
            let list = DynamicList::open(&path);
            list.confirm("jardiance").unwrap();
            list.confirm("ozempic").unwrap();
        }

        let reopened = DynamicList::open(&path);
        assert!(reopened.contains("jardiance"));
        assert!(reopened.contains("ozempic"));
        assert_eq!(reopened.terms(), vec!["jardiance", "ozempic"]);
    }

    #[test]
    fn test_corrupted_file_starts_fresh() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("dynamic_terms.json");
        std::fs::write(&path, "not json at all").unwrap();

        let list = DynamicList::open(&path);
        assert!(list.is_empty());

        // And it is writable again afterwards
        list.confirm("ozempic").unwrap();
        let reopened = DynamicList::open(&path);
        assert!(reopened.contains("ozempic"));
    }
}
