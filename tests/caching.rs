//! Cache Persistence Integration Tests
//!
//! Durable cache snapshots, expiry sweeping, and the on-disk home layout
//! across process restarts (modeled as fresh instances over one temp dir).

use serde_json::json;
use tempfile::TempDir;

use medcheck::cache::{CacheKind, CacheSet, CacheSettings};
use medcheck::matchers::DynamicList;

#[test]
fn test_durable_cache_survives_reopen() {
    let temp = TempDir::new().unwrap();

    {
        let caches = CacheSet::durable(temp.path(), CacheSettings::default());
        caches.put(CacheKind::Classification, "losartan", json!({"classification": "correct"}));
    }

    let reopened = CacheSet::durable(temp.path(), CacheSettings::default());
    let entry = reopened
        .get(CacheKind::Classification, "losartan")
        .expect("entry should survive reopen");
    assert_eq!(entry.payload["classification"], "correct");
}

#[test]
fn test_expired_entries_swept_per_kind() {
    let temp = TempDir::new().unwrap();
    let settings = CacheSettings {
        classification_ttl_secs: -1,
        ..CacheSettings::default()
    };

    let caches = CacheSet::durable(temp.path(), settings.clone());
    caches.put(CacheKind::Classification, "losartan", json!("stale"));
    caches.put(CacheKind::Suggestion, "losartan", json!(["warfarin"]));

    assert!(caches.get(CacheKind::Classification, "losartan").is_none());
    assert_eq!(caches.sweep_all(), 1);

    // Expired entries never survive a reopen either
    let reopened = CacheSet::durable(temp.path(), settings);
    assert!(reopened.get(CacheKind::Classification, "losartan").is_none());
    assert!(reopened.get(CacheKind::Suggestion, "losartan").is_some());
}

#[test]
fn test_corrupted_snapshot_degrades_to_empty() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("classification.json"), "{not json").unwrap();

    let caches = CacheSet::durable(temp.path(), CacheSettings::default());
    assert!(caches.get(CacheKind::Classification, "anything").is_none());

    // Still usable for writes after the corruption
    caches.put(CacheKind::Classification, "losartan", json!("correct"));
    assert!(caches.get(CacheKind::Classification, "losartan").is_some());
}

#[test]
fn test_dynamic_list_and_caches_share_home_layout() {
    // A fresh home directory gets the same files the engine expects
    let temp = TempDir::new().unwrap();

    let list = DynamicList::open(temp.path().join("dynamic_terms.json"));
    list.confirm("apixaban").unwrap();

    let caches = CacheSet::durable(&temp.path().join("cache"), CacheSettings::default());
    caches.put(CacheKind::Validator, "apixaban", json!({"valid": true}));

    assert!(temp.path().join("dynamic_terms.json").exists());
    assert!(temp.path().join("cache").join("validator.json").exists());
}
