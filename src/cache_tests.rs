//! Tests for the dual-tier suggestion cache

use super::*;
use crate::analysis::{ReadabilityMetrics, Severity, Suggestion, SuggestionKind, TextRange};
use crate::clock::{ManualClock, millis};
use crate::store::{DeletePredicate, MemoryStore, StorageError};
use async_trait::async_trait;

fn result_with(id: &str) -> AnalysisResult {
    AnalysisResult {
        grammar_suggestions: vec![Suggestion {
            id: id.to_string(),
            kind: SuggestionKind::Grammar,
            severity: Severity::High,
            original_text: "goes".to_string(),
            suggested_text: "go".to_string(),
            range: TextRange::new(13, 17),
            explanation: "Subject-verb agreement".to_string(),
            category: "agreement".to_string(),
            confidence: 0.9,
        }],
        readability_metrics: ReadabilityMetrics {
            flesch_reading_ease: 70.0,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn setup() -> (SuggestionCache, Arc<MemoryStore>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::at_epoch());
    let store = Arc::new(MemoryStore::new(clock.clone()));
    let cache = SuggestionCache::new(&CacheConfig::default(), store.clone(), clock.clone());
    (cache, store, clock)
}

/// Store whose every operation fails
struct BrokenStore;

#[async_trait]
impl DurableStore for BrokenStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable("offline".to_string()))
    }

    async fn set(
        &self,
        _key: &str,
        _value: String,
        _ttl: Option<TimeDelta>,
    ) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("offline".to_string()))
    }

    async fn delete_where(
        &self,
        _prefix: &str,
        _predicate: DeletePredicate<'_>,
    ) -> Result<usize, StorageError> {
        Err(StorageError::Unavailable("offline".to_string()))
    }
}

#[tokio::test]
async fn test_miss_on_empty_cache() {
    let (cache, _, _) = setup();

    assert!(cache.get("analysis:nothing").await.is_none());
}

#[tokio::test]
async fn test_set_then_get_from_memory() {
    let (cache, _, _) = setup();
    let result = result_with("g1");

    cache.set("analysis:a", &result, 24).await;

    assert_eq!(cache.get("analysis:a").await, Some(result));
    assert_eq!(cache.memory_len(), 1);
}

#[tokio::test]
async fn test_hit_just_before_ttl_and_miss_just_after() {
    let (cache, _, clock) = setup();
    let result = result_with("g1");
    let ttl = seconds(3600);

    cache.set("analysis:a", &result, 1).await;

    clock.advance(ttl - millis(1));
    assert_eq!(cache.get("analysis:a").await, Some(result));

    clock.advance(millis(2));
    assert!(cache.get("analysis:a").await.is_none());
}

#[tokio::test]
async fn test_durable_hit_repopulates_memory() {
    let (cache, _, _) = setup();
    let result = result_with("g1");

    cache.set("analysis:a", &result, 24).await;
    cache.clear_memory();
    assert_eq!(cache.memory_len(), 0);

    assert_eq!(cache.get("analysis:a").await, Some(result));
    assert_eq!(cache.memory_len(), 1);
}

#[tokio::test]
async fn test_memory_tier_expires_before_durable_tier() {
    let (cache, store, clock) = setup();
    let result = result_with("g1");
    cache.set("analysis:a", &result, 24).await;

    // Overwrite the durable copy behind the cache's back
    let replacement = CacheEntry::new(result_with("g2"), clock.now(), seconds(24 * 3600));
    store
        .set(
            "analysis:a",
            serde_json::to_string(&replacement).unwrap(),
            None,
        )
        .await
        .unwrap();

    assert_eq!(cache.get("analysis:a").await, Some(result));

    clock.advance(seconds(601));
    let refreshed = cache.get("analysis:a").await.unwrap();
    assert_eq!(refreshed.grammar_suggestions[0].id, "g2");
}

#[tokio::test]
async fn test_newer_durable_entry_is_not_clobbered() {
    let (cache, store, clock) = setup();

    let newer = CacheEntry::new(
        result_with("newer"),
        clock.now() + seconds(30),
        seconds(3600),
    );
    store
        .set("analysis:a", serde_json::to_string(&newer).unwrap(), None)
        .await
        .unwrap();

    cache.set("analysis:a", &result_with("older"), 1).await;
    cache.clear_memory();

    let stored = cache.get("analysis:a").await.unwrap();
    assert_eq!(stored.grammar_suggestions[0].id, "newer");
}

#[tokio::test]
async fn test_expired_entry_is_overwritten() {
    let (cache, _, clock) = setup();

    cache.set("analysis:a", &result_with("first"), 1).await;
    clock.advance(seconds(7200));
    cache.set("analysis:a", &result_with("second"), 1).await;

    let stored = cache.get("analysis:a").await.unwrap();
    assert_eq!(stored.grammar_suggestions[0].id, "second");
}

#[tokio::test]
async fn test_purge_expired_removes_only_stale_entries() {
    let (cache, store, clock) = setup();

    cache.set("analysis:old", &result_with("old"), 1).await;
    clock.advance(seconds(2 * 3600));
    cache.set("analysis:new", &result_with("new"), 1).await;
    store
        .set("quota:someone", "{}".to_string(), None)
        .await
        .unwrap();

    assert_eq!(cache.purge_expired().await, 1);
    assert_eq!(store.len(), 2);
    assert!(cache.get("analysis:new").await.is_some());
}

#[tokio::test]
async fn test_undecodable_durable_entry_is_a_miss() {
    let (cache, store, _) = setup();
    store
        .set("analysis:bad", "not json".to_string(), None)
        .await
        .unwrap();

    assert!(cache.get("analysis:bad").await.is_none());
}

#[tokio::test]
async fn test_store_failures_are_swallowed() {
    let clock = Arc::new(ManualClock::at_epoch());
    let cache = SuggestionCache::new(&CacheConfig::default(), Arc::new(BrokenStore), clock);
    let result = result_with("g1");

    assert!(cache.get("analysis:a").await.is_none());

    // Write fails in the durable tier but still lands in memory
    cache.set("analysis:a", &result, 24).await;
    assert_eq!(cache.get("analysis:a").await, Some(result));
    assert_eq!(cache.purge_expired().await, 0);
}

#[tokio::test]
async fn test_lru_capacity_is_bounded() {
    let clock = Arc::new(ManualClock::at_epoch());
    let store = Arc::new(MemoryStore::new(clock.clone()));
    let config = CacheConfig {
        memory_capacity: 2,
        ..Default::default()
    };
    let cache = SuggestionCache::new(&config, store, clock);

    for key in ["analysis:a", "analysis:b", "analysis:c"] {
        cache.set(key, &result_with(key), 24).await;
    }

    assert_eq!(cache.memory_len(), 2);
    // Evicted from memory, still served from the durable tier
    assert!(cache.get("analysis:a").await.is_some());
}

#[test]
fn test_entry_expiry_boundary() {
    let now = ManualClock::at_epoch().now();
    let entry = CacheEntry::new(AnalysisResult::default(), now, seconds(60));

    assert!(!entry.is_expired(now + seconds(60)));
    assert!(entry.is_expired(now + seconds(60) + millis(1)));
}
