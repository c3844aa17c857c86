//! TTL cache of ranked search results

use crate::fusion::RankedResult;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;
use wayfinder_core::config::CacheConfig;
use wayfinder_core::{normalize_name, Clock};

/// Cache key: normalized query, intent and region
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CacheKey {
    pub query: String,
    pub intent: String,
    pub region: String,
}

impl CacheKey {
    pub fn new(query: &str, intent: &str, region: Option<&str>) -> Self {
        Self {
            query: normalize_name(query),
            intent: intent.to_string(),
            region: region.map(normalize_name).unwrap_or_default(),
        }
    }
}

/// What a search stores on a miss
#[derive(Debug, Clone)]
pub struct CachePayload {
    pub results: Vec<RankedResult>,
    pub narrative: String,
    pub confidence: f64,
    /// Weighted share of sources that produced candidates
    pub coverage: f64,
    pub strategy: String,
}

/// Immutable cached search; replaced, never updated
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub results: Vec<RankedResult>,
    pub narrative: String,
    /// Confidence of the search that wrote the entry
    pub confidence: f64,
    pub coverage: f64,
    pub strategy: String,
    pub created_at_ms: u64,
    pub expires_at_ms: u64,
}

impl CacheEntry {
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms > self.expires_at_ms
    }
}

/// Sharded result cache with write-time TTL and oldest-first eviction
pub struct ResultCache {
    entries: DashMap<CacheKey, Arc<CacheEntry>>,
    clock: Arc<dyn Clock>,
    default_ttl_ms: u64,
    intent_ttl_ms: HashMap<String, u64>,
    capacity: usize,
    // Serializes eviction with insertion so capacity holds under concurrent writers
    write_lock: Mutex<()>,
}

impl ResultCache {
    pub fn new(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
            default_ttl_ms: config.ttl_secs.saturating_mul(1000),
            intent_ttl_ms: config
                .intent_ttl_secs
                .iter()
                .map(|(intent, secs)| (intent.clone(), secs.saturating_mul(1000)))
                .collect(),
            capacity: config.capacity.max(1),
            write_lock: Mutex::new(()),
        }
    }

    fn ttl_ms_for(&self, intent: &str) -> u64 {
        self.intent_ttl_ms
            .get(intent)
            .copied()
            .unwrap_or(self.default_ttl_ms)
    }

    /// Entry for `key` unless absent or expired
    pub fn get(&self, key: &CacheKey) -> Option<Arc<CacheEntry>> {
        let now = self.clock.now_ms();
        let entry = self.entries.get(key).map(|e| Arc::clone(e.value()))?;
        if entry.is_expired(now) {
            self.entries.remove_if(key, |_, e| e.is_expired(now));
            debug!(query = %key.query, intent = %key.intent, "Cache entry expired");
            return None;
        }
        Some(entry)
    }

    /// Store a payload, evicting the oldest entry when full
    pub fn set(&self, key: CacheKey, payload: CachePayload) -> Arc<CacheEntry> {
        let now = self.clock.now_ms();
        let entry = Arc::new(CacheEntry {
            expires_at_ms: now.saturating_add(self.ttl_ms_for(&key.intent)),
            created_at_ms: now,
            key: key.clone(),
            results: payload.results,
            narrative: payload.narrative,
            confidence: payload.confidence,
            coverage: payload.coverage,
            strategy: payload.strategy,
        });

        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.entries.retain(|_, e| !e.is_expired(now));
            while self.entries.len() >= self.capacity {
                let oldest = self
                    .entries
                    .iter()
                    .min_by(|a, b| {
                        a.value()
                            .created_at_ms
                            .cmp(&b.value().created_at_ms)
                            .then_with(|| a.key().query.cmp(&b.key().query))
                    })
                    .map(|e| e.key().clone());
                match oldest {
                    Some(oldest) => {
                        debug!(query = %oldest.query, "Evicting oldest cache entry");
                        self.entries.remove(&oldest);
                    }
                    None => break,
                }
            }
        }
        self.entries.insert(key, Arc::clone(&entry));
        entry
    }

    /// Drop expired entries, returning how many were removed
    pub fn cleanup(&self) -> usize {
        let now = self.clock.now_ms();
        let before = self.entries.len();
        self.entries.retain(|_, e| !e.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfinder_core::ManualClock;

    fn payload(narrative: &str) -> CachePayload {
        CachePayload {
            results: Vec::new(),
            narrative: narrative.to_string(),
            confidence: 0.8,
            coverage: 1.0,
            strategy: "coastal".to_string(),
        }
    }

    fn cache(capacity: usize, clock: Arc<ManualClock>) -> ResultCache {
        let mut config = CacheConfig {
            ttl_secs: 10,
            capacity,
            ..Default::default()
        };
        config.intent_ttl_secs.insert("foodie".to_string(), 2);
        ResultCache::new(&config, clock)
    }

    #[test]
    fn test_get_after_set_until_expiry() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = cache(10, clock.clone());
        let key = CacheKey::new("Beach Towns", "coastal", Some("Algarve"));
        cache.set(key.clone(), payload("first"));

        clock.set(10_000);
        let hit = cache.get(&CacheKey::new("  beach   towns", "coastal", Some("algarve")));
        assert_eq!(hit.map(|e| e.narrative.clone()), Some("first".to_string()));

        clock.set(10_001);
        assert!(cache.get(&key).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_intent_ttl_override() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = cache(10, clock.clone());
        let key = CacheKey::new("tapas", "foodie", None);
        let entry = cache.set(key.clone(), payload("food"));
        assert_eq!(entry.expires_at_ms, 2_000);
        clock.set(2_001);
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn test_key_distinguishes_intent_and_region() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = cache(10, clock);
        cache.set(CacheKey::new("q", "coastal", None), payload("a"));
        assert!(cache.get(&CacheKey::new("q", "foodie", None)).is_none());
        assert!(cache.get(&CacheKey::new("q", "coastal", Some("Norte"))).is_none());
    }

    #[test]
    fn test_replace_on_write() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = cache(10, clock.clone());
        let key = CacheKey::new("q", "coastal", None);
        let first = cache.set(key.clone(), payload("old"));
        clock.advance(5);
        cache.set(key.clone(), payload("new"));
        assert_eq!(first.narrative, "old");
        assert_eq!(cache.get(&key).map(|e| e.narrative.clone()).as_deref(), Some("new"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = cache(2, clock.clone());
        cache.set(CacheKey::new("a", "coastal", None), payload("a"));
        clock.advance(1);
        cache.set(CacheKey::new("b", "coastal", None), payload("b"));
        clock.advance(1);
        cache.set(CacheKey::new("c", "coastal", None), payload("c"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&CacheKey::new("a", "coastal", None)).is_none());
        assert!(cache.get(&CacheKey::new("b", "coastal", None)).is_some());
        assert!(cache.get(&CacheKey::new("c", "coastal", None)).is_some());
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = cache(10, clock.clone());
        cache.set(CacheKey::new("short", "foodie", None), payload("x"));
        cache.set(CacheKey::new("long", "coastal", None), payload("y"));
        clock.set(5_000);

        assert_eq!(cache.cleanup(), 1);
        assert_eq!(cache.cleanup(), 0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_concurrent_reads_writes_and_cleanup() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = Arc::new(cache(16, clock.clone()));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let key = CacheKey::new(&format!("q{}", (t * 50 + i) % 40), "coastal", None);
                        cache.set(key.clone(), payload("p"));
                        let _ = cache.get(&key);
                        cache.cleanup();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(cache.len() <= 16);
    }
}
