//! Bounded LRU cache and a caching wrapper for any [`EmbeddingProvider`].
//!
//! Lookups and inserts are O(1) amortized: recency is tracked with a tick
//! counter and a queue of `(key, tick)` pairs whose stale entries are skipped
//! on eviction and compacted once the queue outgrows the live set.

use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use super::{EmbeddingError, EmbeddingProvider};

/// Least-recently-used cache with a fixed capacity.
#[derive(Debug)]
pub struct LruCache<K, V> {
    capacity: usize,
    entries: HashMap<K, (V, u64)>,
    order: VecDeque<(K, u64)>,
    tick: u64,
}

impl<K: Eq + Hash + Clone, V: Clone> LruCache<K, V> {
    /// Create a cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            tick: 0,
        }
    }

    /// Look up a key, marking it most recently used.
    pub fn get(&mut self, key: &K) -> Option<V> {
        self.tick += 1;
        let tick = self.tick;
        let entry = self.entries.get_mut(key)?;
        entry.1 = tick;
        let value = entry.0.clone();
        self.order.push_back((key.clone(), tick));
        self.compact();
        Some(value)
    }

    /// Insert or replace a value, evicting the least recently used entry when full.
    pub fn insert(&mut self, key: K, value: V) {
        self.tick += 1;
        let tick = self.tick;
        let replaced = self.entries.insert(key.clone(), (value, tick)).is_some();
        if !replaced && self.entries.len() > self.capacity {
            self.evict_one(&key);
        }
        self.order.push_back((key, tick));
        self.compact();
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    fn evict_one(&mut self, keep: &K) {
        while let Some((key, tick)) = self.order.pop_front() {
            if &key == keep {
                continue;
            }
            let live = self.entries.get(&key).is_some_and(|(_, t)| *t == tick);
            if live {
                self.entries.remove(&key);
                return;
            }
        }
    }

    fn compact(&mut self) {
        if self.order.len() <= self.capacity * 4 + 16 {
            return;
        }
        let entries = &self.entries;
        self.order
            .retain(|(key, tick)| entries.get(key).is_some_and(|(_, t)| t == tick));
    }
}

/// Hit/miss counters reported by `get_memory_stats`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
    pub capacity: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct CacheState {
    cache: LruCache<String, Vec<f32>>,
    hits: u64,
    misses: u64,
}

/// Wraps a provider with an exact-text LRU cache.
pub struct CachedEmbeddingProvider {
    inner: Arc<dyn EmbeddingProvider>,
    state: Mutex<CacheState>,
}

impl CachedEmbeddingProvider {
    pub fn new(inner: Arc<dyn EmbeddingProvider>, capacity: usize) -> Self {
        Self {
            inner,
            state: Mutex::new(CacheState {
                cache: LruCache::new(capacity),
                hits: 0,
                misses: 0,
            }),
        }
    }

    pub fn stats(&self) -> CacheStats {
        match self.state.lock() {
            Ok(state) => CacheStats {
                hits: state.hits,
                misses: state.misses,
                size: state.cache.len(),
                capacity: state.cache.capacity(),
            },
            Err(_) => CacheStats::default(),
        }
    }

    fn lookup(&self, text: &str) -> Option<Vec<f32>> {
        let mut state = self.state.lock().ok()?;
        let found = state.cache.get(&text.to_string());
        if found.is_some() {
            state.hits += 1;
        } else {
            state.misses += 1;
        }
        found
    }

    fn store(&self, text: &str, embedding: &[f32]) {
        if let Ok(mut state) = self.state.lock() {
            state.cache.insert(text.to_string(), embedding.to_vec());
        }
    }
}

impl EmbeddingProvider for CachedEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if let Some(hit) = self.lookup(text) {
            return Ok(hit);
        }
        let embedding = self.inner.embed(text)?;
        self.store(text, &embedding);
        Ok(embedding)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut results: Vec<Option<Vec<f32>>> = texts.iter().map(|t| self.lookup(t)).collect();
        let missing: Vec<&str> = texts
            .iter()
            .zip(&results)
            .filter(|(_, r)| r.is_none())
            .map(|(t, _)| *t)
            .collect();

        if !missing.is_empty() {
            let fresh = self.inner.embed_batch(&missing)?;
            let mut fresh = fresh.into_iter();
            for (text, slot) in texts.iter().zip(results.iter_mut()) {
                if slot.is_none() {
                    let embedding = fresh.next().ok_or_else(|| {
                        EmbeddingError::Output("batch returned fewer vectors than inputs".into())
                    })?;
                    self.store(text, &embedding);
                    *slot = Some(embedding);
                }
            }
        }

        Ok(results.into_iter().flatten().collect())
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
    }

    impl EmbeddingProvider for CountingProvider {
        fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![text.len() as f32, 1.0])
        }
    }

    #[test]
    fn lru_evicts_least_recently_used() {
        let mut cache = LruCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert_eq!(cache.get(&"a"), Some(1)); // a is now most recent
        cache.insert("c", 3);

        assert!(cache.contains(&"a"));
        assert!(!cache.contains(&"b"));
        assert!(cache.contains(&"c"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn lru_replace_does_not_evict() {
        let mut cache = LruCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("a", 10);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"a"), Some(10));
        assert_eq!(cache.get(&"b"), Some(2));
    }

    #[test]
    fn lru_stays_bounded_under_churn() {
        let mut cache = LruCache::new(8);
        for i in 0..1000 {
            cache.insert(i % 13, i);
            let _ = cache.get(&(i % 5));
        }
        assert!(cache.len() <= 8);
        assert!(cache.order.len() <= 8 * 4 + 16 + 1);
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let mut cache = LruCache::new(0);
        cache.insert(1, "x");
        cache.insert(2, "y");
        assert_eq!(cache.capacity(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&2));
    }

    #[test]
    fn cached_provider_counts_hits_and_misses() {
        let inner = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
        });
        let cached = CachedEmbeddingProvider::new(inner.clone(), 10);

        cached.embed("hello").unwrap();
        cached.embed("hello").unwrap();
        cached.embed("world").unwrap();

        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        let stats = cached.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.size, 2);
        assert!((stats.hit_rate() - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn cached_batch_only_embeds_missing_texts() {
        let inner = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
        });
        let cached = CachedEmbeddingProvider::new(inner.clone(), 10);
        cached.embed("ab").unwrap();

        let batch = cached.embed_batch(&["ab", "abcd", "ab"]).unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch[1][0], 4.0);
        // "ab" once up front, "abcd" once in the batch
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }
}
