use crate::base::ParamKey;
use lru::LruCache;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, RwLock,
};

/// Counter is a bounded LRU map from a parameter value to an atomic cell.
/// Adding a value to a full counter evicts the least recently used one.
#[derive(Debug)]
pub struct Counter {
    cache: RwLock<LruCache<ParamKey, Arc<AtomicU64>>>,
}

impl Counter {
    pub fn with_capacity(cap: usize) -> Counter {
        Counter {
            cache: RwLock::new(LruCache::new(cap)),
        }
    }

    pub fn cap(&self) -> usize {
        self.cache.read().unwrap().cap()
    }

    pub fn is_full(&self) -> bool {
        let cache = self.cache.read().unwrap();
        cache.len() >= cache.cap()
    }

    /// `add` sets the value of the key and marks the key as recently used.
    pub fn add(&self, key: ParamKey, value: u64) {
        let mut cache = self.cache.write().unwrap();
        match cache.get(&key) {
            Some(cell) => cell.store(value, Ordering::SeqCst),
            None => {
                cache.put(key, Arc::new(AtomicU64::new(value)));
            }
        }
    }

    /// `add_if_absent` inserts the value and returns `None` if the key is absent,
    /// otherwise it returns the existing cell untouched.
    pub fn add_if_absent(&self, key: ParamKey, value: u64) -> Option<Arc<AtomicU64>> {
        let mut cache = self.cache.write().unwrap();
        if let Some(cell) = cache.get(&key) {
            return Some(Arc::clone(cell));
        }
        cache.put(key, Arc::new(AtomicU64::new(value)));
        None
    }

    /// the cell of the key, inserted with `value` if absent
    pub fn get_or_insert(&self, key: ParamKey, value: u64) -> Arc<AtomicU64> {
        let mut cache = self.cache.write().unwrap();
        if let Some(cell) = cache.get(&key) {
            return Arc::clone(cell);
        }
        let cell = Arc::new(AtomicU64::new(value));
        cache.put(key, Arc::clone(&cell));
        cell
    }

    /// `get` returns the cell of the key and marks the key as recently used.
    pub fn get(&self, key: &ParamKey) -> Option<Arc<AtomicU64>> {
        self.cache.write().unwrap().get(key).map(Arc::clone)
    }

    /// returns true if the key was contained
    pub fn remove(&self, key: &ParamKey) -> bool {
        self.cache.write().unwrap().pop(key).is_some()
    }

    /// `contains` does not update the recent-ness of the key.
    pub fn contains(&self, key: &ParamKey) -> bool {
        self.cache.read().unwrap().contains(key)
    }

    /// the least recently used key and its current value
    pub fn peek_lru(&self) -> Option<(ParamKey, u64)> {
        self.cache
            .read()
            .unwrap()
            .peek_lru()
            .map(|(k, v)| (k.clone(), v.load(Ordering::SeqCst)))
    }

    /// the keys from the oldest to the newest
    pub fn keys(&self) -> Vec<ParamKey> {
        let cache = self.cache.read().unwrap();
        cache.iter().rev().map(|(k, _)| k.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.cache.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn purge(&self) {
        self.cache.write().unwrap().clear()
    }
}

impl Default for Counter {
    fn default() -> Counter {
        Counter::with_capacity(0)
    }
}
