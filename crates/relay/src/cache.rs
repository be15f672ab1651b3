//! Fixed-capacity map with strict insertion-order eviction.
//!
//! Unlike an LRU, reads never reorder entries: the oldest *inserted* key is
//! always the next one evicted. Overwriting a key counts as a fresh insertion
//! and moves it to the newest position.

use std::{
    collections::{HashMap, VecDeque},
    hash::Hash,
};

pub struct FifoCache<K, V> {
    capacity: usize,
    entries: HashMap<K, V>,
    /// Keys from oldest to newest insertion.
    order: VecDeque<K>,
}

impl<K, V> FifoCache<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    /// Insert or overwrite `key`, returning the entry evicted to make room.
    ///
    /// A zero-capacity cache retains nothing and hands the pair straight back.
    pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        if self.capacity == 0 {
            return Some((key, value));
        }

        if self.entries.contains_key(&key) {
            self.unlink(&key);
            self.order.push_back(key.clone());
            self.entries.insert(key, value);
            return None;
        }

        let evicted = if self.entries.len() >= self.capacity {
            self.order
                .pop_front()
                .and_then(|oldest| self.entries.remove(&oldest).map(|v| (oldest, v)))
        } else {
            None
        };

        self.order.push_back(key.clone());
        self.entries.insert(key, value);
        evicted
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let value = self.entries.remove(key)?;
        self.unlink(key);
        Some(value)
    }

    /// Keys from oldest to newest.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.order.iter()
    }

    fn unlink(&mut self, key: &K) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
    }
}
