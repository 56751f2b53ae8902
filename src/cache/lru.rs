//! LRU Tracker Module
//!
//! Tracks fingerprint access order so capacity pressure evicts the coldest idle query.

use std::collections::VecDeque;

use crate::cache::Fingerprint;

// == LRU Tracker ==
/// Tracks access order of fingerprints.
///
/// Keys are stored in a VecDeque where:
/// - Front = Most recently used
/// - Back = Least recently used
#[derive(Debug, Default)]
pub struct LruTracker {
    order: VecDeque<Fingerprint>,
}

impl LruTracker {
    pub fn new() -> Self {
        Self {
            order: VecDeque::new(),
        }
    }

    // == Touch ==
    /// Marks a key as recently used (moves to front).
    pub fn touch(&mut self, key: &Fingerprint) {
        self.remove(key);
        self.order.push_front(key.clone());
    }

    // == Remove ==
    pub fn remove(&mut self, key: &Fingerprint) {
        self.order.retain(|k| k != key);
    }

    // == Evict Oldest Matching ==
    /// Removes and returns the least recently used key accepted by `evictable`.
    ///
    /// Keys rejected by the predicate keep their position.
    pub fn evict_oldest_where<F>(&mut self, mut evictable: F) -> Option<Fingerprint>
    where
        F: FnMut(&Fingerprint) -> bool,
    {
        let index = self.order.iter().rposition(|key| evictable(key))?;
        self.order.remove(index)
    }

    /// Returns the least recently used key without removing it.
    #[cfg(test)]
    pub(crate) fn peek_oldest(&self) -> Option<&Fingerprint> {
        self.order.back()
    }

    pub fn clear(&mut self) {
        self.order.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, key: &Fingerprint) -> bool {
        self.order.iter().any(|k| k == key)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn fp(key: &str) -> Fingerprint {
        Fingerprint::from_raw(key)
    }

    #[test]
    fn test_touch_orders_by_recency() {
        let mut lru = LruTracker::new();
        lru.touch(&fp("a"));
        lru.touch(&fp("b"));
        lru.touch(&fp("c"));
        lru.touch(&fp("a"));

        assert_eq!(lru.len(), 3);
        assert_eq!(lru.peek_oldest(), Some(&fp("b")));
    }

    #[test]
    fn test_evict_skips_rejected_keys() {
        let mut lru = LruTracker::new();
        lru.touch(&fp("pinned"));
        lru.touch(&fp("idle"));
        lru.touch(&fp("recent"));

        let evicted = lru.evict_oldest_where(|key| key.as_str() != "pinned");
        assert_eq!(evicted, Some(fp("idle")));
        assert!(lru.contains(&fp("pinned")));
        assert_eq!(lru.peek_oldest(), Some(&fp("pinned")));
    }

    #[test]
    fn test_evict_none_when_all_rejected() {
        let mut lru = LruTracker::new();
        lru.touch(&fp("a"));
        assert_eq!(lru.evict_oldest_where(|_| false), None);
        assert_eq!(lru.len(), 1);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut lru = LruTracker::new();
        lru.touch(&fp("a"));
        lru.touch(&fp("b"));
        lru.remove(&fp("a"));
        lru.remove(&fp("missing"));
        assert!(!lru.contains(&fp("a")));
        assert_eq!(lru.len(), 1);

        lru.clear();
        assert!(lru.is_empty());
    }
}
