//! Bounded set of already-prefetched image sources.

use std::num::NonZeroUsize;

use lru::LruCache;

pub const DEFAULT_SEEN_CAPACITY: usize = 1000;

/// Remembers at most `capacity` sources. Once full, marking a new source
/// forgets the one inserted earliest; lookups never change that order.
#[derive(Debug)]
pub struct SeenSet {
    entries: LruCache<String, ()>,
}

impl SeenSet {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: LruCache::new(capacity),
        }
    }

    pub fn is_seen(&self, src: &str) -> bool {
        self.entries.contains(src)
    }

    /// Marks `src` as seen. Re-marking a known source keeps its original
    /// insertion position.
    pub fn mark_seen(&mut self, src: &str) {
        if self.entries.contains(src) {
            return;
        }
        self.entries.push(src.to_string(), ());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for SeenSet {
    fn default() -> Self {
        Self::new(NonZeroUsize::new(DEFAULT_SEEN_CAPACITY).unwrap_or(NonZeroUsize::MIN))
    }
}
