//! Bounded LRU over extracted object bytes.

use std::num::NonZeroUsize;
use std::sync::Arc;

use grit_hash::ObjectId;
use grit_object::ObjectKind;
use lru::LruCache;

/// LRU cache of extracted objects. Entries share their bytes via `Arc`, so
/// a hit never copies the content.
pub(crate) struct BytesCache {
    cache: LruCache<ObjectId, (ObjectKind, Arc<[u8]>)>,
}

impl BytesCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap()),
            ),
        }
    }

    /// Get a cached object, promoting it to most-recently-used.
    pub(crate) fn get(&mut self, id: &ObjectId) -> Option<(ObjectKind, Arc<[u8]>)> {
        self.cache
            .get(id)
            .map(|(kind, data)| (*kind, Arc::clone(data)))
    }

    pub(crate) fn insert(&mut self, id: ObjectId, kind: ObjectKind, data: Arc<[u8]>) {
        self.cache.push(id, (kind, data));
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.cache.len()
    }
}
