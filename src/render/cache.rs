//! LRU cache of decoded page bitmaps
//!
//! Entries are always un-transformed originals; night mode is applied on
//! the way out, so toggling it never evicts anything.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use super::Bitmap;

/// Cache key for a decoded page
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub page: usize,
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
}

impl CacheKey {
    #[must_use]
    pub const fn new(page: usize, size: (u32, u32)) -> Self {
        Self {
            page,
            width: size.0,
            height: size.1,
        }
    }
}

pub struct PageCache {
    cache: LruCache<CacheKey, Arc<Bitmap>>,
}

impl PageCache {
    /// Default number of bitmaps kept per document.
    pub const DEFAULT_CAPACITY: usize = 12;

    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    /// Get a cached bitmap, promoting it in the LRU order
    #[must_use]
    pub fn get(&mut self, key: &CacheKey) -> Option<Arc<Bitmap>> {
        self.cache.get(key).cloned()
    }

    pub fn insert(&mut self, key: CacheKey, bitmap: Bitmap) -> Arc<Bitmap> {
        let arc = Arc::new(bitmap);
        self.cache.put(key, arc.clone());
        arc
    }

    /// Drop everything; called when the open document changes.
    pub fn invalidate_all(&mut self) {
        self.cache.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

impl Default for PageCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
