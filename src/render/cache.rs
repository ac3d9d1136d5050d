//! LRU cache for rendered page rasters

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use super::request::RenderParams;
use crate::engine::Raster;

/// Cache key for rendered rasters
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Page number (1-based)
    pub page: usize,
    /// Viewport width in pixels
    pub viewport_width: u32,
    /// Viewport height in pixels
    pub viewport_height: u32,
    /// Scale stored as millionths for stable hashing
    pub scale_millionths: u32,
}

impl CacheKey {
    #[must_use]
    pub fn from_params(params: &RenderParams) -> Self {
        Self {
            page: params.page,
            viewport_width: params.viewport.width,
            viewport_height: params.viewport.height,
            scale_millionths: (params.scale * 1_000_000.0) as u32,
        }
    }
}

/// LRU cache of rendered rasters, shared between controller and worker
pub struct RasterCache {
    cache: LruCache<CacheKey, Arc<Raster>>,
}

impl RasterCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).expect("1 is non-zero")),
            ),
        }
    }

    #[must_use]
    pub fn get(&mut self, key: &CacheKey) -> Option<Arc<Raster>> {
        self.cache.get(key).cloned()
    }

    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.cache.contains(key)
    }

    pub fn insert(&mut self, key: CacheKey, raster: Raster) -> Arc<Raster> {
        let arc = Arc::new(raster);
        self.cache.put(key, arc.clone());
        arc
    }

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
