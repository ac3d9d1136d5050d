//! Progress persistence - API client and local fallback cache

mod api;
mod local;

pub use api::{HttpProgressClient, ProgressError, ProgressStore, REQUEST_TIMEOUT};
pub use local::{CachedProgress, LocalProgressCache};

#[cfg(any(test, feature = "test-utils"))]
pub use api::MemoryProgressStore;
