//! Named-cache store abstraction and implementations.
//!
//! The synchronizer works against three independently named key->response
//! caches (staging, content, manifest). This module defines the `CacheStore`
//! trait they are accessed through, plus two implementations:
//!
//! - `MemoryStore`: in-process, used by embedded hosts and tests
//! - `FsStore`: one JSON file per entry, persists across restarts

pub mod fs;
pub mod memory;

pub use fs::FsStore;
pub use memory::MemoryStore;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::CapturedResponse;

/// Transient cache holding core-set downloads during install.
pub const STAGING_CACHE: &str = "shell-staging";

/// Durable cache runtime fetches are served from.
pub const CONTENT_CACHE: &str = "shell-content";

/// Cache holding the previous run's manifest as its single entry.
pub const MANIFEST_CACHE: &str = "shell-manifest";

/// The one key used inside the manifest cache.
pub const MANIFEST_KEY: &str = "manifest";

/// A durable key->response store with independently named caches.
///
/// Operating on a cache name that does not exist yet creates it. Every call
/// is individually atomic and concurrent access to independent keys is safe;
/// no cross-call transaction is offered or assumed.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, cache: &str, key: &str) -> Result<Option<CapturedResponse>, StoreError>;

    async fn put(
        &self,
        cache: &str,
        key: &str,
        response: CapturedResponse,
    ) -> Result<(), StoreError>;

    /// Remove one entry. Returns whether it existed.
    async fn delete(&self, cache: &str, key: &str) -> Result<bool, StoreError>;

    /// All keys currently in the cache, in sorted order.
    async fn keys(&self, cache: &str) -> Result<Vec<String>, StoreError>;

    /// Drop an entire named cache and everything in it.
    async fn delete_cache(&self, cache: &str) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: CacheStore + ?Sized> CacheStore for Arc<T> {
    async fn get(&self, cache: &str, key: &str) -> Result<Option<CapturedResponse>, StoreError> {
        (**self).get(cache, key).await
    }

    async fn put(
        &self,
        cache: &str,
        key: &str,
        response: CapturedResponse,
    ) -> Result<(), StoreError> {
        (**self).put(cache, key, response).await
    }

    async fn delete(&self, cache: &str, key: &str) -> Result<bool, StoreError> {
        (**self).delete(cache, key).await
    }

    async fn keys(&self, cache: &str) -> Result<Vec<String>, StoreError> {
        (**self).keys(cache).await
    }

    async fn delete_cache(&self, cache: &str) -> Result<(), StoreError> {
        (**self).delete_cache(cache).await
    }
}
