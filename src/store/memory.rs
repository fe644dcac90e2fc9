use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::CacheStore;
use crate::error::StoreError;
use crate::models::CapturedResponse;

/// In-memory named-cache store. Nothing survives the process; embedded hosts
/// and tests use this, persistent hosts use [`super::FsStore`].
#[derive(Default)]
pub struct MemoryStore {
    caches: Mutex<HashMap<String, HashMap<String, CapturedResponse>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, cache: &str, key: &str) -> Result<Option<CapturedResponse>, StoreError> {
        let caches = self.caches.lock().await;
        Ok(caches.get(cache).and_then(|c| c.get(key)).cloned())
    }

    async fn put(
        &self,
        cache: &str,
        key: &str,
        response: CapturedResponse,
    ) -> Result<(), StoreError> {
        let mut caches = self.caches.lock().await;
        caches
            .entry(cache.to_string())
            .or_default()
            .insert(key.to_string(), response);
        Ok(())
    }

    async fn delete(&self, cache: &str, key: &str) -> Result<bool, StoreError> {
        let mut caches = self.caches.lock().await;
        Ok(caches
            .get_mut(cache)
            .map(|c| c.remove(key).is_some())
            .unwrap_or(false))
    }

    async fn keys(&self, cache: &str) -> Result<Vec<String>, StoreError> {
        let caches = self.caches.lock().await;
        let mut keys: Vec<String> = caches
            .get(cache)
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        Ok(keys)
    }

    async fn delete_cache(&self, cache: &str) -> Result<(), StoreError> {
        let mut caches = self.caches.lock().await;
        caches.remove(cache);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(body: &str) -> CapturedResponse {
        CapturedResponse::new(200, Some("text/plain".to_string()), body.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn put_get_delete_round_trip() {
        let store = MemoryStore::new();
        assert_eq!(store.get("a", "k").await.unwrap(), None);

        store.put("a", "k", response("one")).await.unwrap();
        assert_eq!(store.get("a", "k").await.unwrap().unwrap().body, b"one");

        assert!(store.delete("a", "k").await.unwrap());
        assert!(!store.delete("a", "k").await.unwrap());
        assert_eq!(store.get("a", "k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn caches_are_independent() {
        let store = MemoryStore::new();
        store.put("a", "k", response("one")).await.unwrap();
        store.put("b", "k", response("two")).await.unwrap();

        store.delete_cache("a").await.unwrap();
        assert_eq!(store.get("a", "k").await.unwrap(), None);
        assert_eq!(store.get("b", "k").await.unwrap().unwrap().body, b"two");
    }

    #[tokio::test]
    async fn keys_are_sorted() {
        let store = MemoryStore::new();
        store.put("a", "z.js", response("z")).await.unwrap();
        store.put("a", "a.js", response("a")).await.unwrap();
        store.put("a", "m.js", response("m")).await.unwrap();
        assert_eq!(store.keys("a").await.unwrap(), vec!["a.js", "m.js", "z.js"]);
        assert_eq!(store.keys("missing").await.unwrap(), Vec::<String>::new());
    }
}
