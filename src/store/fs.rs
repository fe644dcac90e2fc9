use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use super::CacheStore;
use crate::error::StoreError;
use crate::models::CapturedResponse;

/// Filesystem-backed named-cache store.
///
/// Layout: one directory per named cache under the root, one JSON file per
/// entry. Keys are percent-encoded into filename-safe form so that slashes
/// and the sentinel root key `/` store cleanly.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: PathBuf) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn cache_dir(&self, cache: &str) -> PathBuf {
        self.root.join(encode_key(cache))
    }

    fn entry_path(&self, cache: &str, key: &str) -> PathBuf {
        self.cache_dir(cache).join(format!("{}.json", encode_key(key)))
    }
}

/// Percent-encode everything outside `[A-Za-z0-9._-]`.
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'.' | b'_' | b'-' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

fn decode_key(name: &str) -> Option<String> {
    let mut bytes = Vec::with_capacity(name.len());
    let mut chars = name.bytes();
    while let Some(byte) = chars.next() {
        if byte == b'%' {
            let hi = chars.next()?;
            let lo = chars.next()?;
            let hex = [hi, lo];
            let hex = std::str::from_utf8(&hex).ok()?;
            bytes.push(u8::from_str_radix(hex, 16).ok()?);
        } else {
            bytes.push(byte);
        }
    }
    String::from_utf8(bytes).ok()
}

#[async_trait]
impl CacheStore for FsStore {
    async fn get(&self, cache: &str, key: &str) -> Result<Option<CapturedResponse>, StoreError> {
        let path = self.entry_path(cache, key);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&contents)?))
    }

    async fn put(
        &self,
        cache: &str,
        key: &str,
        response: CapturedResponse,
    ) -> Result<(), StoreError> {
        std::fs::create_dir_all(self.cache_dir(cache))?;
        let contents = serde_json::to_string(&response)?;
        std::fs::write(self.entry_path(cache, key), contents)?;
        Ok(())
    }

    async fn delete(&self, cache: &str, key: &str) -> Result<bool, StoreError> {
        match std::fs::remove_file(self.entry_path(cache, key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn keys(&self, cache: &str) -> Result<Vec<String>, StoreError> {
        let dir = self.cache_dir(cache);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut keys = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            if let Some(encoded) = name.strip_suffix(".json") {
                match decode_key(encoded) {
                    Some(key) => keys.push(key),
                    // Stray files in the cache dir are not ours to serve.
                    None => debug!(file = %name, "skipping undecodable cache file"),
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn delete_cache(&self, cache: &str) -> Result<(), StoreError> {
        match std::fs::remove_dir_all(self.cache_dir(cache)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(body: &str) -> CapturedResponse {
        CapturedResponse::new(200, None, body.as_bytes().to_vec())
    }

    #[test]
    fn key_encoding_round_trips() {
        for key in ["/", "main.dart.js", "assets/fonts/Icons.otf", "weird key%#?"] {
            let encoded = encode_key(key);
            assert!(!encoded.contains('/'), "encoded {:?} contains a slash", encoded);
            assert_eq!(decode_key(&encoded).as_deref(), Some(key));
        }
    }

    #[tokio::test]
    async fn entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FsStore::new(dir.path().to_path_buf()).unwrap();
            store.put("content", "/", response("root")).await.unwrap();
            store
                .put("content", "assets/a.png", response("img"))
                .await
                .unwrap();
        }
        let store = FsStore::new(dir.path().to_path_buf()).unwrap();
        assert_eq!(store.get("content", "/").await.unwrap().unwrap().body, b"root");
        assert_eq!(
            store.keys("content").await.unwrap(),
            vec!["/".to_string(), "assets/a.png".to_string()]
        );
    }

    #[tokio::test]
    async fn delete_cache_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path().to_path_buf()).unwrap();
        store.put("staging", "a.js", response("a")).await.unwrap();
        store.delete_cache("staging").await.unwrap();
        assert_eq!(store.keys("staging").await.unwrap(), Vec::<String>::new());
        // Deleting a cache that never existed is fine.
        store.delete_cache("never-there").await.unwrap();
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path().to_path_buf()).unwrap();
        store.put("content", "a.js", response("a")).await.unwrap();
        assert!(store.delete("content", "a.js").await.unwrap());
        assert!(!store.delete("content", "a.js").await.unwrap());
    }
}
