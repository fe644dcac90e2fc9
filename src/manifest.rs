//! Resource manifest: the path -> fingerprint table describing the deployed
//! asset set, plus the ordered core subset downloaded during install.
//!
//! The manifest is produced by the build pipeline and delivered alongside the
//! assets it describes; at runtime it is immutable. The previous run's
//! manifest is persisted in the manifest cache and used as the baseline when
//! deciding which cached entries survive an upgrade.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Logical key for the site's root document, distinct from its literal path.
pub const ROOT_KEY: &str = "/";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetManifest {
    /// Logical asset path -> content fingerprint (opaque hash string).
    pub resources: HashMap<String, String>,
    /// Asset paths that must be downloaded before the application can start.
    /// Always a subset of `resources` keys.
    #[serde(default)]
    pub core: Vec<String>,
}

impl AssetManifest {
    pub fn new(resources: HashMap<String, String>, core: Vec<String>) -> Self {
        Self { resources, core }
    }

    pub fn fingerprint(&self, key: &str) -> Option<&str> {
        self.resources.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.resources.contains_key(key)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Load a manifest from a deployed artifact file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest file: {}", path.display()))?;
        Self::from_json(&contents)
            .with_context(|| format!("Failed to parse manifest file: {}", path.display()))
    }
}

/// Normalize a request URL to its logical key relative to `origin`.
///
/// Rules:
/// - URLs outside `origin` are unmanaged and yield `None`
/// - the origin prefix and its following slash are removed
/// - a trailing `?v=...` cache-buster is stripped
/// - the origin itself, a root path with a fragment, and an empty path all
///   normalize to [`ROOT_KEY`]
pub fn logical_key(url: &str, origin: &str) -> Option<String> {
    let origin = origin.trim_end_matches('/');
    let rest = url.strip_prefix(origin)?;

    if rest.is_empty() || rest.starts_with("/#") {
        return Some(ROOT_KEY.to_string());
    }
    // Anything under the origin starts with a slash; other prefixes
    // (e.g. a different port on the same host) are not ours.
    let mut key = rest.strip_prefix('/')?;

    if let Some(idx) = key.find("?v=") {
        key = &key[..idx];
    }
    if key.is_empty() || key.starts_with('#') {
        return Some(ROOT_KEY.to_string());
    }
    Some(key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const ORIGIN: &str = "https://app.example.com";

    #[test]
    fn plain_asset_path() {
        assert_eq!(
            logical_key("https://app.example.com/main.dart.js", ORIGIN),
            Some("main.dart.js".to_string())
        );
        assert_eq!(
            logical_key("https://app.example.com/assets/fonts/Icons.otf", ORIGIN),
            Some("assets/fonts/Icons.otf".to_string())
        );
    }

    #[test]
    fn root_forms_normalize_to_sentinel() {
        assert_eq!(logical_key(ORIGIN, ORIGIN), Some(ROOT_KEY.to_string()));
        assert_eq!(
            logical_key("https://app.example.com/", ORIGIN),
            Some(ROOT_KEY.to_string())
        );
        assert_eq!(
            logical_key("https://app.example.com/#/settings", ORIGIN),
            Some(ROOT_KEY.to_string())
        );
    }

    #[test]
    fn cache_buster_is_stripped() {
        assert_eq!(
            logical_key("https://app.example.com/main.dart.js?v=abc123", ORIGIN),
            Some("main.dart.js".to_string())
        );
        // Busted root collapses to the sentinel too.
        assert_eq!(
            logical_key("https://app.example.com/?v=abc123", ORIGIN),
            Some(ROOT_KEY.to_string())
        );
    }

    #[test]
    fn foreign_origins_are_unmanaged() {
        assert_eq!(logical_key("https://cdn.example.com/lib.js", ORIGIN), None);
        assert_eq!(logical_key("https://app.example.com:8443/a.js", ORIGIN), None);
    }

    #[test]
    fn trailing_slash_on_origin_is_tolerated() {
        assert_eq!(
            logical_key("https://app.example.com/a.js", "https://app.example.com/"),
            Some("a.js".to_string())
        );
    }

    #[test]
    fn manifest_json_round_trip() {
        let manifest = AssetManifest::new(
            HashMap::from([
                ("/".to_string(), "aaa".to_string()),
                ("index.html".to_string(), "aaa".to_string()),
                ("main.dart.js".to_string(), "bbb".to_string()),
            ]),
            vec!["main.dart.js".to_string(), "index.html".to_string()],
        );
        let parsed = AssetManifest::from_json(&manifest.to_json().unwrap()).unwrap();
        assert_eq!(parsed, manifest);
        assert_eq!(parsed.fingerprint("/"), Some("aaa"));
        assert!(parsed.contains("main.dart.js"));
        assert!(!parsed.contains("missing.js"));
    }

    #[test]
    fn core_defaults_to_empty_when_absent() {
        let parsed = AssetManifest::from_json(r#"{"resources":{"a.js":"1"}}"#).unwrap();
        assert!(parsed.core.is_empty());
        assert_eq!(parsed.fingerprint("a.js"), Some("1"));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"resources":{{"a.js":"1"}},"core":["a.js"]}}"#).unwrap();
        let manifest = AssetManifest::load(file.path()).unwrap();
        assert_eq!(manifest.core, vec!["a.js".to_string()]);
    }
}
