//! The asset cache synchronizer.
//!
//! One `Synchronizer` instance corresponds to one deployed version of the
//! application. Its life runs install -> activate -> serve:
//!
//! - [`Synchronizer::bootstrap`] stages the core set into the staging cache
//! - [`Synchronizer::synchronize`] reconciles the content cache against the
//!   previous manifest, promotes the staged entries, and goes active
//! - [`Synchronizer::handle_fetch`] serves intercepted runtime requests
//! - [`Synchronizer::handle_message`] reacts to application commands
//!
//! A failure during synchronize is unrecoverable for this run: every named
//! cache is dropped and the next bootstrap rebuilds from nothing.

use std::collections::HashSet;

use async_trait::async_trait;
use futures::future::try_join_all;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::error::SyncError;
use crate::fetch::{AssetFetcher, FetchMode, HttpFetcher};
use crate::manifest::{logical_key, AssetManifest, ROOT_KEY};
use crate::models::{
    AssetRequest, CapturedResponse, ControlMessage, FetchDecision, LifecycleState,
};
use crate::store::{
    CacheStore, FsStore, CONTENT_CACHE, MANIFEST_CACHE, MANIFEST_KEY, STAGING_CACHE,
};

/// Advisory lifecycle signals to the hosting environment.
///
/// Supersession of a previous instance is coordination between instances, not
/// a transaction; the host may ignore either signal. The default
/// implementations do nothing, which suits hosts without multi-instance
/// lifecycles.
#[async_trait]
pub trait HostSignals: Send + Sync {
    /// Ask the host to let this instance supersede a waiting predecessor
    /// without waiting for existing consumers to release it.
    async fn skip_waiting(&self) {}

    /// Ask the host to route existing consumers to this instance immediately
    /// rather than only on their next load.
    async fn claim_clients(&self) {}
}

/// Host that ignores all lifecycle signals.
pub struct NoopHost;

#[async_trait]
impl HostSignals for NoopHost {}

/// Reconciles the content cache with the current resource manifest and serves
/// runtime fetches from it.
pub struct Synchronizer<S, F, H = NoopHost> {
    manifest: AssetManifest,
    origin: String,
    store: S,
    fetcher: F,
    host: H,
    state: Mutex<LifecycleState>,
}

impl<S, F> Synchronizer<S, F, NoopHost>
where
    S: CacheStore,
    F: AssetFetcher,
{
    pub fn new(manifest: AssetManifest, origin: impl Into<String>, store: S, fetcher: F) -> Self {
        Self::with_host(manifest, origin, store, fetcher, NoopHost)
    }
}

impl Synchronizer<FsStore, HttpFetcher, NoopHost> {
    /// Build a persistent synchronizer from the host configuration: the
    /// configured origin, a filesystem store under the configured cache
    /// directory, and an HTTP fetcher with the configured timeout.
    pub fn from_config(manifest: AssetManifest, config: &Config) -> anyhow::Result<Self> {
        let origin = config
            .origin
            .clone()
            .ok_or_else(|| anyhow::anyhow!("config has no origin"))?;
        let store = FsStore::new(config.cache_dir()?)?;
        let fetcher = HttpFetcher::from_config(config)?;
        Ok(Self::new(manifest, origin, store, fetcher))
    }
}

impl<S, F, H> Synchronizer<S, F, H>
where
    S: CacheStore,
    F: AssetFetcher,
    H: HostSignals,
{
    pub fn with_host(
        manifest: AssetManifest,
        origin: impl Into<String>,
        store: S,
        fetcher: F,
        host: H,
    ) -> Self {
        let origin = origin.into().trim_end_matches('/').to_string();
        Self {
            manifest,
            origin,
            store,
            fetcher,
            host,
            state: Mutex::new(LifecycleState::Uninstalled),
        }
    }

    pub async fn state(&self) -> LifecycleState {
        *self.state.lock().await
    }

    fn url_for(&self, key: &str) -> String {
        if key == ROOT_KEY {
            format!("{}/", self.origin)
        } else {
            format!("{}/{}", self.origin, key)
        }
    }

    /// Install step: download the core set (bypassing intermediate caches)
    /// into the staging cache. The content cache is never touched here, so a
    /// failed install leaves the previous version fully serviceable.
    pub async fn bootstrap(&self) -> Result<(), SyncError> {
        let mut state = self.state.lock().await;
        if *state != LifecycleState::Uninstalled {
            return Err(SyncError::Lifecycle {
                expected: LifecycleState::Uninstalled,
                actual: *state,
            });
        }

        self.host.skip_waiting().await;

        info!(assets = self.manifest.core.len(), "bootstrap: staging core set");
        self.stage_core_set()
            .await
            .map_err(|e| SyncError::Bootstrap(Box::new(e)))?;

        *state = LifecycleState::Staged;
        Ok(())
    }

    async fn stage_core_set(&self) -> Result<(), SyncError> {
        // All-or-nothing: one failing (or non-ok) download fails the install.
        let fetches = self.manifest.core.iter().map(|key| async move {
            let response = self.fetcher.fetch(&self.url_for(key), FetchMode::Reload).await?;
            if !response.ok() {
                return Err(SyncError::FetchRejected {
                    key: key.clone(),
                    status: response.status,
                });
            }
            Ok((key.as_str(), response))
        });
        let staged = try_join_all(fetches).await?;

        for (key, response) in staged {
            self.store.put(STAGING_CACHE, key, response).await?;
        }
        Ok(())
    }

    /// Activate step: reconcile the content cache against the previous
    /// manifest, promote the staged core set, persist the new manifest, and
    /// go active.
    ///
    /// Any error here means the cache state can no longer be trusted; all
    /// three named caches are dropped and the instance resets to
    /// `Uninstalled` so the next run rebuilds from a cold start.
    pub async fn synchronize(&self) -> Result<(), SyncError> {
        let mut state = self.state.lock().await;
        if *state != LifecycleState::Staged {
            return Err(SyncError::Lifecycle {
                expected: LifecycleState::Staged,
                actual: *state,
            });
        }

        match self.reconcile().await {
            Ok(()) => {
                self.host.claim_clients().await;
                *state = LifecycleState::Active;
                info!("synchronize: content cache active");
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "synchronize failed, dropping all caches");
                for cache in [CONTENT_CACHE, STAGING_CACHE, MANIFEST_CACHE] {
                    if let Err(wipe_err) = self.store.delete_cache(cache).await {
                        error!(cache, error = %wipe_err, "failed to drop cache during reset");
                    }
                }
                *state = LifecycleState::Uninstalled;
                Err(SyncError::Fatal(Box::new(err)))
            }
        }
    }

    async fn reconcile(&self) -> Result<(), SyncError> {
        let previous = match self.store.get(MANIFEST_CACHE, MANIFEST_KEY).await? {
            Some(entry) => Some(serde_json::from_slice::<AssetManifest>(&entry.body)?),
            None => None,
        };

        match previous {
            // First run, or recovering from a prior reset: nothing in the
            // content cache can be trusted against the new manifest.
            None => {
                debug!("no previous manifest, rebuilding content cache");
                self.store.delete_cache(CONTENT_CACHE).await?;
            }
            // Upgrade: keep entries whose fingerprint is unchanged, drop the
            // rest. This is the sole optimization the synchronizer makes.
            Some(old) => {
                for key in self.store.keys(CONTENT_CACHE).await? {
                    let stale = match self.manifest.fingerprint(&key) {
                        None => true,
                        Some(new_fp) => old.fingerprint(&key) != Some(new_fp),
                    };
                    if stale {
                        debug!(%key, "dropping changed or removed asset");
                        self.store.delete(CONTENT_CACHE, &key).await?;
                    }
                }
            }
        }

        // Promote the staged core set, overwriting any survivors: core files
        // are always served fresh after an upgrade.
        for key in self.store.keys(STAGING_CACHE).await? {
            if let Some(response) = self.store.get(STAGING_CACHE, &key).await? {
                self.store.put(CONTENT_CACHE, &key, response).await?;
            }
        }

        let serialized = serde_json::to_vec(&self.manifest)?;
        self.store
            .put(
                MANIFEST_CACHE,
                MANIFEST_KEY,
                CapturedResponse::new(200, Some("application/json".to_string()), serialized),
            )
            .await?;

        self.store.delete_cache(STAGING_CACHE).await?;
        Ok(())
    }

    /// Runtime fetch interception.
    ///
    /// Unmanaged requests (non-GET, foreign origin, or a path outside the
    /// manifest) pass through untouched. The root document is network-first
    /// with a cached fallback; every other managed asset is cache-first with
    /// lazy fill.
    pub async fn handle_fetch(&self, request: &AssetRequest) -> Result<FetchDecision, SyncError> {
        if !request.is_get() {
            return Ok(FetchDecision::Passthrough);
        }
        let Some(key) = logical_key(&request.url, &self.origin) else {
            return Ok(FetchDecision::Passthrough);
        };
        if !self.manifest.contains(&key) {
            return Ok(FetchDecision::Passthrough);
        }

        let response = if key == ROOT_KEY {
            self.network_first(&key).await?
        } else {
            self.cache_first(&key, &request.url).await?
        };
        Ok(FetchDecision::Respond(response))
    }

    async fn network_first(&self, key: &str) -> Result<CapturedResponse, SyncError> {
        // Fetch the normalized URL, not the raw request form: the bare
        // origin, the trailing-slash form, and a fragment all name the same
        // root document and must hit the same resource.
        match self.fetcher.fetch(&self.url_for(key), FetchMode::Default).await {
            Ok(response) => {
                self.store.put(CONTENT_CACHE, key, response.clone()).await?;
                Ok(response)
            }
            Err(err) => {
                debug!(key, error = %err, "root fetch failed, falling back to cache");
                match self.store.get(CONTENT_CACHE, key).await? {
                    Some(cached) => Ok(cached),
                    // Nothing to fall back to: surface the original failure.
                    None => Err(err.into()),
                }
            }
        }
    }

    async fn cache_first(&self, key: &str, url: &str) -> Result<CapturedResponse, SyncError> {
        if let Some(cached) = self.store.get(CONTENT_CACHE, key).await? {
            debug!(key, "serving from content cache");
            return Ok(cached);
        }
        let response = self.fetcher.fetch(url, FetchMode::Default).await?;
        // Lazy fill, but only with responses that actually succeeded.
        if response.ok() {
            self.store.put(CONTENT_CACHE, key, response.clone()).await?;
        }
        Ok(response)
    }

    /// Out-of-band commands from the hosted application.
    pub async fn handle_message(&self, message: ControlMessage) -> Result<(), SyncError> {
        match message {
            ControlMessage::Supersede => {
                self.host.skip_waiting().await;
                Ok(())
            }
            ControlMessage::DownloadOffline => self.download_offline().await,
        }
    }

    /// Fetch every manifest asset not yet in the content cache, so the whole
    /// application works offline. One failing fetch fails the whole batch;
    /// nothing fetched in a failing batch is stored.
    async fn download_offline(&self) -> Result<(), SyncError> {
        let cached: HashSet<String> = self.store.keys(CONTENT_CACHE).await?.into_iter().collect();
        let mut missing: Vec<&String> = self
            .manifest
            .resources
            .keys()
            .filter(|key| !cached.contains(*key))
            .collect();
        missing.sort();

        info!(missing = missing.len(), "downloading offline mirror");
        let fetches = missing.into_iter().map(|key| async move {
            let response = self.fetcher.fetch(&self.url_for(key), FetchMode::Default).await?;
            if !response.ok() {
                return Err(SyncError::FetchRejected {
                    key: key.clone(),
                    status: response.status,
                });
            }
            Ok((key.as_str(), response))
        });
        let fetched = try_join_all(fetches).await?;

        for (key, response) in fetched {
            self.store.put(CONTENT_CACHE, key, response).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_config_requires_an_origin() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            cache_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        assert!(Synchronizer::from_config(AssetManifest::default(), &config).is_err());
    }

    #[test]
    fn from_config_builds_a_persistent_instance() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            origin: Some("https://app.example.com".to_string()),
            cache_dir: Some(dir.path().to_path_buf()),
            request_timeout_secs: Some(5),
        };
        let sync = Synchronizer::from_config(AssetManifest::default(), &config).unwrap();
        assert_eq!(sync.origin, "https://app.example.com");
        // The store root exists on disk, ready to persist across restarts.
        assert!(dir.path().is_dir());
    }
}
