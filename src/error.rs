use thiserror::Error;

use crate::models::LifecycleState;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("cache backend I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode cached entry: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("network unreachable: {0}")]
    Unreachable(String),
}

#[derive(Error, Debug)]
pub enum SyncError {
    /// Core-set staging failed during install. The content cache is untouched
    /// and the next install attempt starts clean.
    #[error("bootstrap failed: {0}")]
    Bootstrap(#[source] Box<SyncError>),

    /// Reconciliation failed mid-way. All three named caches have been
    /// dropped and the next run rebuilds from nothing.
    #[error("synchronization failed, all caches dropped: {0}")]
    Fatal(#[source] Box<SyncError>),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// A batch fetch (core set or offline mirror) got a non-ok response.
    #[error("asset {key} fetch returned status {status}")]
    FetchRejected { key: String, status: u16 },

    #[error("failed to decode persisted manifest: {0}")]
    ManifestDecode(#[from] serde_json::Error),

    #[error("operation requires lifecycle state {expected:?}, but instance is {actual:?}")]
    Lifecycle {
        expected: LifecycleState,
        actual: LifecycleState,
    },
}
