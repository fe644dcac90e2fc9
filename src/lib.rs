//! shellcache - a versioned static-asset cache synchronizer.
//!
//! Given a build-time manifest mapping asset paths to content fingerprints,
//! this crate keeps a durable content cache consistent with the currently
//! deployed asset set while re-downloading as little as possible across
//! upgrades, and serves runtime requests from that cache so the application
//! loads without a network connection.
//!
//! The moving parts:
//!
//! - [`manifest::AssetManifest`]: the path -> fingerprint table plus the
//!   ordered core set required for first load
//! - [`store::CacheStore`]: the named-cache persistence boundary, with
//!   in-memory and filesystem implementations
//! - [`fetch::AssetFetcher`]: the network boundary
//! - [`sync::Synchronizer`]: install/activate reconciliation, runtime fetch
//!   handling, and application control messages

pub mod config;
pub mod error;
pub mod fetch;
pub mod manifest;
pub mod models;
pub mod store;
pub mod sync;

pub use config::Config;
pub use error::{FetchError, StoreError, SyncError};
pub use fetch::{AssetFetcher, FetchMode, HttpFetcher};
pub use manifest::{logical_key, AssetManifest, ROOT_KEY};
pub use models::{
    AssetRequest, CapturedResponse, ControlMessage, FetchDecision, LifecycleState,
};
pub use store::{
    CacheStore, FsStore, MemoryStore, CONTENT_CACHE, MANIFEST_CACHE, MANIFEST_KEY, STAGING_CACHE,
};
pub use sync::{HostSignals, NoopHost, Synchronizer};
