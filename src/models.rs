//! Core data types shared across the synchronizer.
//!
//! This module contains the small vocabulary the rest of the crate speaks:
//!
//! - `CapturedResponse`: a network response snapshot as persisted in a cache
//! - `AssetRequest`: an intercepted runtime request
//! - `FetchDecision`: the outcome of runtime fetch handling
//! - `ControlMessage`: out-of-band commands from the hosted application
//! - `LifecycleState`: the install/activate state machine of one instance

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A response captured from the network and persisted in a named cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    pub fetched_at: DateTime<Utc>,
}

impl CapturedResponse {
    pub fn new(status: u16, content_type: Option<String>, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type,
            body,
            fetched_at: Utc::now(),
        }
    }

    /// "ok" in the fetch sense: any 2xx status. This is the only success
    /// signal the synchronizer consults.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// An intercepted runtime request. Only GET requests are eligible for
/// cache handling; everything else passes through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRequest {
    pub method: String,
    pub url: String,
}

impl AssetRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }
}

/// Outcome of runtime fetch handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchDecision {
    /// Not a managed asset (or not a GET); the host's default network path
    /// takes over and no cache interaction happens.
    Passthrough,
    /// Served by the synchronizer, from cache or from a live fetch.
    Respond(CapturedResponse),
}

/// Out-of-band commands from the hosted application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// Immediately supersede any currently waiting instance.
    Supersede,
    /// Eagerly mirror every managed asset not yet cached.
    DownloadOffline,
}

impl ControlMessage {
    /// Parse a wire message. Unknown messages yield `None` and are ignored
    /// by the caller.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "skipWaiting" => Some(Self::Supersede),
            "downloadOffline" => Some(Self::DownloadOffline),
            _ => None,
        }
    }
}

/// Lifecycle of one synchronizer instance. Bootstrap moves
/// `Uninstalled -> Staged`, a successful synchronize moves
/// `Staged -> Active`, and a fatal synchronize failure resets to
/// `Uninstalled` after wiping every cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    Uninstalled,
    Staged,
    Active,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_covers_exactly_2xx() {
        assert!(!CapturedResponse::new(199, None, vec![]).ok());
        assert!(CapturedResponse::new(200, None, vec![]).ok());
        assert!(CapturedResponse::new(299, None, vec![]).ok());
        assert!(!CapturedResponse::new(300, None, vec![]).ok());
        assert!(!CapturedResponse::new(404, None, vec![]).ok());
    }

    #[test]
    fn get_detection_is_case_insensitive() {
        assert!(AssetRequest::get("http://x/a").is_get());
        assert!(AssetRequest::new("get", "http://x/a").is_get());
        assert!(!AssetRequest::new("POST", "http://x/a").is_get());
    }

    #[test]
    fn control_message_parsing() {
        assert_eq!(ControlMessage::parse("skipWaiting"), Some(ControlMessage::Supersede));
        assert_eq!(
            ControlMessage::parse("downloadOffline"),
            Some(ControlMessage::DownloadOffline)
        );
        assert_eq!(ControlMessage::parse("somethingElse"), None);
        assert_eq!(ControlMessage::parse(""), None);
    }
}
