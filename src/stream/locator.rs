//! Playback locators
//!
//! Turn a buffer location into the reference handed back by `open()`,
//! typically a URL on the media server that serves the growing temp file.

use crate::storage::BufferLocation;

/// Produces the public playback reference for a persisted buffer
pub trait PlaybackLocator: Send + Sync {
    fn playback_url(&self, location: &BufferLocation) -> String;
}

/// Locator for the local media server's live stream file endpoint
///
/// Produces `<base>/LiveTv/LiveStreamFiles/<id>/stream.ts`.
#[derive(Debug, Clone)]
pub struct LocalApiLocator {
    base_url: String,
}

impl LocalApiLocator {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url }
    }
}

impl PlaybackLocator for LocalApiLocator {
    fn playback_url(&self, location: &BufferLocation) -> String {
        format!(
            "{}/LiveTv/LiveStreamFiles/{}/stream.ts",
            self.base_url, location.id
        )
    }
}
