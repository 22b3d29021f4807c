//! Remote byte sources
//!
//! A [`ByteSource`] knows how to (re)open a continuous remote stream. The
//! relay engine calls [`ByteSource::open`] once per connection attempt and
//! reads from the returned [`SourceReader`] until it fails or the relay is
//! cancelled.

pub mod http;

use async_trait::async_trait;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

pub use http::HttpSource;

/// Readable channel over an opened remote stream
pub type SourceReader = Box<dyn AsyncRead + Send + Unpin>;

/// A remote continuous stream that can be opened repeatedly
#[async_trait]
pub trait ByteSource: Send + Sync {
    /// Open a fresh connection to the remote stream
    ///
    /// Implementations should abort with [`Error::Cancelled`](crate::error::Error::Cancelled)
    /// once `cancel` fires.
    async fn open(&self, cancel: &CancellationToken) -> Result<SourceReader>;

    /// Human-readable locator, used in log fields
    fn describe(&self) -> String;
}
