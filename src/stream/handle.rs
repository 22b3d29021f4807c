//! Live stream controller
//!
//! Public open/attach/close contract around one relay instance.

use std::path::Path;
use std::sync::Arc;

use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::registry::{ConsumerCompletion, ConsumerRegistry};
use crate::relay::{Readiness, RelayConfig, RelayEngine};
use crate::source::ByteSource;
use crate::stats::{RelayStats, RelayStatsSnapshot};
use crate::storage::{create_buffer, BufferLocation, TempPathBuilder};

use super::locator::PlaybackLocator;
use super::state::{CloseAction, Completion, StreamLifecycle, StreamPhase};

/// What `open()` hands back once the first bytes are on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedStream {
    /// Stream id, also the temp file stem
    pub id: String,
    /// Local temp buffer receiving the stream
    pub temp_path: std::path::PathBuf,
    /// Public reference for players
    pub playback_url: String,
}

/// A relayed live stream
///
/// Cheap to clone; all clones drive the same relay. Dropping the last clone
/// cancels the relay without waiting for it.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
///
/// use tuner_relay::{HttpSource, LiveStream, LocalApiLocator, RelayConfig, TempDirPaths};
///
/// # async fn example() -> tuner_relay::Result<()> {
/// let source = HttpSource::parse("http://192.168.1.20:5004/auto/v5.1").expect("valid url");
/// let stream = LiveStream::new(
///     Arc::new(source),
///     &TempDirPaths::new("/var/cache/transcoding-temp"),
///     Arc::new(LocalApiLocator::new("http://localhost:8096")),
///     RelayConfig::default(),
/// );
///
/// let opened = stream.open().await?;
/// println!("Play from {}", opened.playback_url);
///
/// stream.close().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LiveStream {
    inner: Arc<Inner>,
}

struct Inner {
    location: BufferLocation,
    source: Arc<dyn ByteSource>,
    locator: Arc<dyn PlaybackLocator>,
    config: RelayConfig,
    lifecycle: Arc<StreamLifecycle>,
    registry: Arc<ConsumerRegistry>,
    stats: Arc<RelayStats>,
    cancel: CancellationToken,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl LiveStream {
    /// Create an idle stream; nothing is opened until [`open`](Self::open)
    pub fn new(
        source: Arc<dyn ByteSource>,
        paths: &dyn TempPathBuilder,
        locator: Arc<dyn PlaybackLocator>,
        config: RelayConfig,
    ) -> Self {
        let stats = Arc::new(RelayStats::new());
        let registry = ConsumerRegistry::new(Arc::clone(&stats))
            .write_timeout(config.consumer_write_timeout);

        Self {
            inner: Arc::new(Inner {
                location: paths.build(),
                source,
                locator,
                config,
                lifecycle: Arc::new(StreamLifecycle::new()),
                registry: Arc::new(registry),
                stats,
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Stream id
    pub fn id(&self) -> &str {
        &self.inner.location.id
    }

    /// Local temp buffer path
    pub fn temp_path(&self) -> &Path {
        &self.inner.location.path
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> StreamPhase {
        self.inner.lifecycle.phase()
    }

    /// Relay counters
    pub fn stats(&self) -> RelayStatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Number of attached consumers
    pub fn consumer_count(&self) -> usize {
        self.inner.registry.consumer_count()
    }

    /// Observe full shutdown without triggering it
    pub fn completion(&self) -> Completion {
        self.inner.lifecycle.completion()
    }

    /// Start relaying and wait until the first bytes are persisted
    ///
    /// Fails with the underlying error if the source cannot be opened or
    /// read on the first attempt; the background relay has exited by then
    /// (or is finishing its cleanup). Later connection failures are retried
    /// silently.
    pub async fn open(&self) -> Result<OpenedStream> {
        let inner = &self.inner;
        inner.lifecycle.begin_open()?;

        tracing::info!(
            stream = %inner.location.id,
            source = %inner.source.describe(),
            path = %inner.location.path.display(),
            "Opening live stream"
        );

        let sink = match create_buffer(&inner.location.path).await {
            Ok(sink) => sink,
            Err(e) => {
                tracing::error!(
                    stream = %inner.location.id,
                    error = %e,
                    "Failed to create temp buffer"
                );
                inner.registry.finish_all();
                inner.lifecycle.finish();
                return Err(e.into());
            }
        };

        let (readiness, waiter) = Readiness::new();
        let engine = RelayEngine::new(
            inner.location.id.clone(),
            Arc::clone(&inner.source),
            sink,
            inner.location.path.clone(),
            Arc::clone(&inner.registry),
            readiness,
            Arc::clone(&inner.stats),
            inner.config.clone(),
            inner.cancel.clone(),
        );

        let lifecycle = Arc::clone(&inner.lifecycle);
        let stream_id = inner.location.id.clone();
        tokio::spawn(async move {
            let exit = engine.run().await;
            lifecycle.finish();
            tracing::debug!(stream = %stream_id, exit = ?exit, "Live stream task finished");
        });

        match waiter.wait().await {
            Ok(()) => {
                inner.lifecycle.mark_streaming();
                Ok(OpenedStream {
                    id: inner.location.id.clone(),
                    temp_path: inner.location.path.clone(),
                    playback_url: inner.locator.playback_url(&inner.location),
                })
            }
            Err(e) => {
                inner.lifecycle.mark_failed();
                Err(e)
            }
        }
    }

    /// Attach a secondary consumer to the live stream
    ///
    /// The consumer receives every chunk persisted from now on, in source
    /// order. Cancelling `cancel` detaches only this consumer. The returned
    /// future resolves when the consumer stops receiving data: with its own
    /// error if it was removed, with `Ok(())` if the relay ended first.
    pub fn attach_consumer<W>(&self, sink: W, cancel: CancellationToken) -> ConsumerCompletion
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        self.inner.registry.attach(sink, cancel)
    }

    /// Cancel the relay and return a future for full shutdown
    ///
    /// Idempotent: every call returns a future for the same completion.
    pub fn close(&self) -> Completion {
        let inner = &self.inner;

        match inner.lifecycle.begin_close() {
            CloseAction::Cancel => {
                tracing::info!(stream = %inner.location.id, "Closing live stream");
                inner.cancel.cancel();
            }
            CloseAction::NeverOpened => {
                tracing::debug!(stream = %inner.location.id, "Closing stream that was never opened");
                inner.registry.finish_all();
                inner.lifecycle.finish();
            }
            CloseAction::AlreadyClosing => {}
        }

        inner.lifecycle.completion()
    }
}

impl std::fmt::Debug for LiveStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveStream")
            .field("id", &self.inner.location.id)
            .field("phase", &self.phase())
            .field("consumers", &self.consumer_count())
            .finish()
    }
}
