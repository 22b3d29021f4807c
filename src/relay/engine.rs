//! Relay engine
//!
//! Owns the read/retry loop of one relay instance. It is the only writer of
//! the primary sink and the only driver of fan-out passes, so chunk order
//! needs no locking.
//!
//! ```text
//!   ByteSource::open ──► read(chunk) ──► primary sink ──► registry.fan_out
//!         ▲                  │ 0 bytes                          │
//!         │                  └──► sleep(idle_read_delay) ◄──────┘
//!         │
//!         └── error after readiness: reopen
//!             error before readiness: fail readiness, stop
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::registry::ConsumerRegistry;
use crate::source::{ByteSource, SourceReader};
use crate::stats::RelayStats;
use crate::storage::delete_with_retry;

use super::config::RelayConfig;
use super::readiness::{spawn_existence_poller, Readiness};

/// Why the relay loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayExit {
    /// The global token was cancelled
    Cancelled,
    /// The source could not be opened or read before readiness
    Failed,
}

/// Background read/retry/fan-out loop for one stream
pub struct RelayEngine {
    stream_id: String,
    source: Arc<dyn ByteSource>,
    sink: File,
    temp_path: PathBuf,
    registry: Arc<ConsumerRegistry>,
    readiness: Arc<Readiness>,
    stats: Arc<RelayStats>,
    config: RelayConfig,
    cancel: CancellationToken,
    poller: Option<JoinHandle<()>>,
}

impl RelayEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        stream_id: String,
        source: Arc<dyn ByteSource>,
        sink: File,
        temp_path: PathBuf,
        registry: Arc<ConsumerRegistry>,
        readiness: Arc<Readiness>,
        stats: Arc<RelayStats>,
        config: RelayConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            stream_id,
            source,
            sink,
            temp_path,
            registry,
            readiness,
            stats,
            config,
            cancel,
            poller: None,
        }
    }

    /// Run until cancelled or until the first connection fails, then tear down
    ///
    /// Teardown closes the primary sink, releases the remaining consumers and
    /// attempts to delete the temp buffer, in that order.
    pub async fn run(mut self) -> RelayExit {
        let exit = self.relay_loop().await;

        if let Err(e) = self.sink.shutdown().await {
            tracing::warn!(stream = %self.stream_id, error = %e, "Failed to close temp buffer");
        }
        drop(self.sink);

        self.readiness.fail(Error::Cancelled);
        self.registry.finish_all();

        if let Some(poller) = self.poller.take() {
            poller.abort();
            let _ = poller.await;
        }

        let cleanup = delete_with_retry(
            &self.temp_path,
            self.config.cleanup_attempts,
            self.config.cleanup_retry_delay,
        )
        .await;

        tracing::info!(
            stream = %self.stream_id,
            exit = ?exit,
            cleanup = ?cleanup,
            "Relay stopped"
        );

        exit
    }

    async fn relay_loop(&mut self) -> RelayExit {
        let mut chunk = vec![0u8; self.config.chunk_size];
        let mut first_attempt = true;

        while !self.cancel.is_cancelled() {
            match self.attempt(first_attempt, &mut chunk).await {
                Ok(()) | Err(Error::Cancelled) => break,
                Err(e) if !self.readiness.is_resolved() => {
                    tracing::error!(
                        stream = %self.stream_id,
                        source = %self.source.describe(),
                        error = %e,
                        "Error opening live stream"
                    );
                    self.readiness.fail(e);
                    return RelayExit::Failed;
                }
                Err(e) => {
                    tracing::warn!(
                        stream = %self.stream_id,
                        source = %self.source.describe(),
                        error = %e,
                        "Error copying live stream, will reopen"
                    );
                    self.stats.record_reconnect();

                    if !self.config.reconnect_delay.is_zero() {
                        tokio::select! {
                            biased;
                            _ = self.cancel.cancelled() => break,
                            _ = tokio::time::sleep(self.config.reconnect_delay) => {}
                        }
                    }
                }
            }

            first_attempt = false;
        }

        RelayExit::Cancelled
    }

    /// One connection: open the source and copy until it fails or we are cancelled
    async fn attempt(&mut self, first_attempt: bool, chunk: &mut [u8]) -> Result<()> {
        let mut reader = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(Error::Cancelled),
            reader = self.source.open(&self.cancel) => reader?,
        };

        tracing::info!(
            stream = %self.stream_id,
            source = %self.source.describe(),
            first_attempt = first_attempt,
            "Opened live stream"
        );

        self.copy_until_cancelled(&mut reader, first_attempt, chunk)
            .await
    }

    async fn copy_until_cancelled(
        &mut self,
        reader: &mut SourceReader,
        mut notify_started: bool,
        chunk: &mut [u8],
    ) -> Result<()> {
        loop {
            let read = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(Error::Cancelled),
                read = reader.read(chunk) => read?,
            };

            if read == 0 {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Err(Error::Cancelled),
                    _ = tokio::time::sleep(self.config.idle_read_delay) => continue,
                }
            }

            let data = &chunk[..read];
            self.sink.write_all(data).await?;
            self.sink.flush().await?;
            self.stats.record_chunk(read);

            if notify_started {
                notify_started = false;
                self.on_started();
            }

            self.registry.fan_out(data, &self.cancel).await;
        }
    }

    /// First bytes of the first connection are on disk
    fn on_started(&mut self) {
        self.poller = Some(spawn_existence_poller(
            Arc::clone(&self.readiness),
            self.temp_path.clone(),
            self.config.readiness_poll_interval,
            self.cancel.clone(),
        ));

        if self.readiness.resolve() {
            tracing::info!(stream = %self.stream_id, "Live stream ready");
        }
    }
}
